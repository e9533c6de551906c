//! Well-known capability interfaces.
//!
//! A tracked type opts into extra registries by implementing one of these interfaces. The generic ones
//! carry the capability's associated type as their single type argument (`IUnmanagedData<TData>`).

use crate::vocab::markers::MARKER_NAMESPACE;

/// Stable identifier for capability interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WellKnownInterface {
    /// `IUnmanagedData<TData>`: a parallel array of unmanaged payloads.
    UnmanagedData,
    /// `IFindByID<TId>`: an id -> instance lookup table.
    FindById,
    /// `ICustomStorage<TStorage>`: a user-provided storage type.
    CustomStorage,
    /// `IInstanceIndex`: exposes the instance's slot index.
    InstanceIndex,
}

/// Registry entry: simple name and generic arity.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceInfo {
    pub id: WellKnownInterface,
    pub name: &'static str,
    pub arity: usize,
}

pub const INTERFACES: &[InterfaceInfo] = &[
    InterfaceInfo {
        id: WellKnownInterface::UnmanagedData,
        name: "IUnmanagedData",
        arity: 1,
    },
    InterfaceInfo {
        id: WellKnownInterface::FindById,
        name: "IFindByID",
        arity: 1,
    },
    InterfaceInfo {
        id: WellKnownInterface::CustomStorage,
        name: "ICustomStorage",
        arity: 1,
    },
    InterfaceInfo {
        id: WellKnownInterface::InstanceIndex,
        name: "IInstanceIndex",
        arity: 0,
    },
];

/// Classify an interface by its qualified definition name and arity.
pub fn classify(qualified_name: &str, arity: usize) -> Option<WellKnownInterface> {
    let simple = qualified_name.strip_prefix(MARKER_NAMESPACE)?.strip_prefix('.')?;
    INTERFACES
        .iter()
        .find(|i| i.name == simple && i.arity == arity)
        .map(|i| i.id)
}

/// Fully qualified definition name, e.g. `Medicine.IUnmanagedData`.
pub fn qualified_name(id: WellKnownInterface) -> String {
    let info = INTERFACES
        .iter()
        .find(|i| i.id == id)
        .expect("INVARIANT: every WellKnownInterface has a registry entry");
    format!("{MARKER_NAMESPACE}.{}", info.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_requires_namespace_and_arity() {
        assert_eq!(classify("Medicine.IUnmanagedData", 1), Some(WellKnownInterface::UnmanagedData));
        assert_eq!(classify("Medicine.IUnmanagedData", 0), None);
        assert_eq!(classify("Game.IUnmanagedData", 1), None);
        assert_eq!(classify("Medicine.IInstanceIndex", 0), Some(WellKnownInterface::InstanceIndex));
    }

    #[test]
    fn test_qualified_name_round_trips() {
        for info in INTERFACES {
            assert_eq!(classify(&qualified_name(info.id), info.arity), Some(info.id));
        }
    }
}
