//! Unmanaged-ness and storage size estimates for value types.

use std::collections::HashSet;

use derivgen_core::vocab::unity;

use crate::host::{SymbolKey, SymbolOracle, TypeKind, TypeRef};

/// Size assumed for references and anything whose layout is unknown.
pub const POINTER_SIZE: usize = 8;

/// Whether `ty` satisfies the `unmanaged` constraint: primitives, enums, and structs whose instance fields
/// are all unmanaged.
pub fn is_unmanaged(oracle: &dyn SymbolOracle, ty: &TypeRef) -> bool {
    let mut visiting = HashSet::new();
    unmanaged_inner(oracle, ty, &mut visiting)
}

fn unmanaged_inner(oracle: &dyn SymbolOracle, ty: &TypeRef, visiting: &mut HashSet<TypeRef>) -> bool {
    if ty.nullable || ty.array_rank > 0 {
        return false;
    }
    if unity::primitive_size(&ty.name).is_some() {
        return true;
    }
    let Some(decl) = oracle.declaration(&SymbolKey::of(ty)) else {
        return false;
    };
    match decl.kind {
        TypeKind::Enum => true,
        TypeKind::Struct => {
            if !visiting.insert(ty.clone()) {
                return false;
            }
            let all = oracle
                .instance_fields(ty)
                .iter()
                .all(|(_, field)| field.as_ref().is_some_and(|f| unmanaged_inner(oracle, f, visiting)));
            visiting.remove(ty);
            all
        }
        TypeKind::Class | TypeKind::Interface => false,
    }
}

/// Estimated in-memory size of a value of type `ty`, without padding.
pub fn estimate_size(oracle: &dyn SymbolOracle, ty: &TypeRef) -> usize {
    let mut visiting = HashSet::new();
    size_inner(oracle, ty, &mut visiting)
}

fn size_inner(oracle: &dyn SymbolOracle, ty: &TypeRef, visiting: &mut HashSet<TypeRef>) -> usize {
    if ty.array_rank > 0 {
        return POINTER_SIZE;
    }
    if let Some(size) = unity::primitive_size(&ty.name) {
        // `Nullable<T>` carries a `bool` flag next to the value.
        return if ty.nullable { size + 1 } else { size };
    }
    let Some(decl) = oracle.declaration(&SymbolKey::of(ty)) else {
        return POINTER_SIZE;
    };
    match decl.kind {
        TypeKind::Enum => 4,
        TypeKind::Struct => {
            if !visiting.insert(ty.clone()) {
                return 0;
            }
            let size: usize = oracle
                .instance_fields(ty)
                .iter()
                .map(|(_, field)| field.as_ref().map_or(POINTER_SIZE, |f| size_inner(oracle, f, visiting)))
                .sum();
            visiting.remove(ty);
            size.max(1)
        }
        TypeKind::Class | TypeKind::Interface => POINTER_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModelHost;
    use derivgen_syntax::parser::parse_type;

    fn host() -> ModelHost {
        ModelHost::from_json(
            r#"{ "types": [
                { "name": "Game.Stats", "kind": "struct",
                  "fields": [{ "name": "Hp", "type": "int" }, { "name": "Speed", "type": "float" }] },
                { "name": "Game.Mode", "kind": "enum" },
                { "name": "Game.Named", "kind": "struct",
                  "fields": [{ "name": "Label", "type": "string" }, { "name": "Stats", "type": "Stats" }] },
                { "name": "Game.Wrapper", "kind": "struct",
                  "fields": [{ "name": "Inner", "type": "Stats" }, { "name": "Mode", "type": "Mode" },
                             { "name": "Shared", "type": "int", "is_static": true }] }
            ] }"#,
        )
        .unwrap()
    }

    fn ty(text: &str) -> TypeRef {
        parse_type(text).unwrap()
    }

    #[test]
    fn test_unmanaged_structs_are_decided_recursively() {
        let host = host();
        assert!(is_unmanaged(&host, &ty("Game.Stats")));
        assert!(is_unmanaged(&host, &ty("Game.Wrapper")));
        assert!(!is_unmanaged(&host, &ty("Game.Named")));
        assert!(!is_unmanaged(&host, &ty("string")));
        assert!(!is_unmanaged(&host, &ty("int[]")));
    }

    #[test]
    fn test_estimate_size_ignores_static_fields() {
        let host = host();
        assert_eq!(estimate_size(&host, &ty("Game.Stats")), 8);
        assert_eq!(estimate_size(&host, &ty("Game.Wrapper")), 12);
        assert_eq!(estimate_size(&host, &ty("Game.Named")), 16);
    }
}
