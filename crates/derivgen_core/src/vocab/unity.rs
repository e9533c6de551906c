//! Engine vocabulary the generators need to know about.

/// Tags every project has, in the engine's fixed order.
pub const BUILTIN_TAGS: &[&str] = &[
    "Untagged",
    "Respawn",
    "Finish",
    "EditorOnly",
    "MainCamera",
    "Player",
    "GameController",
];

/// Number of layer slots.
pub const LAYER_COUNT: usize = 32;

/// Message invoked when a component becomes enabled.
pub const ON_ENABLE: &str = "OnEnable";

/// Message invoked when a component becomes disabled.
pub const ON_DISABLE: &str = "OnDisable";

/// Default location of the tag manager asset relative to the project root.
pub const TAG_MANAGER_ASSET: &str = "ProjectSettings/TagManager.asset";

/// Primitive spellings and their unmanaged sizes in bytes.
pub const PRIMITIVE_SIZES: &[(&str, usize)] = &[
    ("bool", 1),
    ("byte", 1),
    ("sbyte", 1),
    ("char", 2),
    ("short", 2),
    ("ushort", 2),
    ("int", 4),
    ("uint", 4),
    ("float", 4),
    ("long", 8),
    ("ulong", 8),
    ("double", 8),
    ("nint", 8),
    ("nuint", 8),
    ("decimal", 16),
];

/// Unmanaged size of a primitive, if `name` is one.
pub fn primitive_size(name: &str) -> Option<usize> {
    PRIMITIVE_SIZES.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
}

/// Managed primitives: keywords that are types but never unmanaged.
pub const MANAGED_PRIMITIVES: &[&str] = &["string", "object", "dynamic"];

/// Whether `name` is a C# predefined type keyword.
pub fn is_predefined_type(name: &str) -> bool {
    name == "void" || primitive_size(name).is_some() || MANAGED_PRIMITIVES.contains(&name)
}
