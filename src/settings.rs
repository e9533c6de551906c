//! Project-wide generator settings.
//!
//! Resolved once per pass from the model's `settings` block and threaded into every driver. The CLI can
//! override individual fields with the `with_*` setters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Emit `/// <summary>` comments on generated members.
    pub emit_documentation: bool,
    /// Emit `InstanceIndex` on every tracked type, not only on `IInstanceIndex` implementers.
    pub always_emit_index: bool,
    /// Tag manager asset; defaults to `ProjectSettings/TagManager.asset` next to the model.
    pub tag_manager_path: Option<PathBuf>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            emit_documentation: true,
            always_emit_index: false,
            tag_manager_path: None,
        }
    }
}

impl GeneratorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documentation(mut self, enabled: bool) -> Self {
        self.emit_documentation = enabled;
        self
    }

    pub fn with_always_emit_index(mut self, enabled: bool) -> Self {
        self.always_emit_index = enabled;
        self
    }

    pub fn with_tag_manager_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tag_manager_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GeneratorSettings::default();
        assert!(settings.emit_documentation);
        assert!(!settings.always_emit_index);
        assert_eq!(settings.tag_manager_path, None);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: GeneratorSettings = serde_json::from_str(r#"{ "always_emit_index": true }"#).unwrap();
        assert_eq!(settings, GeneratorSettings::new().with_always_emit_index(true));
    }

    #[test]
    fn test_builder_chain() {
        let settings = GeneratorSettings::new()
            .with_documentation(false)
            .with_tag_manager_path("Assets/TagManager.asset");
        assert!(!settings.emit_documentation);
        assert_eq!(settings.tag_manager_path, Some(PathBuf::from("Assets/TagManager.asset")));
    }
}
