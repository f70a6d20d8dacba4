//! Static hotkey → action table.
//!
//! The registry is built once at startup (from the built-in table or a
//! config file) and shared read-only through an `Arc`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One hotkey binding: the combination that triggers it, the line logged
/// when it fires, and the symbolic action sent to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "combo")]
    pub key_combination: String,
    pub log_message: String,
    #[serde(rename = "action")]
    pub action_name: String,
}

impl ActionDescriptor {
    pub fn new(
        key_combination: impl Into<String>,
        log_message: impl Into<String>,
        action_name: impl Into<String>,
    ) -> Self {
        Self {
            key_combination: key_combination.into(),
            log_message: log_message.into(),
            action_name: action_name.into(),
        }
    }
}

/// Errors raised while building a registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("hotkey '{0}' is bound more than once")]
    DuplicateCombination(String),
    #[error("hotkey entry has an empty combination")]
    EmptyCombination,
    #[error("hotkey '{0}' has an empty action name")]
    EmptyAction(String),
}

/// Immutable lookup from normalized combination identifier to descriptor.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    entries: Vec<ActionDescriptor>,
    index: HashMap<String, usize>,
}

/// Canonical form of a combination identifier: trimmed and lowercased.
pub fn normalize_combo(combo: &str) -> String {
    combo.trim().to_lowercase()
}

impl ActionRegistry {
    /// Build a registry, rejecting duplicate or empty bindings.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ActionDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for mut descriptor in descriptors {
            let key = normalize_combo(&descriptor.key_combination);
            if key.is_empty() {
                return Err(RegistryError::EmptyCombination);
            }
            if descriptor.action_name.trim().is_empty() {
                return Err(RegistryError::EmptyAction(key));
            }
            if index.contains_key(&key) {
                return Err(RegistryError::DuplicateCombination(key));
            }
            descriptor.key_combination = key.clone();
            index.insert(key, entries.len());
            entries.push(descriptor);
        }
        Ok(Self { entries, index })
    }

    /// The default media-control table.
    pub fn builtin() -> Self {
        let descriptors = [
            ActionDescriptor::new(
                "pause break",
                "Pause/Break pressed: Toggling play/pause.",
                "toggle_play_pause",
            ),
            ActionDescriptor::new("f2", "F2 pressed: Skipping to next video.", "next_video"),
            ActionDescriptor::new("f3", "F3 pressed: Adjusting volume up.", "volume_up"),
            ActionDescriptor::new("f4", "F4 pressed: Adjusting volume down.", "volume_down"),
            ActionDescriptor::new("escape", "Escape pressed: Rewinding video.", "rewind"),
            ActionDescriptor::new("f6", "F6 pressed: Forwarding video.", "forward"),
        ];
        Self::from_descriptors(descriptors).unwrap_or_default()
    }

    pub fn get(&self, combo: &str) -> Option<&ActionDescriptor> {
        let key = normalize_combo(combo);
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Combination identifiers in insertion order.
    pub fn combos(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|d| d.key_combination.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_six_bindings() {
        let registry = ActionRegistry::builtin();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.get("f2").unwrap().action_name, "next_video");
        assert_eq!(registry.get("pause break").unwrap().action_name, "toggle_play_pause");
        assert_eq!(registry.get("escape").unwrap().action_name, "rewind");
    }

    #[test]
    fn escape_log_line_names_escape() {
        let registry = ActionRegistry::builtin();
        let descriptor = registry.get("escape").unwrap();
        assert!(descriptor.log_message.starts_with("Escape"));
    }

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        let registry = ActionRegistry::builtin();
        assert_eq!(registry.get("  F3 ").unwrap().action_name, "volume_up");
        assert_eq!(registry.get("Pause Break").unwrap().action_name, "toggle_play_pause");
    }

    #[test]
    fn unknown_combo_is_absent() {
        let registry = ActionRegistry::builtin();
        assert!(registry.get("f12").is_none());
    }

    #[test]
    fn combos_preserve_insertion_order() {
        let registry = ActionRegistry::builtin();
        let combos: Vec<_> = registry.combos().collect();
        assert_eq!(combos, ["pause break", "f2", "f3", "f4", "escape", "f6"]);
    }

    #[test]
    fn duplicate_after_normalization_rejected() {
        let err = ActionRegistry::from_descriptors([
            ActionDescriptor::new("F2", "a", "next_video"),
            ActionDescriptor::new("f2 ", "b", "volume_up"),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCombination("f2".into()));
    }

    #[test]
    fn empty_fields_rejected() {
        assert_eq!(
            ActionRegistry::from_descriptors([ActionDescriptor::new(" ", "x", "y")]).unwrap_err(),
            RegistryError::EmptyCombination
        );
        assert_eq!(
            ActionRegistry::from_descriptors([ActionDescriptor::new("f9", "x", "")]).unwrap_err(),
            RegistryError::EmptyAction("f9".into())
        );
    }

    #[test]
    fn descriptor_deserializes_from_toml() {
        let d: ActionDescriptor = toml::from_str(
            r#"
            combo = "ctrl+f9"
            action = "next_video"
            log_message = "Ctrl+F9 pressed."
            "#,
        )
        .unwrap();
        assert_eq!(d.key_combination, "ctrl+f9");
        assert_eq!(d.action_name, "next_video");
    }
}
