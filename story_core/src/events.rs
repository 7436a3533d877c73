//! Change notifications emitted after every committed state mutation.

use serde::Serialize;
use story_expr::{StateStore, Value};

/// One written path and the value it now holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchEntry {
    pub path: String,
    pub value: Value,
}

/// Sent to the registered listener whenever a mutation changed something.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeNotification {
    /// New values at the changed paths (`undefined` where a path was removed).
    pub patch: Vec<PatchEntry>,

    /// Dotted paths whose values changed.
    pub changed_paths: Vec<String>,
}

impl ChangeNotification {
    /// Build a notification by reading each changed path from `store`.
    pub fn from_store(store: &StateStore, changed_paths: Vec<String>) -> Self {
        let patch = changed_paths
            .iter()
            .map(|path| PatchEntry {
                path: path.clone(),
                value: store.get_path(path),
            })
            .collect();
        Self {
            patch,
            changed_paths,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed_paths.is_empty()
    }
}

/// The single observer of state changes.
pub type ChangeListener = Box<dyn FnMut(&ChangeNotification) + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_reads_current_values() {
        let store = StateStore::from_json(json!({ "gold": 20, "player": { "hp": 4 } }));
        let note = ChangeNotification::from_store(
            &store,
            vec!["gold".to_string(), "player.hp".to_string(), "gone".to_string()],
        );

        assert_eq!(note.patch[0].value, Value::Number(20.0));
        assert_eq!(note.patch[1].value, Value::Number(4.0));
        assert_eq!(note.patch[2].value, Value::Undefined);

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["changed_paths"], json!(["gold", "player.hp", "gone"]));
        assert_eq!(json["patch"][0], json!({ "path": "gold", "value": 20.0 }));
    }
}
