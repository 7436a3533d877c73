//! Story Engine - the state manager and smart cache wired together.
//!
//! Every mutation routes its changed paths into the cache, so a cached
//! result is dropped exactly when something it read has changed. This is
//! also the unit to put behind a mutex on a multi-threaded runtime.

use story_expr::{CompilerStats, EvalError, Helpers, StateStore, Value};

use crate::cache::{CacheStats, SmartCache};
use crate::config::EngineConfig;
use crate::error::HistoryError;
use crate::events::ChangeNotification;
use crate::state::{HistoryStep, SetReport, SnapshotId, StateManager};

/// Facade owning the live state and the derived-content cache.
#[derive(Debug)]
pub struct StoryEngine {
    state: StateManager,
    cache: SmartCache<Value>,
}

impl StoryEngine {
    /// Create an engine over `store`.
    pub fn new(store: StateStore, config: EngineConfig) -> Self {
        Self {
            state: StateManager::new(store, config.state, config.compiler),
            cache: SmartCache::new(config.cache),
        }
    }

    /// Create an engine over an empty store with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StateStore::new(), EngineConfig::default())
    }

    /// Replace the helper table, e.g. with a seeded one for reproducible dice.
    pub fn with_helpers(mut self, helpers: Helpers) -> Self {
        self.state = self.state.with_helpers(helpers);
        self
    }

    /// Register the change listener.
    pub fn on_change(&mut self, listener: impl FnMut(&ChangeNotification) + Send + 'static) {
        self.state.on_change(listener);
    }

    /// Evaluate `source` against the live state, uncached.
    pub fn evaluate(&mut self, source: &str) -> Result<Value, EvalError> {
        self.state.evaluate(source, None)
    }

    /// Evaluate `source` under `key`, reusing the cached result until a path
    /// it read changes.
    pub fn evaluate_cached(&mut self, key: &str, source: &str) -> Result<Value, EvalError> {
        let state = &mut self.state;
        self.cache
            .get_or_compute(key, |recorder| state.evaluate(source, Some(recorder)))
    }

    pub fn set_state<I, K>(&mut self, patch: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let changed = self.state.set_state(patch);
        self.invalidate(&changed);
        changed
    }

    pub fn set_state_json(&mut self, patch: serde_json::Value) -> Vec<String> {
        let changed = self.state.set_state_json(patch);
        self.invalidate(&changed);
        changed
    }

    pub fn apply_set_statements(&mut self, text: &str) -> SetReport {
        let report = self.state.apply_set_statements(text);
        self.invalidate(&report.changed_paths);
        report
    }

    pub fn undo(&mut self) -> Result<HistoryStep, HistoryError> {
        let step = self.state.undo()?;
        self.invalidate(&step.changed_paths);
        Ok(step)
    }

    pub fn redo(&mut self) -> Result<HistoryStep, HistoryError> {
        let step = self.state.redo()?;
        self.invalidate(&step.changed_paths);
        Ok(step)
    }

    pub fn set_history_passage(&mut self, passage: impl Into<String>) -> SnapshotId {
        self.state.set_history_passage(passage)
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    pub fn cache(&self) -> &SmartCache<Value> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn compiler_stats(&self) -> CompilerStats {
        self.state.compiler_stats()
    }

    // An empty slice would clear the whole cache, so nothing changed means
    // nothing to do.
    fn invalidate(&mut self, changed: &[String]) {
        if !changed.is_empty() {
            self.cache.invalidate(changed);
        }
    }
}

impl Default for StoryEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine(json: serde_json::Value) -> StoryEngine {
        StoryEngine::new(StateStore::from_json(json), EngineConfig::default())
            .with_helpers(Helpers::with_seed(3))
    }

    #[test]
    fn test_cached_result_survives_unrelated_change() {
        let mut engine = engine(json!({ "gold": 10, "hp": 5 }));
        assert_eq!(engine.evaluate_cached("purse", "gold + 5"), Ok(Value::Number(15.0)));

        engine.set_state([("hp", Value::from(4))]);
        assert!(engine.cache().contains("purse"));
        assert_eq!(engine.evaluate_cached("purse", "gold + 5"), Ok(Value::Number(15.0)));
        assert_eq!(engine.cache_stats().hits, 1);
    }

    #[test]
    fn test_statements_invalidate() {
        let mut engine = engine(json!({ "hp": 10 }));
        engine.evaluate_cached("hp_line", "'HP: ' + hp").unwrap();

        engine.apply_set_statements("hp -= 3");
        assert!(!engine.cache().contains("hp_line"));
        assert_eq!(
            engine.evaluate_cached("hp_line", "'HP: ' + hp"),
            Ok(Value::string("HP: 7"))
        );
    }

    #[test]
    fn test_noop_mutation_keeps_cache() {
        let mut engine = engine(json!({ "gold": 10 }));
        engine.evaluate_cached("purse", "gold").unwrap();
        assert!(engine.set_state([("gold", Value::from(10))]).is_empty());
        assert!(engine.cache().contains("purse"));
    }

    #[test]
    fn test_undo_invalidates() {
        let mut engine = engine(json!({ "gold": 10 }));
        engine.set_history_passage("start");
        engine.set_state([("gold", Value::from(50))]);
        assert_eq!(engine.evaluate_cached("purse", "gold"), Ok(Value::Number(50.0)));

        engine.undo().unwrap();
        assert_eq!(engine.evaluate_cached("purse", "gold"), Ok(Value::Number(10.0)));

        engine.redo().unwrap();
        assert_eq!(engine.evaluate_cached("purse", "gold"), Ok(Value::Number(50.0)));
    }

    #[test]
    fn test_depth_error_is_not_cached() {
        let mut engine = engine(json!({ "x": 1 }));
        // Parses flat, but evaluates 150 levels deep.
        let deep = vec!["x"; 151].join(" + ");
        assert_eq!(
            engine.evaluate_cached("deep", &deep),
            Err(EvalError::DepthExceeded { limit: 100 })
        );
        assert!(!engine.cache().contains("deep"));
        assert_eq!(engine.cache().tracker().tracked_key_count(), 0);

        // A syntax error is not an evaluation error: it renders as null.
        assert_eq!(engine.evaluate_cached("broken", "x +"), Ok(Value::Null));
    }
}
