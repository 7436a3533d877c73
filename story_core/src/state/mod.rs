//! State Manager - the single owner of the live state store.
//!
//! All mutation goes through here: JSON-style patches, set statements
//! evaluated against the store, and undo/redo swaps. Each mutation reports
//! the dotted paths it actually changed, and the registered listener hears
//! about it, which is how downstream caches learn what to invalidate.

mod history;
mod statements;

pub use history::{Snapshot, SnapshotId};
pub use statements::AssignOp;

use serde::{Deserialize, Serialize};
use std::fmt;
use story_expr::{
    Compiler, CompilerConfig, CompilerStats, DependencyRecorder, EvalError, Evaluator, Helpers,
    StateStore, Value,
};

use crate::error::{HistoryError, StatementError};
use crate::events::{ChangeListener, ChangeNotification};
use history::History;
use statements::{parse_statement, split_statements};

/// Configuration for the state manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Bound on each of the undo and redo stacks.
    pub max_history: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { max_history: 50 }
    }
}

/// Outcome of [`StateManager::apply_set_statements`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetReport {
    pub changed_paths: Vec<String>,
    /// Statements that were skipped, in order.
    pub skipped: Vec<StatementError>,
}

/// Outcome of an undo or redo.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStep {
    pub snapshot_id: SnapshotId,
    /// Passage the restored state belongs to.
    pub passage: Option<String>,
    pub changed_paths: Vec<String>,
}

/// Owns the live store, its history, and the compiler used for set
/// statements.
pub struct StateManager {
    store: StateStore,
    history: History,
    current_passage: Option<String>,
    compiler: Compiler,
    helpers: Helpers,
    listener: Option<ChangeListener>,
}

impl StateManager {
    /// Create a manager over `store`.
    pub fn new(store: StateStore, config: StateConfig, compiler: CompilerConfig) -> Self {
        Self {
            store,
            history: History::new(config.max_history),
            current_passage: None,
            compiler: Compiler::new(compiler),
            helpers: Helpers::new(),
            listener: None,
        }
    }

    /// Create a manager over an empty store with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(
            StateStore::new(),
            StateConfig::default(),
            CompilerConfig::default(),
        )
    }

    /// Replace the helper table, e.g. with a seeded one for reproducible dice.
    pub fn with_helpers(mut self, helpers: Helpers) -> Self {
        self.helpers = helpers;
        self
    }

    /// Register the change listener, replacing any previous one.
    pub fn on_change(&mut self, listener: impl FnMut(&ChangeNotification) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Write each `(path, value)` pair. Returns the paths that changed.
    ///
    /// Writes that would not change anything produce no entry. A path that
    /// cannot be written (empty segment, writing through a scalar) is skipped.
    pub fn set_state<I, K>(&mut self, patch: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut changed = Vec::new();
        for (path, value) in patch {
            let path = path.as_ref();
            match self.store.set_path(path, value) {
                Ok(true) => push_unique(&mut changed, path.to_string()),
                Ok(false) => {}
                Err(err) => log::warn!("skipping state write: {}", err),
            }
        }
        self.commit(changed)
    }

    /// [`set_state`](Self::set_state) with a JSON object of path to value.
    ///
    /// Anything other than an object is an empty patch.
    pub fn set_state_json(&mut self, patch: serde_json::Value) -> Vec<String> {
        match patch {
            serde_json::Value::Object(entries) => {
                self.set_state(entries.into_iter().map(|(path, value)| (path, Value::from(value))))
            }
            other => {
                log::warn!("ignoring non-object state patch: {}", other);
                Vec::new()
            }
        }
    }

    /// Run `;`-separated statements like `hp -= 3; flags.met = true`.
    ///
    /// Each statement sees the effects of the ones before it. A statement
    /// that fails to parse, compile, evaluate or write is skipped and the
    /// rest still run.
    pub fn apply_set_statements(&mut self, text: &str) -> SetReport {
        let mut report = SetReport::default();
        let mut changed = Vec::new();

        for statement in split_statements(text) {
            match self.run_statement(statement) {
                Ok(Some(path)) => push_unique(&mut changed, path),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("skipping set statement: {}", err);
                    report.skipped.push(err);
                }
            }
        }

        report.changed_paths = self.commit(changed);
        report
    }

    fn run_statement(&mut self, statement: &str) -> Result<Option<String>, StatementError> {
        let parsed = parse_statement(statement)?;

        let expr = self.compiler.compile(parsed.expr);
        if self.compiler.is_failure(&expr) {
            return Err(StatementError::Compile {
                statement: statement.to_string(),
            });
        }

        let rhs = self
            .evaluator()
            .evaluate(&expr, None)
            .map_err(|source| StatementError::Eval {
                statement: statement.to_string(),
                source,
            })?;

        let value = match parsed.op {
            AssignOp::Set => rhs,
            op => op.apply(&self.store.get_path(&parsed.target), rhs),
        };

        let changed = self
            .store
            .set_path(&parsed.target, value)
            .map_err(|source| StatementError::Path {
                statement: statement.to_string(),
                source,
            })?;

        Ok(changed.then_some(parsed.target))
    }

    /// Compile and evaluate `source` against the live store.
    pub fn evaluate(
        &mut self,
        source: &str,
        recorder: Option<&mut dyn DependencyRecorder>,
    ) -> Result<Value, EvalError> {
        let expr = self.compiler.compile(source);
        self.evaluator().evaluate(&expr, recorder)
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.store, &self.helpers).with_max_depth(self.compiler.config().max_depth)
    }

    /// Record the state as it is on leaving `passage`.
    ///
    /// Call before navigating away so that undo restores both the state and
    /// the location. Clears the redo stack.
    pub fn set_history_passage(&mut self, passage: impl Into<String>) -> SnapshotId {
        let snapshot = Snapshot::new(self.store.clone(), Some(passage.into()));
        let id = snapshot.id;
        self.history.push_undo(snapshot);
        self.history.clear_redo();
        id
    }

    /// Restore the most recent undo snapshot.
    pub fn undo(&mut self) -> Result<HistoryStep, HistoryError> {
        let snapshot = self.history.pop_undo().ok_or(HistoryError::NothingToUndo)?;
        let current = self.snapshot();
        self.history.push_redo(current);
        Ok(self.restore(snapshot))
    }

    /// Reapply the most recently undone snapshot.
    pub fn redo(&mut self) -> Result<HistoryStep, HistoryError> {
        let snapshot = self.history.pop_redo().ok_or(HistoryError::NothingToRedo)?;
        let current = self.snapshot();
        self.history.push_undo(current);
        Ok(self.restore(snapshot))
    }

    fn restore(&mut self, snapshot: Snapshot) -> HistoryStep {
        let changed_paths = self.store.changed_paths(&snapshot.state);
        self.store = snapshot.state;
        self.current_passage = snapshot.passage.clone();
        self.notify(&changed_paths);

        HistoryStep {
            snapshot_id: snapshot.id,
            passage: snapshot.passage,
            changed_paths,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.undo_len() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history.redo_len() > 0
    }

    /// Number of snapshots on the undo stack.
    pub fn undo_depth(&self) -> usize {
        self.history.undo_len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn set_current_passage(&mut self, passage: impl Into<String>) {
        self.current_passage = Some(passage.into());
    }

    pub fn current_passage(&self) -> Option<&str> {
        self.current_passage.as_deref()
    }

    /// A frozen copy of the live state and passage.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.store.clone(), self.current_passage.clone())
    }

    /// Read the value at a dotted path.
    pub fn get(&self, path: &str) -> Value {
        self.store.get_path(path)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }

    pub fn compiler_stats(&self) -> CompilerStats {
        self.compiler.stats()
    }

    /// Clear redo and notify the listener if anything changed.
    fn commit(&mut self, changed: Vec<String>) -> Vec<String> {
        if !changed.is_empty() {
            self.history.clear_redo();
            self.notify(&changed);
        }
        changed
    }

    fn notify(&mut self, changed: &[String]) {
        if changed.is_empty() {
            return;
        }
        if let Some(listener) = self.listener.as_mut() {
            let notification = ChangeNotification::from_store(&self.store, changed.to_vec());
            listener(&notification);
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("store", &self.store)
            .field("current_passage", &self.current_passage)
            .field("undo", &self.history.undo_len())
            .field("redo", &self.history.redo_len())
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

fn push_unique(paths: &mut Vec<String>, path: String) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}
