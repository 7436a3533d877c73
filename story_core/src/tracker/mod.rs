//! Dependency Tracker - which cache keys read which state paths.
//!
//! A computation is bracketed by [`DependencyTracker::start_tracking`] and
//! [`DependencyTracker::stop_tracking`]; every path the evaluator reports in
//! between becomes that key's dependency set, replacing whatever the key was
//! bound to before.

mod trie;

pub use trie::PathTrie;

use std::collections::{HashMap, HashSet};
use story_expr::DependencyRecorder;

#[derive(Debug, Clone)]
struct Session {
    key: String,
    paths: HashSet<String>,
}

/// Bindings from cache keys to dotted state paths, indexed by a path trie.
#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    trie: PathTrie,

    /// Committed dependency set per key.
    bindings: HashMap<String, HashSet<String>>,

    /// The computation currently being tracked, if any.
    session: Option<Session>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a tracking session for `key`.
    ///
    /// An already open session is dropped, not merged.
    pub fn start_tracking(&mut self, key: impl Into<String>) {
        let key = key.into();
        if let Some(previous) = self.session.take() {
            log::debug!(
                "tracking session for '{}' replaced by '{}' before it was committed",
                previous.key,
                key
            );
        }
        self.session = Some(Session {
            key,
            paths: HashSet::new(),
        });
    }

    /// Record a read of `path` in the open session, along with its prefixes.
    ///
    /// Reads outside a session are ignored.
    pub fn record_access(&mut self, path: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut end = 0;
        for segment in path.split('.') {
            end += segment.len();
            session.paths.insert(path[..end].to_string());
            end += 1;
        }
    }

    /// Commit the open session, replacing the key's previous bindings.
    ///
    /// Returns the committed key, or `None` if no session was open.
    pub fn stop_tracking(&mut self) -> Option<String> {
        let Session { key, paths } = self.session.take()?;
        self.remove_key(&key);

        log::trace!("'{}' depends on {} path(s)", key, paths.len());
        for path in &paths {
            self.trie.insert(path, &key);
        }
        self.bindings.insert(key.clone(), paths);
        Some(key)
    }

    /// Discard the open session without touching committed bindings.
    pub fn abort_tracking(&mut self) {
        self.session = None;
    }

    /// Whether a session is open.
    pub fn is_tracking(&self) -> bool {
        self.session.is_some()
    }

    /// Remove every binding for `key`. Returns whether it had any.
    pub fn remove_key(&mut self, key: &str) -> bool {
        let Some(paths) = self.bindings.remove(key) else {
            return false;
        };
        for path in &paths {
            self.trie.remove(path, key);
        }
        true
    }

    /// Drop all bindings and any open session.
    pub fn clear(&mut self) {
        self.trie.clear();
        self.bindings.clear();
        self.session = None;
    }

    /// Keys whose dependency sets overlap any of the changed paths.
    pub fn find_affected_keys<S: AsRef<str>>(&self, changed: &[S]) -> HashSet<String> {
        let mut affected = HashSet::new();
        for path in changed {
            self.trie.affected(path.as_ref(), &mut affected);
        }
        affected
    }

    /// Number of keys with committed bindings.
    pub fn tracked_key_count(&self) -> usize {
        self.bindings.len()
    }

    /// Total number of bound paths across all keys.
    pub fn dependency_count(&self) -> usize {
        self.bindings.values().map(HashSet::len).sum()
    }

    /// The committed dependency set of `key`.
    pub fn dependencies_of(&self, key: &str) -> Option<&HashSet<String>> {
        self.bindings.get(key)
    }
}

impl DependencyRecorder for DependencyTracker {
    fn record_access(&mut self, path: &str) {
        DependencyTracker::record_access(self, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(keys: HashSet<String>) -> Vec<String> {
        let mut keys: Vec<_> = keys.into_iter().collect();
        keys.sort();
        keys
    }

    fn track(tracker: &mut DependencyTracker, key: &str, paths: &[&str]) {
        tracker.start_tracking(key);
        for path in paths {
            tracker.record_access(path);
        }
        tracker.stop_tracking();
    }

    #[test]
    fn test_record_access_adds_prefixes() {
        let mut tracker = DependencyTracker::new();
        track(&mut tracker, "k", &["player.stats.str"]);

        let deps = tracker.dependencies_of("k").unwrap();
        assert_eq!(deps.len(), 3);
        assert!(deps.contains("player"));
        assert!(deps.contains("player.stats"));
        assert!(deps.contains("player.stats.str"));
    }

    #[test]
    fn test_find_affected_keys() {
        let mut tracker = DependencyTracker::new();
        track(&mut tracker, "greeting", &["name"]);
        track(&mut tracker, "status", &["player.hp"]);
        track(&mut tracker, "sheet", &["player"]);

        assert_eq!(sorted(tracker.find_affected_keys(&["name"])), vec!["greeting"]);
        assert_eq!(
            sorted(tracker.find_affected_keys(&["player.hp"])),
            vec!["sheet", "status"]
        );
        assert_eq!(
            sorted(tracker.find_affected_keys(&["player"])),
            vec!["sheet", "status"]
        );
        assert!(tracker.find_affected_keys(&["gold"]).is_empty());
        assert!(tracker.find_affected_keys::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_recompute_replaces_bindings() {
        let mut tracker = DependencyTracker::new();
        track(&mut tracker, "k", &["a", "b", "c.d"]);
        assert_eq!(tracker.dependency_count(), 4);

        track(&mut tracker, "k", &["e"]);
        assert_eq!(tracker.dependency_count(), 1);
        assert!(tracker.find_affected_keys(&["a"]).is_empty());
        assert!(tracker.find_affected_keys(&["c.d"]).is_empty());
        assert_eq!(sorted(tracker.find_affected_keys(&["e"])), vec!["k"]);
    }

    #[test]
    fn test_second_start_replaces_session() {
        let mut tracker = DependencyTracker::new();
        tracker.start_tracking("first");
        tracker.record_access("a");
        tracker.start_tracking("second");
        tracker.record_access("b");
        assert_eq!(tracker.stop_tracking().as_deref(), Some("second"));

        assert!(tracker.dependencies_of("first").is_none());
        let deps = tracker.dependencies_of("second").unwrap();
        assert_eq!(deps.len(), 1);
        assert!(deps.contains("b"));
    }

    #[test]
    fn test_abort_keeps_committed_bindings() {
        let mut tracker = DependencyTracker::new();
        track(&mut tracker, "k", &["a"]);

        tracker.start_tracking("k");
        tracker.record_access("z");
        tracker.abort_tracking();

        assert!(!tracker.is_tracking());
        assert_eq!(sorted(tracker.find_affected_keys(&["a"])), vec!["k"]);
        assert!(tracker.find_affected_keys(&["z"]).is_empty());
        assert_eq!(tracker.stop_tracking(), None);
    }

    #[test]
    fn test_reads_outside_session_are_ignored() {
        let mut tracker = DependencyTracker::new();
        tracker.record_access("a");
        assert_eq!(tracker.dependency_count(), 0);
    }

    #[test]
    fn test_remove_key_and_clear() {
        let mut tracker = DependencyTracker::new();
        track(&mut tracker, "one", &["a.b"]);
        track(&mut tracker, "two", &["a.c"]);

        assert!(tracker.remove_key("one"));
        assert!(!tracker.remove_key("one"));
        assert_eq!(sorted(tracker.find_affected_keys(&["a"])), vec!["two"]);
        assert_eq!(tracker.tracked_key_count(), 1);

        tracker.clear();
        assert_eq!(tracker.tracked_key_count(), 0);
        assert!(tracker.find_affected_keys(&["a"]).is_empty());
    }

    #[test]
    fn test_key_with_no_reads_is_tracked() {
        let mut tracker = DependencyTracker::new();
        track(&mut tracker, "constant", &[]);
        assert_eq!(tracker.tracked_key_count(), 1);
        assert_eq!(tracker.dependency_count(), 0);
    }
}
