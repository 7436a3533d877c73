//! # Story Core
//!
//! The stateful side of the narrative state engine. This crate owns the live
//! state store and its history, tracks which derived content read which
//! state paths, and caches that content until one of those paths changes.
//! Expressions themselves are compiled and evaluated by `story_expr`.
//!
//! ## Core Components
//!
//! - **state**: The single owner of mutable state, with bounded undo/redo
//! - **tracker**: Path trie mapping state paths to the cache keys that read them
//! - **cache**: Adaptive LRU cache invalidated by changed paths
//! - **engine**: Facade routing every mutation's changed paths into the cache
//! - **events**: Change notifications for the outside observer
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use story_core::{EngineConfig, StoryEngine};
//! use story_expr::{StateStore, Value};
//!
//! let store = StateStore::from_json(json!({ "gold": 10 }));
//! let mut engine = StoryEngine::new(store, EngineConfig::default());
//!
//! assert_eq!(engine.evaluate_cached("purse", "gold + 5"), Ok(Value::Number(15.0)));
//! assert_eq!(engine.set_state([("gold", Value::from(20))]), vec!["gold"]);
//! assert_eq!(engine.evaluate_cached("purse", "gold + 5"), Ok(Value::Number(25.0)));
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod state;
pub mod tracker;

pub use cache::{CacheConfig, CacheEntry, CacheStats, EstimateSize, SmartCache};
pub use config::EngineConfig;
pub use engine::StoryEngine;
pub use error::{ConfigError, HistoryError, StatementError};
pub use events::{ChangeListener, ChangeNotification, PatchEntry};
pub use state::{
    AssignOp, HistoryStep, SetReport, Snapshot, SnapshotId, StateConfig, StateManager,
};
pub use tracker::{DependencyTracker, PathTrie};
