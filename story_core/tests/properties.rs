use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use story_core::{CacheConfig, DependencyTracker, EngineConfig, SmartCache, StoryEngine};
use story_expr::{Helpers, StateStore, Value};

fn helper_expr() -> impl Strategy<Value = String> {
    let n = -1000i32..1000;
    prop_oneof![
        n.clone().prop_map(|a| format!("abs({})", a)),
        (n.clone(), n.clone()).prop_map(|(a, b)| format!("max({}, {})", a, b)),
        (n.clone(), n.clone()).prop_map(|(a, b)| format!("min({}, {}) * 2", a, b)),
        n.clone().prop_map(|a| format!("clamp({}, -10, 10)", a)),
        n.clone().prop_map(|a| format!("pow({}, 2) - {}", a, a)),
        "[a-z]{0,8}".prop_map(|s| format!("upper('{}') + len('{}')", s, s)),
        "[a-z]{1,8}".prop_map(|s| format!("plural(2, '{}')", s)),
    ]
}

fn patch() -> impl Strategy<Value = Vec<(String, i32)>> {
    let path = prop_oneof![
        Just("gold".to_string()),
        Just("hp".to_string()),
        Just("max".to_string()),
        Just("player.level".to_string()),
        Just("abs".to_string()),
    ];
    proptest::collection::vec((path, any::<i32>()), 1..5)
}

fn root_names() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

proptest! {
    #[test]
    fn helper_only_expressions_ignore_state(source in helper_expr(), writes in patch()) {
        let store = StateStore::from_json(json!({ "gold": 1, "hp": 2 }));
        let mut engine = StoryEngine::new(store, EngineConfig::default())
            .with_helpers(Helpers::with_seed(9));

        let before = engine.evaluate(&source).unwrap();
        engine.set_state(writes.into_iter().map(|(path, n)| (path, Value::from(n))));
        let after = engine.evaluate(&source).unwrap();

        prop_assert!(before.same_value(&after), "{} changed: {} -> {}", source, before, after);
    }

    #[test]
    fn invalidation_is_exact_for_disjoint_roots(
        read in proptest::collection::hash_set(root_names(), 1..4),
        other in proptest::collection::hash_set(root_names(), 1..4),
        suffix in "[a-z]{1,4}",
    ) {
        let other: Vec<String> = other.difference(&read).cloned().collect();

        let mut cache: SmartCache<String> = SmartCache::with_defaults();
        cache
            .get_or_compute("derived", |recorder| {
                for root in &read {
                    recorder.record_access(&format!("{}.{}", root, suffix));
                }
                Ok::<_, ()>("value".to_string())
            })
            .unwrap();

        // An empty changed set means "clear everything", so only probe with
        // actual disjoint paths.
        if !other.is_empty() {
            prop_assert_eq!(cache.invalidate(&other), 0);
        }
        prop_assert!(cache.contains("derived"));

        let changed = read.iter().next().cloned().into_iter().collect::<Vec<_>>();
        prop_assert_eq!(cache.invalidate(&changed), 1);
        prop_assert!(!cache.contains("derived"));
        prop_assert_eq!(cache.tracker().tracked_key_count(), 0);
    }

    #[test]
    fn recomputation_replaces_dependencies(
        first in proptest::collection::hash_set(root_names(), 0..8),
        second in proptest::collection::hash_set(root_names(), 0..8),
    ) {
        let mut tracker = DependencyTracker::new();
        for paths in [&first, &second] {
            tracker.start_tracking("key");
            for path in paths {
                tracker.record_access(path);
            }
            tracker.stop_tracking();
        }

        prop_assert_eq!(tracker.dependency_count(), second.len());
        for stale in first.difference(&second) {
            prop_assert!(tracker.find_affected_keys(&[stale.as_str()]).is_empty());
        }
    }

    #[test]
    fn entries_and_bindings_stay_in_step(
        ops in proptest::collection::vec((0u8..4, 0usize..6, 0usize..4), 1..60),
    ) {
        let keys = ["k0", "k1", "k2", "k3", "k4", "k5"];
        let paths = ["a", "b.c", "b.d", "e"];
        let mut cache: SmartCache<String> = SmartCache::new(CacheConfig {
            initial_size: 3,
            min_size: 1,
            max_size: 4,
            adapt_interval: 7,
            ..CacheConfig::default()
        });

        for (op, key, path) in ops {
            let key = keys[key];
            match op {
                0 => {
                    let _ = cache.get_or_compute(key, |recorder| {
                        recorder.record_access(paths[path]);
                        Ok::<_, ()>(key.to_string())
                    });
                }
                1 => {
                    cache.invalidate(&[paths[path]]);
                }
                2 => cache.set(key, key.to_string()),
                _ => {
                    cache.get(key);
                }
            }
            prop_assert!(cache.len() <= cache.capacity());
        }

        let live: HashSet<&str> = cache.keys().collect();
        for key in keys {
            if !live.contains(key) {
                prop_assert!(cache.tracker().dependencies_of(key).is_none());
            }
        }
    }
}
