//! The state store: top-level narrative variables addressed by dotted paths.

use indexmap::IndexMap;
use std::sync::Arc;

use super::{parse_index, Map, Value};
use crate::error::PathError;

/// Mapping from variable names to values, addressed by dotted paths.
///
/// Each top-level variable sits behind an `Arc`, so cloning the store is a
/// shallow copy and a write copies only the variable it touches. History
/// snapshots share every untouched variable with the live store.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    vars: IndexMap<String, Arc<Value>>,
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON object. Non-object input gives an empty store.
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Object(map) => map.into_iter().collect(),
            _ => Self::new(),
        }
    }

    /// Get a top-level variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name).map(|v| v.as_ref())
    }

    /// Check if a top-level variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Read the value at a dotted path; `Undefined` if any segment is missing.
    pub fn get_path(&self, path: &str) -> Value {
        let segments: Vec<&str> = path.split('.').collect();
        self.get_segments(&segments)
    }

    /// Read the value at an already-split path.
    pub fn get_segments<S: AsRef<str>>(&self, segments: &[S]) -> Value {
        let Some((root, rest)) = segments.split_first() else {
            return Value::Undefined;
        };
        let mut current = self.get(root.as_ref());
        for (i, segment) in rest.iter().enumerate() {
            let Some(value) = current else {
                return Value::Undefined;
            };
            if i + 1 == rest.len() {
                return value.member(segment.as_ref());
            }
            current = value.member_ref(segment.as_ref());
        }
        current.cloned().unwrap_or(Value::Undefined)
    }

    /// Write `value` at a dotted path, creating intermediate objects.
    ///
    /// Returns `Ok(false)` for a no-op write; in that case nothing is copied
    /// and the variable stays shared with existing snapshots.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<bool, PathError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment {
                path: path.to_string(),
            });
        }

        if let Some(existing) = self.lookup(&segments) {
            if existing.same_value(&value) {
                return Ok(false);
            }
        }

        let (root, rest) = segments.split_first().ok_or_else(|| PathError::EmptySegment {
            path: path.to_string(),
        })?;

        if rest.is_empty() {
            self.vars.insert(root.to_string(), Arc::new(value));
            return Ok(true);
        }

        let slot = self
            .vars
            .entry(root.to_string())
            .or_insert_with(|| Arc::new(Value::object()));
        let mut current = Arc::make_mut(slot);

        for (i, segment) in rest.iter().enumerate() {
            let is_last = i + 1 == rest.len();
            let parent = segments[..=i].join(".");

            if current.is_nullish() {
                *current = Value::object();
            }

            current = match current {
                Value::Object(map) => {
                    if is_last {
                        map.insert(segment.to_string(), value);
                        return Ok(true);
                    }
                    map.entry(segment.to_string()).or_insert(Value::Undefined)
                }
                Value::Array(items) => {
                    // Writes may replace an element or append one, never leave holes.
                    let index = parse_index(segment)
                        .filter(|&index| index <= items.len())
                        .ok_or_else(|| PathError::InvalidIndex {
                            path: path.to_string(),
                            segment: segment.to_string(),
                        })?;
                    if index == items.len() {
                        items.push(Value::Undefined);
                    }
                    if is_last {
                        items[index] = value;
                        return Ok(true);
                    }
                    &mut items[index]
                }
                _ => {
                    return Err(PathError::NotContainer {
                        path: path.to_string(),
                        segment: parent,
                    })
                }
            };
        }

        Ok(true)
    }

    /// Remove a top-level variable.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars
            .shift_remove(name)
            .map(|v| Arc::try_unwrap(v).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Names of all top-level variables, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Check whether two stores still share the same allocation for `name`.
    pub fn shares_variable(&self, other: &StateStore, name: &str) -> bool {
        match (self.vars.get(name), other.vars.get(name)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Copy the whole store into a single object value.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().clone()))
                .collect::<Map>(),
        )
    }

    /// Dotted paths whose values differ between `self` and `other`.
    ///
    /// Objects are compared member by member so the result names the most
    /// specific changed paths; shared variables are skipped without a walk.
    pub fn changed_paths(&self, other: &StateStore) -> Vec<String> {
        let mut changed = Vec::new();

        for (name, value) in &self.vars {
            match other.vars.get(name) {
                Some(theirs) if Arc::ptr_eq(value, theirs) => {}
                Some(theirs) => diff_values(name.clone(), value, theirs, &mut changed),
                None => changed.push(name.clone()),
            }
        }
        for name in other.vars.keys() {
            if !self.vars.contains_key(name) {
                changed.push(name.clone());
            }
        }

        changed
    }

    fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        let (root, rest) = segments.split_first()?;
        let mut current = self.get(root.as_ref())?;
        for segment in rest {
            current = current.member_ref(segment.as_ref())?;
        }
        Some(current)
    }
}

fn diff_values(path: String, old: &Value, new: &Value, out: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in a {
                let child = format!("{}.{}", path, key);
                match b.get(key) {
                    Some(other) => diff_values(child, value, other, out),
                    None => out.push(child),
                }
            }
            for key in b.keys() {
                if !a.contains_key(key) {
                    out.push(format!("{}.{}", path, key));
                }
            }
        }
        _ => {
            if !old.same_value(new) {
                out.push(path);
            }
        }
    }
}

impl FromIterator<(String, Value)> for StateStore {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }
}

impl PartialEq for StateStore {
    fn eq(&self, other: &Self) -> bool {
        self.vars.len() == other.vars.len()
            && self.vars.iter().all(|(k, v)| {
                other
                    .vars
                    .get(k)
                    .map(|w| Arc::ptr_eq(v, w) || v.same_value(w))
                    .unwrap_or(false)
            })
    }
}
