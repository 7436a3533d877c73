//! Path trie indexing cache keys by the dotted paths they read.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// Keys bound to exactly this path.
    bound: HashSet<String>,
    /// Keys bound to this path or anything below it.
    subtree: HashSet<String>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.subtree.is_empty() && self.bound.is_empty()
    }
}

/// Trie over path segments.
///
/// Inserting `a.b.c` for key K adds K to the subtree sets of `a`, `a.b` and
/// `a.b.c`, so a lookup at any node sees every key reading at or below it.
#[derive(Debug, Default, Clone)]
pub struct PathTrie {
    root: TrieNode,
}

impl PathTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `path`.
    pub fn insert(&mut self, path: &str, key: &str) {
        let mut node = &mut self.root;
        for segment in path.split('.') {
            node = node.children.entry(segment.to_string()).or_default();
            node.subtree.insert(key.to_string());
        }
        node.bound.insert(key.to_string());
    }

    /// Unbind `key` from `path`, pruning nodes left with nothing in them.
    ///
    /// Only call this once per key for all of its paths together: the
    /// subtree sets do not count how many paths below a node hold the key.
    pub fn remove(&mut self, path: &str, key: &str) {
        let segments: Vec<&str> = path.split('.').collect();
        remove_from(&mut self.root, &segments, key);
    }

    /// Keys affected by a write to `path`.
    ///
    /// That is every key bound to `path` or one of its prefixes, plus every
    /// key bound somewhere below `path`.
    pub fn affected(&self, path: &str, out: &mut HashSet<String>) {
        let mut node = &self.root;
        for segment in path.split('.') {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return,
            }
            out.extend(node.bound.iter().cloned());
        }
        out.extend(node.subtree.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
    }
}

fn remove_from(node: &mut TrieNode, segments: &[&str], key: &str) {
    let Some((head, rest)) = segments.split_first() else {
        node.bound.remove(key);
        return;
    };
    let Some(child) = node.children.get_mut(*head) else {
        return;
    };

    child.subtree.remove(key);
    remove_from(child, rest, key);

    if child.is_empty() {
        node.children.remove(*head);
    }
}
