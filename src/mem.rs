//! Environment frames.
//!
//! A [`Mem`] is a name→value mapping with an optional parent frame. Frames
//! are handed around as [`MemRef`] (shared, interior-mutable handles) so a
//! closure can keep its defining frame alive while call frames fork children
//! off it. The handles are atomically refcounted so values that embed them
//! can cross the config loader's worker-thread boundary; within a single
//! evaluation context all access is still sequential.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::object::Value;

pub type MemRef = Arc<Mutex<Mem>>;

/// A fresh root frame with no parent.
pub fn new_frame() -> MemRef {
    Arc::new(Mutex::new(Mem::default()))
}

/// A fresh child frame whose parent is `parent`. Call scopes live in forked
/// frames; the parent is never mutated by the fork itself.
pub fn fork(parent: &MemRef) -> MemRef {
    Arc::new(Mutex::new(Mem {
        parent: Some(parent.clone()),
        symbols: HashMap::new(),
    }))
}

/// Lock a frame handle. Lock poisoning is recovered rather than propagated:
/// a panic mid-operation indicates a host bug, not corrupt frame state.
pub fn lock(frame: &MemRef) -> MutexGuard<'_, Mem> {
    frame.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct Mem {
    parent: Option<MemRef>,
    symbols: HashMap<String, Value>,
}

impl Mem {
    /// Look up `key`, walking the parent chain when `search_parent` is set.
    pub fn get(&self, key: &str, search_parent: bool) -> Option<Value> {
        if let Some(value) = self.symbols.get(key) {
            return Some(value.clone());
        }
        if search_parent && let Some(parent) = &self.parent {
            return lock(parent).get(key, true);
        }
        None
    }

    /// Bind `key`. With `search_parent`, an existing binding in the nearest
    /// enclosing frame is updated in place; otherwise (or when no ancestor
    /// holds the name) the binding lands in this frame. This is what makes
    /// `set` both a declaration and a re-binding.
    pub fn set(&mut self, key: &str, value: Value, search_parent: bool) {
        if self.symbols.contains_key(key) {
            self.symbols.insert(key.to_owned(), value);
            return;
        }
        if search_parent && let Some(parent) = self.parent.clone() {
            if lock(&parent).get(key, true).is_some() {
                lock(&parent).set(key, value, true);
                return;
            }
        }
        self.symbols.insert(key.to_owned(), value);
    }

    /// Remove the nearest binding for `key`. Missing names are a no-op.
    pub fn delete(&mut self, key: &str, search_parent: bool) {
        if self.symbols.remove(key).is_some() {
            return;
        }
        if search_parent && let Some(parent) = &self.parent {
            lock(parent).delete(key, true);
        }
    }

    /// Snapshot of the names bound in this frame (local only).
    pub fn keys(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    /// Snapshot of the values bound in this frame (local only).
    pub fn values(&self) -> Vec<Value> {
        self.symbols.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }
}
