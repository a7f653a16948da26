use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::path::normalize;

/// Inbox of changed file paths shared between the watcher thread and the
/// compiler.
///
/// Cloning yields another handle to the same queue. The lock is only held
/// while pushing or draining.
#[derive(Debug, Clone, Default)]
pub struct ChangeQueue {
    changed: Arc<Mutex<Vec<String>>>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a changed path. Safe to call from any thread.
    pub fn push(&self, path: &str) {
        let normalized = normalize(path);
        self.changed.lock().push(normalized);
    }

    /// Takes every queued path, oldest first, with duplicates removed.
    pub fn drain_all(&self) -> Vec<String> {
        let drained = std::mem::take(&mut *self.changed.lock());
        let mut seen = HashSet::with_capacity(drained.len());
        drained
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.changed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.lock().is_empty()
    }
}
