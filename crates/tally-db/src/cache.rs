//! # Snapshot Cache
//!
//! A read-through copy of one collection for the UI layer.
//!
//! ```text
//!   subscription ──on_change(Vec<T>)──► SnapshotCache::replace   (wholesale)
//!                                             │
//!   UI render ◄────────── snapshot() ─────────┘   Arc<Vec<T>>, never patched
//! ```
//!
//! The cache is a display hint only. Stock and balance checks always
//! re-read the database inside their transaction.

use std::sync::{Arc, RwLock};

/// Latest full snapshot of a collection.
#[derive(Debug)]
pub struct SnapshotCache<T> {
    inner: RwLock<Arc<Vec<T>>>,
}

impl<T> SnapshotCache<T> {
    pub fn new() -> Self {
        SnapshotCache {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replaces the cached snapshot atomically.
    pub fn replace(&self, items: Vec<T>) {
        let items = Arc::new(items);
        match self.inner.write() {
            Ok(mut guard) => *guard = items,
            Err(poisoned) => *poisoned.into_inner() = items,
        }
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl<T: Clone> SnapshotCache<T> {
    /// First cached item matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.snapshot().iter().find(|item| pred(item)).cloned()
    }
}

impl<T: Send + Sync + 'static> SnapshotCache<T> {
    /// Callback suitable for `UserScope::subscribe_*`.
    pub fn updater(self: &Arc<Self>) -> impl FnMut(Vec<T>) + Send + 'static {
        let cache = Arc::clone(self);
        move |items| cache.replace(items)
    }
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_is_wholesale() {
        let cache = SnapshotCache::new();
        cache.replace(vec![1, 2, 3]);
        let before = cache.snapshot();

        cache.replace(vec![4]);
        assert_eq!(*cache.snapshot(), vec![4]);
        // earlier readers keep their own consistent copy
        assert_eq!(*before, vec![1, 2, 3]);
    }

    #[test]
    fn test_find_and_len() {
        let cache = Arc::new(SnapshotCache::new());
        assert!(cache.is_empty());

        let mut update = cache.updater();
        update(vec!["flour".to_string(), "rice".to_string()]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find(|p| p.starts_with('r')), Some("rice".to_string()));
        assert_eq!(cache.find(|p| p == "salt"), None);
    }
}
