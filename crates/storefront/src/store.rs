//! Local collection store.
//!
//! Holds the best-known snapshot of one collection and lets any number of
//! consumers read or observe it. Backed by a `tokio::sync::watch` channel so
//! replacements are atomic and every subscriber sees the latest snapshot.
//! The store performs no validation; it trusts its caller.

use std::sync::Arc;

use bazaar_core::{Collection, CollectionKind};
use tokio::sync::watch;

/// The snapshots on either side of an applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub before: Collection,
    pub after: Collection,
}

/// Injectable, cheaply cloneable store for one collection kind.
#[derive(Clone, Debug)]
pub struct CollectionStore {
    kind: CollectionKind,
    inner: Arc<watch::Sender<Collection>>,
}

impl CollectionStore {
    /// An empty store.
    #[must_use]
    pub fn new(kind: CollectionKind) -> Self {
        let (sender, _) = watch::channel(Collection::empty(kind));
        Self {
            kind,
            inner: Arc::new(sender),
        }
    }

    /// The collection kind this store holds.
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// The current snapshot, possibly pending confirmation.
    #[must_use]
    pub fn get(&self) -> Collection {
        self.inner.borrow().clone()
    }

    /// Read the current snapshot without cloning it.
    pub fn read<T>(&self, f: impl FnOnce(&Collection) -> T) -> T {
        f(&self.inner.borrow())
    }

    /// Overwrite the snapshot and notify subscribers. Returns the previous one.
    pub fn replace(&self, collection: Collection) -> Collection {
        self.inner.send_replace(collection)
    }

    /// Apply a mutation in place.
    ///
    /// `f` reports whether it changed anything. When it did, subscribers are
    /// notified and both snapshots are returned; otherwise nothing is
    /// published and `None` is returned.
    pub fn apply(&self, f: impl FnOnce(&mut Collection) -> bool) -> Option<Applied> {
        let mut applied = None;
        self.inner.send_if_modified(|current| {
            let before = current.clone();
            let changed = f(current);
            if changed {
                applied = Some(Applied {
                    before,
                    after: current.clone(),
                });
            }
            changed
        });
        applied
    }

    /// Discard the snapshot (sign-out).
    pub fn clear(&self) {
        self.replace(Collection::empty(self.kind));
    }

    /// Observe every replacement of the snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Collection> {
        self.inner.subscribe()
    }
}
