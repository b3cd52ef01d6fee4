//! Process-wide pool of key components.
//!
//! Millions of rows repeat the same donor, sample and analysis identifiers.
//! Interning makes every live key share one allocation per distinct value.
//! The pool only holds weak references: once the last [`Key`](crate::key::Key)
//! using a value is dropped the allocation is freed, and the dead slot is
//! pruned on the next insert into its bucket or by [`Interner::purge`].

use std::hash::{BuildHasher, RandomState};
use std::sync::{Arc, LazyLock, Weak};

use dashmap::DashMap;

/// A shared, immutable key component.
pub type Component = Arc<[u8]>;

static SHARED: LazyLock<Arc<Interner>> = LazyLock::new(|| Arc::new(Interner::new()));

/// Concurrent weak-reference interning pool keyed by byte content.
#[derive(Debug, Default)]
pub struct Interner {
    buckets: DashMap<u64, Vec<Weak<[u8]>>>,
    hasher: RandomState,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool shared by every validation in the process.
    pub fn shared() -> Arc<Interner> {
        Arc::clone(&SHARED)
    }

    /// Returns the pooled component equal to `bytes`, inserting it if absent.
    pub fn intern(&self, bytes: &[u8]) -> Component {
        let hash = self.hasher.hash_one(bytes);
        let mut bucket = self.buckets.entry(hash).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);

        if let Some(existing) = bucket
            .iter()
            .filter_map(Weak::upgrade)
            .find(|candidate| candidate.as_ref() == bytes)
        {
            return existing;
        }

        let component: Component = Arc::from(bytes);
        bucket.push(Arc::downgrade(&component));
        component
    }

    /// Drops every slot whose value is no longer referenced.
    pub fn purge(&self) {
        self.buckets.retain(|_, bucket| {
            bucket.retain(|weak| weak.strong_count() > 0);
            !bucket.is_empty()
        });
    }

    /// Number of live pooled values.
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| bucket.iter().filter(|w| w.strong_count() > 0).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
