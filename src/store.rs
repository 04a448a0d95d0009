use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::feature::Feature;

/// The client's local snapshot of feature definitions.
///
/// Cloning is cheap and every clone shares the same snapshot. Definitions are held behind `Arc`
/// so a reader only holds the lock for the map lookup, and replacing a key swaps the whole
/// definition at once.
#[derive(Clone, Debug, Default)]
pub struct FeatureCache {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    features: RwLock<HashMap<String, Arc<Feature>>>,
    ready: AtomicBool,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Feature>> {
        self.inner.features.read().get(key).cloned()
    }

    /// Upsert every feature in `features` by key. Keys absent from the batch are kept.
    ///
    /// Returns the number of features written.
    pub fn replace_all(&self, features: Vec<Feature>) -> usize {
        let count = features.len();
        let mut map = self.inner.features.write();
        for feature in features {
            map.insert(feature.key.clone(), Arc::new(feature));
        }
        count
    }

    pub fn mark_ready(&self) {
        self.inner.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.features.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
