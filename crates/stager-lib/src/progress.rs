use crate::index::MetadataIndex;
use crate::store::AnnotationStore;
use serde::{Deserialize, Serialize};

/// Classification progress, derived on demand from the index and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub classified: usize,
    pub total: usize,
    pub remaining: usize,
}

impl Progress {
    /// Entries for segments outside the index do not count as progress.
    pub fn compute(index: &MetadataIndex, store: &AnnotationStore) -> Self {
        let classified = store.entries().filter(|(key, _)| index.contains(key)).count();
        let total = index.total_segments();
        Self {
            classified,
            total,
            remaining: total - classified,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.classified as f64 * 100.0 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}
