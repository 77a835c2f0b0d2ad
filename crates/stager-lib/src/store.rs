use crate::error::{AnnotateError, Result};
use crate::index::SegmentKey;
use crate::label::Label;
use std::collections::HashMap;

/// In-memory map from segment to its assigned stage.
///
/// Keys are not checked against the metadata index; callers write through
/// validated selections. Only the CSV export outlives the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationStore {
    labels: HashMap<SegmentKey, Label>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file: &str, segment: usize) -> Option<Label> {
        self.get_key(&SegmentKey::new(file, segment))
    }

    pub fn get_key(&self, key: &SegmentKey) -> Option<Label> {
        self.labels.get(key).copied()
    }

    /// Record `label`, returning whatever it replaced.
    pub fn set(&mut self, file: &str, segment: usize, label: Label) -> Option<Label> {
        self.labels.insert(SegmentKey::new(file, segment), label)
    }

    pub fn set_key(&mut self, key: SegmentKey, label: Label) -> Option<Label> {
        self.labels.insert(key, label)
    }

    pub fn remove(&mut self, key: &SegmentKey) -> Option<Label> {
        self.labels.remove(key)
    }

    /// Validate every code first, then apply in order so later rows win.
    ///
    /// An unrecognized code rejects the whole batch and leaves the store as it was.
    pub fn bulk_set<I, S>(&mut self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (SegmentKey, S)>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for (position, (key, code)) in entries.into_iter().enumerate() {
            let code = code.as_ref();
            let label = Label::from_code(code).ok_or_else(|| AnnotateError::InvalidLabel {
                position,
                code: code.to_string(),
            })?;
            parsed.push((key, label));
        }
        let applied = parsed.len();
        for (key, label) in parsed {
            self.labels.insert(key, label);
        }
        Ok(applied)
    }

    /// Entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&SegmentKey, Label)> {
        self.labels.iter().map(|(key, label)| (key, *label))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }
}
