use crate::index::MetadataIndex;
use crate::label::{display_label, Label};
use crate::store::AnnotationStore;
use serde::{Serialize, Serializer};

/// One line of the classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub file: String,
    /// 1-based.
    pub segment: usize,
    #[serde(serialize_with = "serialize_classification")]
    pub classification: Option<Label>,
}

impl SummaryRow {
    pub fn classification_text(&self) -> &'static str {
        display_label(self.classification)
    }
}

fn serialize_classification<S>(label: &Option<Label>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(display_label(*label))
}

/// Every segment in index order with its current label or `Undefined`.
pub fn summary_rows(index: &MetadataIndex, store: &AnnotationStore) -> Vec<SummaryRow> {
    index
        .keys()
        .map(|key| SummaryRow {
            classification: store.get_key(&key),
            segment: key.display_segment(),
            file: key.file,
        })
        .collect()
}

/// Labelled and total segment counts for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    pub file: String,
    pub labelled: usize,
    pub total: usize,
}

pub fn per_file_counts(index: &MetadataIndex, store: &AnnotationStore) -> Vec<FileCounts> {
    index
        .files()
        .iter()
        .map(|entry| FileCounts {
            file: entry.id.clone(),
            labelled: (0..entry.segments.len())
                .filter(|&segment| store.get(&entry.id, segment).is_some())
                .count(),
            total: entry.segments.len(),
        })
        .collect()
}
