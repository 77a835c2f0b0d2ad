//! Read-only catalog of recordings, their segments, and the chart files
//! precomputed for each segment.
//!
//! The on-disk form is a JSON object keyed by file identifier:
//!
//! ```json
//! { "night01.edf": { "segments": [
//!     { "line_figs": ["night01_seg1_eeg.json"], "spectrogram_fig": "night01_seg1_spec.json" }
//! ] } }
//! ```
//!
//! File order follows the document, not key order.

use crate::error::{AnnotateError, Result};
use log::debug;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Identity of a segment: file identifier plus zero-based segment index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub file: String,
    pub segment: usize,
}

impl SegmentKey {
    pub fn new(file: impl Into<String>, segment: usize) -> Self {
        Self {
            file: file.into(),
            segment,
        }
    }

    /// Segment number as shown to users and written to CSV.
    pub fn display_segment(&self) -> usize {
        self.segment + 1
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.file, self.display_segment())
    }
}

/// Chart references for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub line_figs: Vec<String>,
    pub spectrogram_fig: String,
}

impl SegmentRef {
    /// Line charts in order, then the spectrogram.
    pub fn chart_refs(&self) -> impl Iterator<Item = &str> {
        self.line_figs
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.spectrogram_fig.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub id: String,
    pub segments: Vec<SegmentRef>,
}

#[derive(Deserialize)]
struct RawFileEntry {
    segments: Vec<SegmentRef>,
}

/// JSON object that keeps its keys in document order.
struct OrderedCatalog(Vec<(String, RawFileEntry)>);

impl<'de> Deserialize<'de> for OrderedCatalog {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = OrderedCatalog;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping file identifiers to segment listings")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut files: Vec<(String, RawFileEntry)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, entry)) = map.next_entry::<String, RawFileEntry>()? {
                    // Repeated keys keep their first position and take the last value.
                    match files.iter_mut().find(|(existing, _)| *existing == id) {
                        Some(slot) => slot.1 = entry,
                        None => files.push((id, entry)),
                    }
                }
                Ok(OrderedCatalog(files))
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

#[derive(Debug, Clone)]
pub struct MetadataIndex {
    files: Vec<FileEntry>,
    positions: HashMap<String, usize>,
    figures_dir: PathBuf,
}

impl MetadataIndex {
    /// Load `metadata.json`; chart references resolve next to it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| AnnotateError::io("failed to read metadata index", path, err))?;
        let figures_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let index = Self::from_json_str(&text)?.with_figures_dir(figures_dir);
        debug!(
            "loaded metadata index {} ({} files, {} segments)",
            path.display(),
            index.files.len(),
            index.total_segments()
        );
        Ok(index)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let catalog: OrderedCatalog = serde_json::from_reader(reader)
            .map_err(|err| AnnotateError::MalformedIndex(err.to_string()))?;
        Self::from_catalog(catalog)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let catalog: OrderedCatalog = serde_json::from_str(text)
            .map_err(|err| AnnotateError::MalformedIndex(err.to_string()))?;
        Self::from_catalog(catalog)
    }

    /// Build an index directly from file entries, applying the same checks as parsing.
    pub fn from_entries(entries: Vec<FileEntry>) -> Result<Self> {
        let catalog = entries
            .into_iter()
            .map(|entry| (entry.id, RawFileEntry { segments: entry.segments }))
            .collect();
        Self::from_catalog(OrderedCatalog(catalog))
    }

    fn from_catalog(catalog: OrderedCatalog) -> Result<Self> {
        if catalog.0.is_empty() {
            return Err(AnnotateError::MalformedIndex(
                "catalog lists no files".into(),
            ));
        }
        let mut files = Vec::with_capacity(catalog.0.len());
        let mut positions = HashMap::with_capacity(catalog.0.len());
        for (id, raw) in catalog.0 {
            // Ids must survive the trimmed CSV round trip unchanged.
            if id.is_empty() || id.trim() != id {
                return Err(AnnotateError::MalformedIndex(format!(
                    "file id {:?} is empty or has surrounding whitespace",
                    id
                )));
            }
            if raw.segments.is_empty() {
                return Err(AnnotateError::MalformedIndex(format!(
                    "file {:?} lists no segments",
                    id
                )));
            }
            positions.insert(id.clone(), files.len());
            files.push(FileEntry {
                id,
                segments: raw.segments,
            });
        }
        Ok(Self {
            files,
            positions,
            figures_dir: PathBuf::new(),
        })
    }

    pub fn with_figures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.figures_dir = dir.into();
        self
    }

    pub fn figures_dir(&self) -> &Path {
        &self.figures_dir
    }

    /// Path of a chart reference on disk.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.figures_dir.join(reference)
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|entry| entry.id.as_str())
    }

    pub fn file(&self, id: &str) -> Option<&FileEntry> {
        self.position(id).map(|pos| &self.files[pos])
    }

    /// Position of a file in index order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn segment_count(&self, id: &str) -> Option<usize> {
        self.file(id).map(|entry| entry.segments.len())
    }

    pub fn segment(&self, id: &str, segment: usize) -> Option<&SegmentRef> {
        self.file(id).and_then(|entry| entry.segments.get(segment))
    }

    pub fn contains(&self, key: &SegmentKey) -> bool {
        self.segment(&key.file, key.segment).is_some()
    }

    pub fn total_segments(&self) -> usize {
        self.files.iter().map(|entry| entry.segments.len()).sum()
    }

    /// Every valid segment key, grouped by file in index order.
    pub fn keys(&self) -> impl Iterator<Item = SegmentKey> + '_ {
        self.files.iter().flat_map(|entry| {
            (0..entry.segments.len()).map(move |segment| SegmentKey::new(entry.id.clone(), segment))
        })
    }
}
