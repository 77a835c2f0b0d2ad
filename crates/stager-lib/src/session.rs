//! Event-driven labelling session.
//!
//! Controls emit [`Event`]s, [`Session::apply`] runs each one to completion,
//! and [`Session::view`] re-derives everything the View displays.

use crate::error::Result;
use crate::index::{MetadataIndex, SegmentKey};
use crate::label::Label;
use crate::progress::Progress;
use crate::selection::Selection;
use crate::store::AnnotationStore;
use crate::summary::{per_file_counts, summary_rows, FileCounts, SummaryRow};
use crate::transcode::{self, ImportReport};
use log::{debug, warn};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SelectFile(String),
    SelectSegment(usize),
    NextSegment,
    PrevSegment,
    NextFile,
    PrevFile,
    SetLabel(Label),
    ClearLabel,
    ImportCsv(PathBuf),
    ExportCsv(PathBuf),
}

/// What an applied event changed, for status messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Selected(SegmentKey),
    Unchanged,
    Labelled {
        key: SegmentKey,
        label: Label,
        previous: Option<Label>,
    },
    Cleared {
        key: SegmentKey,
        previous: Option<Label>,
    },
    Imported(ImportReport),
    Exported {
        path: PathBuf,
        rows: usize,
    },
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::Selected(key) => format!("Selected {}", key),
            Outcome::Unchanged => "No change".to_string(),
            Outcome::Labelled { key, label, previous } => match previous {
                Some(prev) if prev != label => format!(
                    "{} classified as {} ({}), was {}",
                    key,
                    label.name(),
                    label.code(),
                    prev.code()
                ),
                _ => format!("{} classified as {} ({})", key, label.name(), label.code()),
            },
            Outcome::Cleared { key, previous } => match previous {
                Some(prev) => format!("{} cleared (was {})", key, prev.code()),
                None => format!("{} had no label", key),
            },
            Outcome::Imported(report) if report.unknown.is_empty() => {
                format!("Annotations loaded: {} rows", report.applied)
            }
            Outcome::Imported(report) => format!(
                "Annotations loaded: {} rows ({} not in the index)",
                report.applied,
                report.unknown.len()
            ),
            Outcome::Exported { path, rows } => {
                format!("Exported {} annotations to {}", rows, path.display())
            }
        }
    }
}

/// Everything the View shows, recomputed from state.
#[derive(Debug, Clone)]
pub struct ViewModel {
    pub file: String,
    /// 1-based.
    pub segment: usize,
    pub segment_count: usize,
    pub label: Option<Label>,
    pub progress: Progress,
    pub files: Vec<FileCounts>,
    pub summary: Vec<SummaryRow>,
    pub chart_refs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    index: MetadataIndex,
    store: AnnotationStore,
    selection: Selection,
}

impl Session {
    pub fn new(index: MetadataIndex) -> Self {
        let selection = Selection::new(&index);
        Self {
            index,
            store: AnnotationStore::new(),
            selection,
        }
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Apply one event. Failed events leave the session as it was.
    pub fn apply(&mut self, event: Event) -> Result<Outcome> {
        debug!("applying {:?}", event);
        let outcome = match event {
            Event::SelectFile(file) => {
                self.selection.select_file(&self.index, &file)?;
                Outcome::Selected(self.selection.key())
            }
            Event::SelectSegment(segment) => {
                self.selection.select_segment(&self.index, segment)?;
                Outcome::Selected(self.selection.key())
            }
            Event::NextSegment => self.moved(|sel, index| sel.next_segment(index)),
            Event::PrevSegment => self.moved(|sel, _| sel.prev_segment()),
            Event::NextFile => self.moved(|sel, index| {
                sel.next_file(index);
                true
            }),
            Event::PrevFile => self.moved(|sel, index| {
                sel.prev_file(index);
                true
            }),
            Event::SetLabel(label) => {
                let key = self.selection.key();
                let previous = self.store.set_key(key.clone(), label);
                Outcome::Labelled {
                    key,
                    label,
                    previous,
                }
            }
            Event::ClearLabel => {
                let key = self.selection.key();
                let previous = self.store.remove(&key);
                Outcome::Cleared { key, previous }
            }
            Event::ImportCsv(path) => {
                let report = transcode::import_file(&path, &self.index, &mut self.store)
                    .inspect_err(|err| warn!("import of {} rejected: {}", path.display(), err))?;
                Outcome::Imported(report)
            }
            Event::ExportCsv(path) => {
                let rows = transcode::write_csv_file(&path, &self.index, &self.store)?;
                Outcome::Exported { path, rows }
            }
        };
        Ok(outcome)
    }

    fn moved<F>(&mut self, step: F) -> Outcome
    where
        F: FnOnce(&mut Selection, &MetadataIndex) -> bool,
    {
        if step(&mut self.selection, &self.index) {
            Outcome::Selected(self.selection.key())
        } else {
            Outcome::Unchanged
        }
    }

    pub fn progress(&self) -> Progress {
        Progress::compute(&self.index, &self.store)
    }

    pub fn export_string(&self) -> Result<String> {
        transcode::export_string(&self.index, &self.store)
    }

    pub fn view(&self) -> ViewModel {
        let file = self.selection.file().to_string();
        ViewModel {
            segment: self.selection.segment() + 1,
            segment_count: self.index.segment_count(&file).unwrap_or(0),
            label: self.store.get(&file, self.selection.segment()),
            progress: self.progress(),
            files: per_file_counts(&self.index, &self.store),
            summary: summary_rows(&self.index, &self.store),
            chart_refs: self.selection.chart_refs(&self.index),
            file,
        }
    }
}
