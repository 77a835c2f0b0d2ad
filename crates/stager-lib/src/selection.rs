use crate::error::{AnnotateError, Result};
use crate::index::{MetadataIndex, SegmentKey, SegmentRef};

/// Currently active file and segment.
///
/// Every constructor and transition keeps the pair valid for the index it
/// was given, so `current` never misses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    file: String,
    segment: usize,
}

impl Selection {
    /// First file in index order, first segment.
    pub fn new(index: &MetadataIndex) -> Self {
        let file = index
            .file_ids()
            .next()
            .map(str::to_string)
            .unwrap_or_default();
        Self { file, segment: 0 }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn segment(&self) -> usize {
        self.segment
    }

    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(self.file.clone(), self.segment)
    }

    /// Switch files, keeping the segment when the new file has it and falling back to 0.
    pub fn select_file(&mut self, index: &MetadataIndex, file: &str) -> Result<()> {
        let count = index
            .segment_count(file)
            .ok_or_else(|| AnnotateError::UnknownFile(file.to_string()))?;
        self.file = file.to_string();
        if self.segment >= count {
            self.segment = 0;
        }
        Ok(())
    }

    pub fn select_segment(&mut self, index: &MetadataIndex, segment: usize) -> Result<()> {
        let count = index
            .segment_count(&self.file)
            .ok_or_else(|| AnnotateError::UnknownFile(self.file.clone()))?;
        if segment >= count {
            return Err(AnnotateError::OutOfRange {
                file: self.file.clone(),
                index: segment,
                count,
            });
        }
        self.segment = segment;
        Ok(())
    }

    /// Step forward within the file; stays put on the last segment.
    pub fn next_segment(&mut self, index: &MetadataIndex) -> bool {
        let count = index.segment_count(&self.file).unwrap_or(0);
        if self.segment + 1 < count {
            self.segment += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_segment(&mut self) -> bool {
        if self.segment > 0 {
            self.segment -= 1;
            true
        } else {
            false
        }
    }

    /// Move to the next file in index order, wrapping around.
    pub fn next_file(&mut self, index: &MetadataIndex) {
        self.step_file(index, 1);
    }

    pub fn prev_file(&mut self, index: &MetadataIndex) {
        let len = index.files().len();
        self.step_file(index, len.saturating_sub(1));
    }

    fn step_file(&mut self, index: &MetadataIndex, offset: usize) {
        let len = index.files().len();
        if len == 0 {
            return;
        }
        let pos = index.position(&self.file).unwrap_or(0);
        let target = index.files()[(pos + offset) % len].id.clone();
        // Target comes from the index itself.
        let _ = self.select_file(index, &target);
    }

    pub fn current<'i>(&self, index: &'i MetadataIndex) -> Option<&'i SegmentRef> {
        index.segment(&self.file, self.segment)
    }

    /// Chart references for the current segment: line charts, then the spectrogram.
    pub fn chart_refs(&self, index: &MetadataIndex) -> Vec<String> {
        self.current(index)
            .map(|segment| segment.chart_refs().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
