//! Precomputed chart definitions, passed through to a renderer untouched.

use crate::error::{AnnotateError, Result};
use crate::index::{MetadataIndex, SegmentRef};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A serialized chart. Contents are opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartDocument(pub serde_json::Value);

impl ChartDocument {
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Spectrogram,
}

/// One chart position in a segment's display, loaded or not.
#[derive(Debug, Clone)]
pub struct ChartSlot {
    pub reference: String,
    pub kind: ChartKind,
    pub path: PathBuf,
    pub chart: std::result::Result<ChartDocument, String>,
}

impl ChartSlot {
    pub fn is_loaded(&self) -> bool {
        self.chart.is_ok()
    }
}

pub trait ChartRenderer {
    /// Draw a loaded chart or a placeholder for a failed one.
    fn draw(&mut self, slot: &ChartSlot) -> anyhow::Result<()>;
}

pub fn load_chart(path: &Path) -> Result<ChartDocument> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| AnnotateError::io("failed to read chart", path, err))?;
    serde_json::from_str(&text).map_err(|err| {
        AnnotateError::io(
            "failed to parse chart",
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        )
    })
}

/// Load every chart of a segment. A failing chart becomes an error slot.
pub fn load_segment_charts(index: &MetadataIndex, segment: &SegmentRef) -> Vec<ChartSlot> {
    let lines = segment
        .line_figs
        .iter()
        .map(|reference| (reference, ChartKind::Line));
    let spectrogram = std::iter::once((&segment.spectrogram_fig, ChartKind::Spectrogram));
    lines
        .chain(spectrogram)
        .map(|(reference, kind)| {
            let path = index.resolve(reference);
            let chart = load_chart(&path).map_err(|err| {
                warn!("chart {} unavailable: {}", reference, err);
                err.to_string()
            });
            ChartSlot {
                reference: reference.clone(),
                kind,
                path,
                chart,
            }
        })
        .collect()
}

/// Draw each slot, collecting renderer failures instead of stopping at the first.
pub fn render_segment<R: ChartRenderer>(renderer: &mut R, slots: &[ChartSlot]) -> Vec<String> {
    slots
        .iter()
        .filter_map(|slot| {
            renderer
                .draw(slot)
                .err()
                .map(|err| format!("{}: {}", slot.reference, err))
        })
        .collect()
}
