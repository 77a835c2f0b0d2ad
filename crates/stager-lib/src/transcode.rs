//! `File,Segment,SleepStage` CSV import and export.
//!
//! Segments are 1-based in the file and 0-based in the store.

use crate::error::{AnnotateError, Result};
use crate::index::{MetadataIndex, SegmentKey};
use crate::label::Label;
use crate::store::AnnotationStore;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const HEADER: [&str; 3] = ["File", "Segment", "SleepStage"];

/// Conventional export file name.
pub const DEFAULT_EXPORT_NAME: &str = "annotations.csv";

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows applied to the store.
    pub applied: usize,
    /// Imported keys that the metadata index does not know about.
    pub unknown: Vec<SegmentKey>,
}

/// Store entries in export order: index order first, then unknown keys sorted.
pub fn export_rows(index: &MetadataIndex, store: &AnnotationStore) -> Vec<(SegmentKey, Label)> {
    let mut known = Vec::with_capacity(store.len());
    let mut unknown = Vec::new();
    for (key, label) in store.entries() {
        match index.position(&key.file) {
            Some(pos) if key.segment < index.files()[pos].segments.len() => {
                known.push((pos, key.clone(), label))
            }
            _ => unknown.push((key.clone(), label)),
        }
    }
    known.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.segment.cmp(&b.1.segment)));
    unknown.sort_by(|a, b| a.0.cmp(&b.0));
    known
        .into_iter()
        .map(|(_, key, label)| (key, label))
        .chain(unknown)
        .collect()
}

pub fn write_csv<W: Write>(
    writer: W,
    index: &MetadataIndex,
    store: &AnnotationStore,
) -> Result<usize> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let rows = export_rows(index, store);
    writer.write_record(HEADER).map_err(csv_write_error)?;
    for (key, label) in &rows {
        let segment = key.display_segment().to_string();
        writer
            .write_record([key.file.as_str(), segment.as_str(), label.code()])
            .map_err(csv_write_error)?;
    }
    writer.flush().map_err(|err| AnnotateError::csv(err.to_string()))?;
    Ok(rows.len())
}

pub fn export_string(index: &MetadataIndex, store: &AnnotationStore) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, index, store)?;
    String::from_utf8(buf).map_err(|err| AnnotateError::csv(err.to_string()))
}

pub fn write_csv_file(path: &Path, index: &MetadataIndex, store: &AnnotationStore) -> Result<usize> {
    let file = File::create(path)
        .map_err(|err| AnnotateError::io("failed to create annotations", path, err))?;
    let rows = write_csv(file, index, store)?;
    info!("exported {} annotations to {}", rows, path.display());
    Ok(rows)
}

fn csv_write_error(err: csv::Error) -> AnnotateError {
    AnnotateError::csv(format!("writing row: {}", err))
}

/// Parse every row without touching a store.
///
/// Labels are returned as raw codes so that validation happens in
/// [`AnnotationStore::bulk_set`].
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<(SegmentKey, String)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|err| AnnotateError::csv(format!("reading header: {}", err)))?
        .clone();
    let file_idx = locate_column(&headers, HEADER[0])?;
    let segment_idx = locate_column(&headers, HEADER[1])?;
    let stage_idx = locate_column(&headers, HEADER[2])?;

    let mut rows = Vec::new();
    for (n, result) in reader.records().enumerate() {
        // Header is row 1.
        let row = n + 2;
        let record = result.map_err(|err| AnnotateError::csv_row(row, err.to_string()))?;
        let file = field(&record, file_idx, row, HEADER[0])?;
        if file.is_empty() {
            return Err(AnnotateError::csv_row(row, "empty File value"));
        }
        let segment = parse_segment(field(&record, segment_idx, row, HEADER[1])?, row)?;
        let code = field(&record, stage_idx, row, HEADER[2])?;
        rows.push((SegmentKey::new(file, segment), code.to_string()));
    }
    Ok(rows)
}

/// Parse and apply a CSV in one step; on any error the store is unchanged.
pub fn read_csv<R: Read>(
    reader: R,
    index: &MetadataIndex,
    store: &mut AnnotationStore,
) -> Result<ImportReport> {
    let rows = parse_csv(reader)?;
    let unknown: Vec<SegmentKey> = rows
        .iter()
        .filter(|(key, _)| !index.contains(key))
        .map(|(key, _)| key.clone())
        .collect();
    let applied = store.bulk_set(rows)?;
    if !unknown.is_empty() {
        warn!(
            "{} imported annotation(s) reference segments missing from the index",
            unknown.len()
        );
    }
    debug!("applied {} imported annotation rows", applied);
    Ok(ImportReport { applied, unknown })
}

pub fn import_str(
    text: &str,
    index: &MetadataIndex,
    store: &mut AnnotationStore,
) -> Result<ImportReport> {
    read_csv(text.as_bytes(), index, store)
}

pub fn import_file(
    path: &Path,
    index: &MetadataIndex,
    store: &mut AnnotationStore,
) -> Result<ImportReport> {
    let file = File::open(path)
        .map_err(|err| AnnotateError::io("failed to open annotations", path, err))?;
    let report = read_csv(file, index, store)?;
    info!("imported {} annotations from {}", report.applied, path.display());
    Ok(report)
}

fn locate_column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| AnnotateError::csv(format!("missing {} column", name)))
}

fn field<'r>(record: &'r StringRecord, idx: usize, row: usize, name: &str) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| AnnotateError::csv_row(row, format!("missing {} value", name)))
}

/// 1-based segment number to a 0-based index. Accepts `3` and `3.0`.
fn parse_segment(value: &str, row: usize) -> Result<usize> {
    let number = match value.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let float: f64 = value.parse().map_err(|_| {
                AnnotateError::csv_row(row, format!("segment {:?} is not a number", value))
            })?;
            if !float.is_finite() || float.fract() != 0.0 {
                return Err(AnnotateError::csv_row(
                    row,
                    format!("segment {:?} is not a whole number", value),
                ));
            }
            if float.abs() >= i64::MAX as f64 {
                return Err(AnnotateError::csv_row(
                    row,
                    format!("segment {:?} is too large", value),
                ));
            }
            float as i64
        }
    };
    if number < 1 {
        return Err(AnnotateError::csv_row(
            row,
            format!("segment {} must be >= 1", number),
        ));
    }
    Ok((number - 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::sample_index;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn empty_store_exports_header_only() {
        let csv = export_string(&sample_index(), &AnnotationStore::new()).unwrap();
        assert_eq!(csv, "File,Segment,SleepStage\n");
    }

    #[test]
    fn export_orders_by_index_then_segment() {
        let index = sample_index();
        let mut store = AnnotationStore::new();
        store.set("A", 1, Label::Rem);
        store.set("A", 0, Label::Wake);
        store.set("B", 0, Label::Artifact);
        store.set("Z", 4, Label::NonRem);
        let csv = export_string(&index, &store).unwrap();
        assert_eq!(
            csv,
            "File,Segment,SleepStage\nB,1,A\nA,1,W\nA,2,R\nZ,5,N\n"
        );
    }

    #[test]
    fn import_converts_segments_to_zero_based() {
        let index = sample_index();
        let mut store = AnnotationStore::new();
        let report = import_str(
            "File,Segment,SleepStage\nA,2,N\nB,1.0,R\n",
            &index,
            &mut store,
        )
        .unwrap();
        assert_eq!(report.applied, 2);
        assert!(report.unknown.is_empty());
        assert_eq!(store.get("A", 1), Some(Label::NonRem));
        assert_eq!(store.get("B", 0), Some(Label::Rem));
    }

    #[test]
    fn import_tolerates_column_order_and_extra_columns() {
        let index = sample_index();
        let mut store = AnnotationStore::new();
        import_str(
            "SleepStage,Notes,File,Segment\nW,first,A,1\n",
            &index,
            &mut store,
        )
        .unwrap();
        assert_eq!(store.get("A", 0), Some(Label::Wake));
    }

    #[test]
    fn missing_column_is_malformed() {
        let mut store = AnnotationStore::new();
        let err = import_str("File,Segment\nA,1\n", &sample_index(), &mut store).unwrap_err();
        assert!(matches!(err, AnnotateError::MalformedCsv { row: None, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn bad_segment_aborts_without_mutation() {
        let index = sample_index();
        for body in [
            "A,0,W",
            "A,x,W",
            "A,1.5,W",
            "A,-2,W",
            ",1,W",
            "A,1e30,W",
            "A,-1e30,W",
            "A,inf,W",
        ] {
            let mut store = AnnotationStore::new();
            store.set("B", 0, Label::Rem);
            let text = format!("File,Segment,SleepStage\nA,1,N\n{}\n", body);
            let err = import_str(&text, &index, &mut store).unwrap_err();
            assert!(
                matches!(err, AnnotateError::MalformedCsv { row: Some(3), .. }),
                "{body}: {err:?}"
            );
            assert_eq!(store.len(), 1);
            assert_eq!(store.get("A", 0), None);
        }
    }

    #[test]
    fn invalid_label_aborts_import() {
        let index = sample_index();
        let mut store = AnnotationStore::new();
        let err = import_str(
            "File,Segment,SleepStage\nA,1,W\nA,2,Undefined\n",
            &index,
            &mut store,
        )
        .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidLabel { position: 1, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_keys_are_reported_but_applied() {
        let index = sample_index();
        let mut store = AnnotationStore::new();
        let report = import_str("File,Segment,SleepStage\nC,1,W\nA,3,R\n", &index, &mut store)
            .unwrap();
        assert_eq!(
            report.unknown,
            vec![SegmentKey::new("C", 0), SegmentKey::new("A", 2)]
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_EXPORT_NAME);
        let index = sample_index();
        let mut store = AnnotationStore::new();
        store.set("A", 0, Label::Wake);
        store.set("B", 0, Label::NonRem);
        assert_eq!(write_csv_file(&path, &index, &store).unwrap(), 2);
        let mut fresh = AnnotationStore::new();
        import_file(&path, &index, &mut fresh).unwrap();
        assert_eq!(fresh, store);
    }

    #[test]
    fn file_names_with_commas_are_quoted() {
        let index = sample_index();
        let mut store = AnnotationStore::new();
        store.set("night 1, left.edf", 0, Label::Rem);
        let csv = export_string(&index, &store).unwrap();
        assert!(csv.contains("\"night 1, left.edf\",1,R"));
        let mut fresh = AnnotationStore::new();
        import_str(&csv, &index, &mut fresh).unwrap();
        assert_eq!(fresh.get("night 1, left.edf", 0), Some(Label::Rem));
    }

    #[test]
    fn round_trip_keeps_ids_with_inner_spaces_and_commas() {
        let index = MetadataIndex::from_json_str(
            r#"{"night 01": {"segments": [{"line_figs": [], "spectrogram_fig": "a"}]},
                "ward 3, bed 2": {"segments": [{"line_figs": [], "spectrogram_fig": "b"}]}}"#,
        )
        .unwrap();
        let mut store = AnnotationStore::new();
        store.set("night 01", 0, Label::Wake);
        store.set("ward 3, bed 2", 0, Label::Rem);
        let csv = export_string(&index, &store).unwrap();
        let mut fresh = AnnotationStore::new();
        let report = import_str(&csv, &index, &mut fresh).unwrap();
        assert!(report.unknown.is_empty());
        assert_eq!(fresh, store);
    }

    proptest! {
        #[test]
        fn prop_export_import_round_trip(
            writes in vec((prop::sample::select(vec!["A", "B", "C"]), 0usize..5,
                           prop::sample::select(Label::ALL.to_vec())), 0..40)
        ) {
            let index = sample_index();
            let mut store = AnnotationStore::new();
            for (file, segment, label) in writes {
                store.set(file, segment, label);
            }
            let csv = export_string(&index, &store).unwrap();
            let mut fresh = AnnotationStore::new();
            import_str(&csv, &index, &mut fresh).unwrap();
            prop_assert_eq!(fresh, store);
        }
    }
}
