use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the annotation core.
///
/// `MalformedIndex` is fatal at startup. `MalformedCsv` and `InvalidLabel`
/// reject an import and leave the store untouched. `OutOfRange` and
/// `UnknownFile` come from selection changes the View should never issue.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("malformed metadata index: {0}")]
    MalformedIndex(String),

    #[error("malformed annotations CSV{}: {message}", row_suffix(*.row))]
    MalformedCsv { row: Option<usize>, message: String },

    #[error("invalid sleep stage {code:?} at entry {position} (expected one of W, N, R, A)")]
    InvalidLabel { position: usize, code: String },

    #[error("segment {index} is out of range for {file} ({count} segments)")]
    OutOfRange {
        file: String,
        index: usize,
        count: usize,
    },

    #[error("file {0:?} is not in the metadata index")]
    UnknownFile(String),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnnotateError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv_row(row: usize, message: impl Into<String>) -> Self {
        Self::MalformedCsv {
            row: Some(row),
            message: message.into(),
        }
    }

    pub(crate) fn csv(message: impl Into<String>) -> Self {
        Self::MalformedCsv {
            row: None,
            message: message.into(),
        }
    }

    /// True for errors that reject a single user action without ending the session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AnnotateError::MalformedIndex(_))
    }
}

fn row_suffix(row: Option<usize>) -> String {
    match row {
        Some(row) => format!(" (row {})", row),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_messages_carry_row_numbers() {
        let err = AnnotateError::csv_row(4, "segment must be >= 1");
        assert_eq!(
            err.to_string(),
            "malformed annotations CSV (row 4): segment must be >= 1"
        );
        let err = AnnotateError::csv("missing column SleepStage");
        assert_eq!(
            err.to_string(),
            "malformed annotations CSV: missing column SleepStage"
        );
    }

    #[test]
    fn only_index_errors_are_fatal() {
        assert!(!AnnotateError::MalformedIndex("empty".into()).is_recoverable());
        assert!(AnnotateError::UnknownFile("x".into()).is_recoverable());
    }
}
