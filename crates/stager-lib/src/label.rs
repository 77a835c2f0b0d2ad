use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker shown for segments without a recorded label.
pub const UNDEFINED: &str = "Undefined";

/// Sleep stage assigned to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "W")]
    Wake,
    #[serde(rename = "N")]
    NonRem,
    #[serde(rename = "R")]
    Rem,
    #[serde(rename = "A")]
    Artifact,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::Wake, Label::NonRem, Label::Rem, Label::Artifact];

    /// Single-letter code used in the annotations CSV.
    pub fn code(self) -> &'static str {
        match self {
            Label::Wake => "W",
            Label::NonRem => "N",
            Label::Rem => "R",
            Label::Artifact => "A",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Label::Wake => "Wake",
            Label::NonRem => "Non-REM",
            Label::Rem => "REM",
            Label::Artifact => "Artifact",
        }
    }

    /// Parse a CSV code. Surrounding whitespace is ignored; case is not.
    pub fn from_code(code: &str) -> Option<Label> {
        match code.trim() {
            "W" => Some(Label::Wake),
            "N" => Some(Label::NonRem),
            "R" => Some(Label::Rem),
            "A" => Some(Label::Artifact),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sleep stage {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::from_code(s).ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Render an optional label the way the summary table shows it.
pub fn display_label(label: Option<Label>) -> &'static str {
    label.map(Label::code).unwrap_or(UNDEFINED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for label in Label::ALL {
            assert_eq!(Label::from_code(label.code()), Some(label));
        }
    }

    #[test]
    fn rejects_unknown_and_lowercase_codes() {
        assert_eq!(Label::from_code("w"), None);
        assert_eq!(Label::from_code("Undefined"), None);
        assert_eq!(Label::from_code(""), None);
        assert!("X".parse::<Label>().is_err());
        assert_eq!(" R ".parse::<Label>(), Ok(Label::Rem));
        let err = "Deep".parse::<Label>().unwrap_err();
        assert_eq!(err.to_string(), "unknown sleep stage \"Deep\"");
    }

    #[test]
    fn undefined_marker_for_missing_labels() {
        assert_eq!(display_label(None), "Undefined");
        assert_eq!(display_label(Some(Label::NonRem)), "N");
        assert_eq!(Label::NonRem.name(), "Non-REM");
    }
}
