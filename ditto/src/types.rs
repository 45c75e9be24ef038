//! Common types shared by capture, persistence and playback.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{DittoError, Result};

/// Date layout every work date and reference date must follow.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A fixed on-screen pixel position, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Position> for (i32, i32) {
    fn from(pos: Position) -> Self {
        (pos.x, pos.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The six screen controls a run drives, in canonical capture order.
///
/// The declaration order doubles as the capture walk order and the
/// on-disk key order, so keep it stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordLabel {
    /// Text field that receives each work date.
    DateField,
    /// Button that refreshes the record grid for the entered date.
    LookupButton,
    /// Text field that receives the reference date records are copied from.
    ReferenceDateField,
    /// Row or cell that selects the item to copy into.
    ItemSelector,
    /// Button that starts the copy-from-previous action.
    CopyPreviousButton,
    /// Button that confirms the copy.
    CopyButton,
}

impl CoordLabel {
    /// All labels in canonical capture order.
    pub const ALL: [CoordLabel; 6] = [
        CoordLabel::DateField,
        CoordLabel::LookupButton,
        CoordLabel::ReferenceDateField,
        CoordLabel::ItemSelector,
        CoordLabel::CopyPreviousButton,
        CoordLabel::CopyButton,
    ];

    /// Stable text key, identical to the serialized form.
    pub fn key(&self) -> &'static str {
        match self {
            CoordLabel::DateField => "date_field",
            CoordLabel::LookupButton => "lookup_button",
            CoordLabel::ReferenceDateField => "reference_date_field",
            CoordLabel::ItemSelector => "item_selector",
            CoordLabel::CopyPreviousButton => "copy_previous_button",
            CoordLabel::CopyButton => "copy_button",
        }
    }

    /// Operator-facing description used in capture prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            CoordLabel::DateField => "work date entry field",
            CoordLabel::LookupButton => "lookup button",
            CoordLabel::ReferenceDateField => "reference date entry field",
            CoordLabel::ItemSelector => "item selection row",
            CoordLabel::CopyPreviousButton => "copy-previous-record button",
            CoordLabel::CopyButton => "copy confirm button",
        }
    }

    /// Parse a text key back into a label.
    pub fn from_key(key: &str) -> Option<CoordLabel> {
        CoordLabel::ALL.into_iter().find(|label| label.key() == key)
    }
}

impl fmt::Display for CoordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One calendar date to process, kept as its validated `YYYY-MM-DD` text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkDate(String);

impl WorkDate {
    /// Validate a single date token. Surrounding whitespace is tolerated;
    /// the stored text is the trimmed token.
    pub fn parse(token: &str) -> Result<Self> {
        parse_strict_date(token, token)?;
        Ok(Self(token.trim().to_string()))
    }

    pub(crate) fn from_naive(date: NaiveDate) -> Self {
        Self(date.format(DATE_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkDate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strict `YYYY-MM-DD` parse. `chrono` alone accepts unpadded fields such
/// as `2025-7-1`, so the parsed date is formatted back and compared against
/// the trimmed input. `token` is the full user-visible token for error
/// reporting; `text` is the piece of it being parsed.
pub(crate) fn parse_strict_date(token: &str, text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    let parsed = NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|err| {
        DittoError::InvalidDateFormat {
            token: token.to_string(),
            reason: err.to_string(),
        }
    })?;
    if parsed.format(DATE_FORMAT).to_string() != trimmed {
        return Err(DittoError::InvalidDateFormat {
            token: token.to_string(),
            reason: format!("`{trimmed}` is not a zero-padded YYYY-MM-DD date"),
        });
    }
    Ok(parsed)
}

/// Non-character keys the playback sequence presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Delete,
    Escape,
}

/// Modifier keys usable in combos such as select-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Control,
    Alt,
    Shift,
}

/// Step of the per-date sequence, attached to runtime failures so an
/// operator can tell how far a date got before things went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStep {
    EnterReferenceDate,
    EnterDate,
    TriggerLookup,
    SelectItem,
    CopyPrevious,
    ConfirmDialog,
    ConfirmCopy,
}

impl fmt::Display for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActionStep::EnterReferenceDate => "entering the reference date",
            ActionStep::EnterDate => "entering the work date",
            ActionStep::TriggerLookup => "triggering the lookup",
            ActionStep::SelectItem => "selecting the item",
            ActionStep::CopyPrevious => "starting the copy",
            ActionStep::ConfirmDialog => "confirming the dialog",
            ActionStep::ConfirmCopy => "confirming the copy",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_serializes_as_pair() {
        let json = serde_json::to_string(&Position::new(310, 184)).unwrap();
        assert_eq!(json, "[310,184]");
        let back: Position = serde_json::from_str("[310, 184]").unwrap();
        assert_eq!(back, Position::new(310, 184));
    }

    #[test]
    fn position_rejects_malformed_pairs() {
        assert!(serde_json::from_str::<Position>("[310]").is_err());
        assert!(serde_json::from_str::<Position>("[1, 2, 3]").is_err());
        assert!(serde_json::from_str::<Position>("{\"x\": 1, \"y\": 2}").is_err());
    }

    #[test]
    fn label_keys_round_trip() {
        for label in CoordLabel::ALL {
            assert_eq!(CoordLabel::from_key(label.key()), Some(label));
        }
        assert_eq!(CoordLabel::from_key("serch_xy"), None);
    }

    #[test]
    fn work_date_accepts_padded_tokens() {
        let date = WorkDate::parse("  2025-07-01 ").unwrap();
        assert_eq!(date.as_str(), "2025-07-01");
    }

    #[test]
    fn work_date_rejects_other_layouts() {
        for bad in [
            "2025/07/01",
            "07-01-2025",
            "2025-13-01",
            "2025-7-01",
            "2025-07-1",
            "not a date",
            "",
        ] {
            let err = WorkDate::parse(bad).unwrap_err();
            assert!(matches!(
                err,
                crate::errors::DittoError::InvalidDateFormat { .. }
            ));
        }
    }
}
