//! Date-specification parsing and expansion.
//!
//! A specification is free-form text mixing single `YYYY-MM-DD` dates and
//! inclusive `start~end` ranges, separated by commas or newlines. Expansion
//! is all-or-nothing: one bad token rejects the whole input so a run never
//! starts against a partially understood work list.

use tracing::debug;

use crate::errors::{DittoError, Result};
use crate::types::{parse_strict_date, WorkDate};

const RANGE_SEPARATOR: char = '~';

/// Expand a date specification into an ordered work list.
///
/// Ranges expand to every calendar day from start to end inclusive, in
/// normalized `YYYY-MM-DD` form. Single tokens pass through as their trimmed
/// text. Token order is preserved; duplicates are kept as written.
pub fn expand_spec(raw: &str) -> Result<Vec<WorkDate>> {
    let mut dates = Vec::new();
    for token in tokens(raw) {
        expand_token(token, &mut dates)?;
    }
    debug!(count = dates.len(), "expanded date specification");
    Ok(dates)
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn expand_token(token: &str, dates: &mut Vec<WorkDate>) -> Result<()> {
    let Some((start, end)) = token.split_once(RANGE_SEPARATOR) else {
        dates.push(WorkDate::parse(token)?);
        return Ok(());
    };

    let start_date = parse_strict_date(token, start)?;
    let end_date = parse_strict_date(token, end)?;
    if start_date > end_date {
        return Err(DittoError::InvalidDateFormat {
            token: token.to_string(),
            reason: format!(
                "range start {} is after range end {}",
                start.trim(),
                end.trim()
            ),
        });
    }

    let mut day = start_date;
    while day <= end_date {
        dates.push(WorkDate::from_naive(day));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    Ok(())
}

/// Ordered work-list builder for incremental date selection.
///
/// Single dates added one at a time are deduplicated, matching how a
/// calendar picker behaves when the same day is clicked twice. Dates coming
/// from a specification are appended as expanded, duplicates included.
#[derive(Debug, Clone, Default)]
pub struct WorkList {
    dates: Vec<WorkDate>,
}

impl WorkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single date unless it is already listed. Returns whether
    /// the date was added.
    pub fn add(&mut self, date: WorkDate) -> bool {
        if self.dates.contains(&date) {
            return false;
        }
        self.dates.push(date);
        true
    }

    /// Expand `raw` and append every resulting date. Returns how many dates
    /// were appended; on error the list is left untouched.
    pub fn extend_spec(&mut self, raw: &str) -> Result<usize> {
        let expanded = expand_spec(raw)?;
        let count = expanded.len();
        self.dates.extend(expanded);
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[WorkDate] {
        &self.dates
    }

    pub fn into_dates(self) -> Vec<WorkDate> {
        self.dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(dates: &[WorkDate]) -> Vec<&str> {
        dates.iter().map(WorkDate::as_str).collect()
    }

    #[test]
    fn expands_single_dates_in_order() {
        let dates = expand_spec("2025-07-01, 2025-07-03,2025-07-02").unwrap();
        assert_eq!(texts(&dates), ["2025-07-01", "2025-07-03", "2025-07-02"]);
    }

    #[test]
    fn expands_ranges_inclusively() {
        let dates = expand_spec("2025-07-01~2025-07-04").unwrap();
        assert_eq!(
            texts(&dates),
            ["2025-07-01", "2025-07-02", "2025-07-03", "2025-07-04"]
        );
    }

    #[test]
    fn single_day_range_yields_one_date() {
        let dates = expand_spec("2025-07-01~2025-07-01").unwrap();
        assert_eq!(texts(&dates), ["2025-07-01"]);
    }

    #[test]
    fn range_crosses_month_boundary() {
        let dates = expand_spec("2025-06-29~2025-07-02").unwrap();
        assert_eq!(
            texts(&dates),
            ["2025-06-29", "2025-06-30", "2025-07-01", "2025-07-02"]
        );
    }

    #[test]
    fn range_covers_leap_day() {
        let dates = expand_spec("2024-02-28~2024-03-01").unwrap();
        assert_eq!(texts(&dates), ["2024-02-28", "2024-02-29", "2024-03-01"]);
    }

    #[test]
    fn mixes_tokens_and_separators() {
        let dates = expand_spec("2025-07-01\n2025-07-03~2025-07-04,  2025-07-10").unwrap();
        assert_eq!(
            texts(&dates),
            ["2025-07-01", "2025-07-03", "2025-07-04", "2025-07-10"]
        );
    }

    #[test]
    fn tolerates_whitespace_around_range_endpoints() {
        let dates = expand_spec(" 2025-07-01 ~ 2025-07-02 ").unwrap();
        assert_eq!(texts(&dates), ["2025-07-01", "2025-07-02"]);
    }

    #[test]
    fn empty_input_expands_to_empty_list() {
        assert!(expand_spec("").unwrap().is_empty());
        assert!(expand_spec(" , \n ,").unwrap().is_empty());
    }

    #[test]
    fn keeps_duplicates_from_spec_text() {
        let dates = expand_spec("2025-07-01, 2025-07-01").unwrap();
        assert_eq!(texts(&dates), ["2025-07-01", "2025-07-01"]);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = expand_spec("2025-07-04~2025-07-01").unwrap_err();
        match err {
            DittoError::InvalidDateFormat { token, reason } => {
                assert_eq!(token, "2025-07-04~2025-07-01");
                assert!(reason.contains("after"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_token_rejects_entire_spec() {
        let err = expand_spec("2025-07-01, 2025-7-1, 2025-07-03").unwrap_err();
        assert!(matches!(err, DittoError::InvalidDateFormat { .. }));
    }

    #[test]
    fn bad_range_endpoint_is_rejected() {
        for bad in [
            "2025-07-01~",
            "~2025-07-01",
            "2025-07-01~eternity",
            "2025-7-1~2025-07-03",
        ] {
            assert!(expand_spec(bad).is_err(), "{bad} should not expand");
        }
    }

    #[test]
    fn work_list_dedups_single_adds_only() {
        let mut list = WorkList::new();
        assert!(list.add(WorkDate::parse("2025-07-01").unwrap()));
        assert!(!list.add(WorkDate::parse("2025-07-01").unwrap()));
        assert_eq!(list.len(), 1);

        // Specification text goes in as expanded, even when it repeats a
        // listed date.
        let added = list.extend_spec("2025-07-01~2025-07-02").unwrap();
        assert_eq!(added, 2);
        assert_eq!(
            texts(list.dates()),
            ["2025-07-01", "2025-07-01", "2025-07-02"]
        );
    }

    #[test]
    fn work_list_error_leaves_list_untouched() {
        let mut list = WorkList::new();
        list.add(WorkDate::parse("2025-07-01").unwrap());
        assert!(list.extend_spec("2025-07-02, nope").is_err());
        assert_eq!(texts(list.dates()), ["2025-07-01"]);
    }
}
