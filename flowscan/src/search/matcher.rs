use std::collections::BTreeMap;

use crate::record::Record;

/// Optional inclusive bounds on a record's `[start, end]` interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeWindow {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Interval overlap test, not point containment
    pub fn overlaps(&self, record_start: i64, record_end: i64) -> bool {
        if matches!(self.end, Some(end) if record_start > end) {
            return false;
        }
        if matches!(self.start, Some(start) if record_end < start) {
            return false;
        }
        true
    }

    /// Checks a record's own time fields against the window.
    ///
    /// `starttime` falls back to `start`, `endtime` to `end`, and either
    /// defaults to `0` when absent. A value that is not an integer makes
    /// the record a non-match.
    pub fn admits(&self, record: &Record) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let bounds = record_time(record, "starttime", "start")
            .zip(record_time(record, "endtime", "end"));
        match bounds {
            Some((start, end)) => self.overlaps(start, end),
            None => false,
        }
    }
}

fn record_time(record: &Record, key: &str, fallback: &str) -> Option<i64> {
    let raw = record.get(key).or_else(|| record.get(fallback)).unwrap_or("0");
    raw.trim().parse().ok()
}

/// Compound predicate: exact field equality plus a time window
#[derive(Debug, Clone, Default)]
pub struct RecordMatcher {
    criteria: BTreeMap<String, String>,
    window: TimeWindow,
}

impl RecordMatcher {
    pub fn new(criteria: BTreeMap<String, String>, window: TimeWindow) -> Self {
        Self { criteria, window }
    }

    pub fn criteria(&self) -> &BTreeMap<String, String> {
        &self.criteria
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn matches(&self, record: &Record) -> bool {
        fields_match(record, &self.criteria) && self.window.admits(record)
    }
}

fn fields_match(record: &Record, criteria: &BTreeMap<String, String>) -> bool {
    criteria
        .iter()
        .all(|(key, expected)| record.get(key) == Some(expected.as_str()))
}

/// One-shot form of [`RecordMatcher::matches`]
pub fn matches(
    record: &Record,
    criteria: &BTreeMap<String, String>,
    start_time: Option<i64>,
    end_time: Option<i64>,
) -> bool {
    fields_match(record, criteria) && TimeWindow::new(start_time, end_time).admits(record)
}
