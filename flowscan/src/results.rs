use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::record::Record;

/// Most results a report will carry, matching the upload service's page size
pub const MAX_REPORTED_RESULTS: usize = 1000;

const MISSING: &str = "?";

/// Everything one scan task produced for a single file
#[derive(Debug, Clone, Default)]
pub struct FileResult {
    /// The path that was scanned
    pub path: PathBuf,
    /// Matching records, in file order, each tagged with the file's name
    pub records: Vec<Record>,
    /// Set when the scan stopped on an I/O error or the task panicked
    pub error: Option<String>,
}

impl FileResult {
    /// A task that produced nothing because it failed outright
    pub fn failed(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// The merged outcome of one search.
///
/// Records from different files appear in no particular order; records from
/// the same file keep their file order. Use [`SearchOutput::sorted`] before
/// comparing two outputs.
#[derive(Debug, Clone, Default)]
pub struct SearchOutput {
    /// All matching records
    pub records: Vec<Record>,
    /// Files handed to a scan task
    pub files_scanned: usize,
    /// Files that produced at least one record
    pub files_with_matches: usize,
    /// Files whose scan stopped on an error or whose task panicked
    pub files_failed: usize,
    /// Wall time for enumeration, dispatch and collection
    pub elapsed: Duration,
}

impl SearchOutput {
    /// Creates a new empty output
    pub fn new() -> Self {
        Default::default()
    }

    /// Folds one file's result into the output
    pub fn add_file_result(&mut self, file_result: FileResult) {
        self.files_scanned += 1;
        if file_result.is_failed() {
            self.files_failed += 1;
        }
        if !file_result.records.is_empty() {
            self.files_with_matches += 1;
        }
        self.records.extend(file_result.records);
    }

    pub fn total_matches(&self) -> usize {
        self.records.len()
    }

    /// Elapsed time in seconds, rounded to four decimal places
    pub fn elapsed_seconds(&self) -> f64 {
        (self.elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
    }

    /// Records ordered by source file, then by field contents
    pub fn sorted(&self) -> Vec<Record> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| {
            a.source_file()
                .cmp(&b.source_file())
                .then_with(|| a.fields().cmp(b.fields()))
        });
        records
    }

    /// Projects up to `limit` records into display summaries
    pub fn summaries(&self, limit: usize) -> Vec<RecordSummary> {
        self.records
            .iter()
            .take(limit)
            .map(RecordSummary::from_record)
            .collect()
    }

    /// Builds the serializable report for up to `limit` records
    pub fn report(&self, limit: usize) -> SearchReport {
        let results = self.summaries(limit);
        SearchReport {
            count: results.len(),
            total_matches: self.total_matches(),
            elapsed_seconds: self.elapsed_seconds(),
            files_scanned: self.files_scanned,
            files_failed: self.files_failed,
            results,
        }
    }
}

/// Compact, human-readable view of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub summary: String,
    pub file: String,
    pub event: Record,
}

impl RecordSummary {
    pub fn from_record(record: &Record) -> Self {
        let field = |key: &str| record.get(key).unwrap_or(MISSING);
        Self {
            summary: format!(
                "{} → {} | Action: {} | Log Status: {}",
                field("srcaddr"),
                field("dstaddr"),
                field("action"),
                field("log-status")
            ),
            file: record.source_file().unwrap_or("unknown").to_string(),
            event: record.clone(),
        }
    }
}

/// Response body for a search
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Number of entries in `results`
    pub count: usize,
    /// Matches found before truncation
    pub total_matches: usize,
    pub elapsed_seconds: f64,
    pub files_scanned: usize,
    pub files_failed: usize,
    pub results: Vec<RecordSummary>,
}
