use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::search::parser::ParsedLine;

/// Counters shared by every scan task of one search
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    files_scanned: Arc<AtomicU64>,
    files_failed: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    lines_read: Arc<AtomicU64>,
    structured_records: Arc<AtomicU64>,
    delimited_records: Arc<AtomicU64>,
    records_matched: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            files_scanned: Arc::new(AtomicU64::new(0)),
            files_failed: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            lines_read: Arc::new(AtomicU64::new(0)),
            structured_records: Arc::new(AtomicU64::new(0)),
            delimited_records: Arc::new(AtomicU64::new(0)),
            records_matched: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_file_scanned(&self) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records one logical line, whatever its terminator
    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Records which parser branch a line took
    pub fn record_parse(&self, parsed: &ParsedLine) {
        match parsed {
            ParsedLine::Structured(_) => {
                self.structured_records.fetch_add(1, Ordering::Relaxed);
            }
            ParsedLine::Delimited(_) => {
                self.delimited_records.fetch_add(1, Ordering::Relaxed);
            }
            ParsedLine::NoRecord => {}
        }
    }

    pub fn record_match(&self) {
        self.records_matched.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            structured_records: self.structured_records.load(Ordering::Relaxed),
            delimited_records: self.delimited_records.load(Ordering::Relaxed),
            records_matched: self.records_matched.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        debug!(
            "Scan stats: files={} failed={} lines={} bytes={} json={} delimited={} matched={}",
            stats.files_scanned,
            stats.files_failed,
            stats.lines_read,
            stats.bytes_read,
            stats.structured_records,
            stats.delimited_records,
            stats.records_matched
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_scanned: u64,
    pub files_failed: u64,
    pub bytes_read: u64,
    pub lines_read: u64,
    pub structured_records: u64,
    pub delimited_records: u64,
    pub records_matched: u64,
}

impl ScanStats {
    /// Lines that produced a record of either kind
    pub fn records_parsed(&self) -> u64 {
        self.structured_records + self.delimited_records
    }
}
