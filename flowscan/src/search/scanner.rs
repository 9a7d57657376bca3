use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{trace, warn};

use super::matcher::RecordMatcher;
use super::parser::parse_line;
use crate::config::DecodeMode;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::record::Record;
use crate::results::FileResult;

const BUFFER_CAPACITY: usize = 65536;
const LINE_CAPACITY: usize = 512;

/// Decodes one raw line without ever failing on bad UTF-8
pub fn decode_line(bytes: &[u8], mode: DecodeMode) -> Cow<'_, str> {
    match mode {
        DecodeMode::Lossy => String::from_utf8_lossy(bytes),
        DecodeMode::Ignore => match std::str::from_utf8(bytes) {
            Ok(valid) => Cow::Borrowed(valid),
            Err(_) => Cow::Owned(strip_invalid_utf8(bytes)),
        },
    }
}

fn strip_invalid_utf8(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    // Truncated sequence at the end of the line
                    None => return out,
                }
            }
        }
    }
}

/// Splits a chunk read up to `\n` into logical lines. `\n`, `\r\n` and a
/// lone `\r` all end a line.
pub fn logical_lines<'a>(chunk: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let body = chunk.strip_suffix(b"\n").unwrap_or(chunk);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    body.split(|&b| b == b'\r')
}

/// Base name used to tag records from `path`
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Streams one file through the parser and matcher
#[derive(Debug, Clone)]
pub struct FileScanner {
    matcher: RecordMatcher,
    max_results: Option<usize>,
    decode_mode: DecodeMode,
    metrics: ScanMetrics,
}

impl FileScanner {
    /// Creates a scanner with no per-file cap and default decoding
    pub fn new(matcher: RecordMatcher) -> Self {
        Self {
            matcher,
            max_results: None,
            decode_mode: DecodeMode::default(),
            metrics: ScanMetrics::new(),
        }
    }

    /// Stop a file after this many matches; `None` or `Some(0)` means no cap
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results.filter(|&n| n > 0);
        self
    }

    pub fn with_decode_mode(mut self, decode_mode: DecodeMode) -> Self {
        self.decode_mode = decode_mode;
        self
    }

    pub fn with_metrics(mut self, metrics: ScanMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Gets the metrics this scanner reports into
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn matcher(&self) -> &RecordMatcher {
        &self.matcher
    }

    /// Scans a file, keeping whatever matched before any I/O failure.
    pub fn scan(&self, path: &Path) -> FileResult {
        trace!("Scanning file: {}", path.display());
        self.metrics.record_file_scanned();

        let mut records = Vec::new();
        let error = match self.try_scan(path, &mut records) {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    "Scan of {} stopped after {} matches: {}",
                    path.display(),
                    records.len(),
                    e
                );
                self.metrics.record_file_failed();
                Some(e.to_string())
            }
        };

        FileResult {
            path: path.to_path_buf(),
            records,
            error,
        }
    }

    fn try_scan(&self, path: &Path, records: &mut Vec<Record>) -> ScanResult<()> {
        let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        let name = source_name(path);

        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut buf = Vec::with_capacity(LINE_CAPACITY);

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            self.metrics.record_bytes(read as u64);

            for raw in logical_lines(&buf) {
                self.metrics.record_line();

                let line = decode_line(raw, self.decode_mode);
                let parsed = parse_line(&line);
                self.metrics.record_parse(&parsed);

                let Some(record) = parsed.into_record() else {
                    continue;
                };
                if !self.matcher.matches(&record) {
                    continue;
                }

                records.push(record.with_source_file(name.as_str()));
                self.metrics.record_match();

                if self.cap_reached(records.len()) {
                    trace!("Per-file cap reached in {}", path.display());
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn cap_reached(&self, found: usize) -> bool {
        self.max_results.is_some_and(|cap| found >= cap)
    }
}
