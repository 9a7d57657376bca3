//! The scan pipeline, leaf first:
//!
//! - [`parser`] turns one raw line into a [`Record`](crate::record::Record),
//!   trying a JSON object first and pipe-delimited columns second.
//! - [`matcher`] decides whether a record satisfies exact field criteria and
//!   a time-window overlap test.
//! - [`scanner`] streams one file through the parser and matcher, tags each
//!   match with the file's name, and never fails the whole file.
//! - [`engine`] lists every file under a directory and fans the scanners out
//!   over a bounded rayon pool.
//!
//! ```rust,ignore
//! let query = SearchQuery::from_json(r#"{"criteria":{"action":"REJECT"}}"#)?;
//! let output = search(Path::new("uploads"), &query);
//! for summary in output.summaries(MAX_REPORTED_RESULTS) {
//!     println!("{}  ({})", summary.summary, summary.file);
//! }
//! ```
pub mod engine;
pub mod matcher;
pub mod parser;
pub mod scanner;

pub use engine::{collect_files, search, search_with};
pub use matcher::{matches, RecordMatcher, TimeWindow};
pub use parser::{parse, parse_line, ParsedLine};
pub use scanner::FileScanner;
