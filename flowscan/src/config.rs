use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{ScanError, ScanResult};
use crate::results::MAX_REPORTED_RESULTS;
use crate::search::matcher::{RecordMatcher, TimeWindow};
use crate::search::parser::value_to_string;

const DEFAULT_WORKERS: usize = 8;

/// How bytes that are not valid UTF-8 are handled while reading a line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Drop invalid byte sequences
    #[default]
    Ignore,
    /// Replace invalid byte sequences with U+FFFD
    Lossy,
}

impl FromStr for DecodeMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(DecodeMode::Ignore),
            "lossy" => Ok(DecodeMode::Lossy),
            other => Err(ScanError::config_error(format!(
                "unknown encoding mode '{}' (expected ignore|lossy)",
                other
            ))),
        }
    }
}

/// A search request: field criteria, an optional time window, and the
/// knobs for the worker pool.
///
/// Deserializes from the JSON body the upload service accepts:
/// ```json
/// {
///   "criteria": {"dstaddr": "10.0.0.2", "dstport": 443},
///   "starttime": 1000,
///   "endtime": "2000",
///   "workers": 4,
///   "max_results_per_file": 100
/// }
/// ```
/// Criteria values that are not strings are compared by their JSON text, and
/// the time bounds accept integers or integer strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Exact-match field constraints; all must hold
    #[serde(default, deserialize_with = "deserialize_criteria")]
    pub criteria: BTreeMap<String, String>,

    /// Inclusive lower bound on a record's end time
    #[serde(default, deserialize_with = "deserialize_epoch")]
    pub starttime: Option<i64>,

    /// Inclusive upper bound on a record's start time
    #[serde(default, deserialize_with = "deserialize_epoch")]
    pub endtime: Option<i64>,

    /// Width of the scan worker pool
    #[serde(default = "default_workers")]
    pub workers: NonZeroUsize,

    /// Stop scanning a file after this many matches (0 or absent: no cap)
    #[serde(default)]
    pub max_results_per_file: Option<usize>,
}

fn default_workers() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_WORKERS).unwrap_or(NonZeroUsize::MIN)
}

fn deserialize_criteria<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value_to_string(value)))
        .collect())
}

fn deserialize_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("starttime/endtime must be integers")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom("starttime/endtime must be integers")),
        Some(_) => Err(D::Error::custom("starttime/endtime must be integers")),
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            criteria: BTreeMap::new(),
            starttime: None,
            endtime: None,
            workers: default_workers(),
            max_results_per_file: None,
        }
    }
}

impl SearchQuery {
    /// Parses a JSON request body
    pub fn from_json(body: &str) -> ScanResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(body).map_err(|e| ScanError::invalid_query(e.to_string()))
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.starttime, self.endtime)
    }

    /// Builds the predicate this query describes
    pub fn matcher(&self) -> RecordMatcher {
        RecordMatcher::new(self.criteria.clone(), self.window())
    }
}

/// Splits a `field=value` criterion
pub fn parse_criterion(raw: &str) -> ScanResult<(String, String)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| ScanError::invalid_query(format!("expected field=value, got '{}'", raw)))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(ScanError::invalid_query(format!(
            "missing field name in '{}'",
            raw
        )));
    }
    Ok((field.to_string(), value.trim().to_string()))
}

/// Layered configuration for a search run.
///
/// Loaded from, in increasing precedence:
/// 1. Global `$CONFIG_DIR/flowscan/config.yaml`
/// 2. Local `.flowscan.yaml` in the current directory
/// 3. A file given with `--config`
///
/// ```yaml
/// root_path: "/var/lib/flowscan/uploads"
/// decode_mode: ignore
/// max_reported: 1000
/// log_level: info
/// query:
///   criteria:
///     action: REJECT
///   starttime: 1600000000
///   workers: 8
///   max_results_per_file: 500
/// ```
///
/// Command-line values win over file values, see [`ScanConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory holding the uploaded files
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    #[serde(default)]
    pub query: SearchQuery,

    #[serde(default)]
    pub decode_mode: DecodeMode,

    /// Most records a report carries
    #[serde(default = "default_max_reported")]
    pub max_reported: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_reported() -> usize {
    MAX_REPORTED_RESULTS
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            query: SearchQuery::default(),
            decode_mode: DecodeMode::default(),
            max_reported: default_max_reported(),
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Loads configuration from the default locations
    pub fn load() -> ScanResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("flowscan/config.yaml")),
            Some(PathBuf::from(".flowscan.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values. Anything given on
    /// the command line wins, even when it equals the built-in default.
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(root_path) = cli.root_path {
            self.root_path = root_path;
        }
        // A request body is a complete query
        if let Some(query) = cli.query {
            self.query = query;
        }
        // CLI criteria add to, and override, earlier criteria
        self.query.criteria.extend(cli.criteria);
        if cli.starttime.is_some() {
            self.query.starttime = cli.starttime;
        }
        if cli.endtime.is_some() {
            self.query.endtime = cli.endtime;
        }
        if let Some(workers) = cli.workers {
            self.query.workers = workers;
        }
        if cli.max_results_per_file.is_some() {
            self.query.max_results_per_file = cli.max_results_per_file;
        }
        if let Some(decode_mode) = cli.decode_mode {
            self.decode_mode = decode_mode;
        }
        if let Some(max_reported) = cli.max_reported {
            self.max_reported = max_reported;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        self
    }
}

/// Values given on the command line; `None` leaves the configured value alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub root_path: Option<PathBuf>,
    /// Request body read with `--query`
    pub query: Option<SearchQuery>,
    pub criteria: BTreeMap<String, String>,
    pub starttime: Option<i64>,
    pub endtime: Option<i64>,
    pub workers: Option<NonZeroUsize>,
    pub max_results_per_file: Option<usize>,
    pub decode_mode: Option<DecodeMode>,
    pub max_reported: Option<usize>,
    pub log_level: Option<String>,
}
