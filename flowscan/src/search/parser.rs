use serde_json::Value;

use crate::record::{column_name, Record};

/// Minimum number of non-empty columns for a delimited line to count as a record
pub const MIN_DELIMITED_COLUMNS: usize = 6;

/// Outcome of parsing one raw line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// The line was a JSON object
    Structured(Record),
    /// The line was pipe-delimited and mapped onto the default schema
    Delimited(Record),
    /// Blank, too few columns, or nothing usable
    NoRecord,
}

impl ParsedLine {
    pub fn into_record(self) -> Option<Record> {
        match self {
            ParsedLine::Structured(record) | ParsedLine::Delimited(record) => Some(record),
            ParsedLine::NoRecord => None,
        }
    }
}

/// Parses a line into a record, if it holds one
pub fn parse(line: &str) -> Option<Record> {
    parse_line(line).into_record()
}

/// Parses a line, JSON object first and pipe-delimited columns second.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() {
        return ParsedLine::NoRecord;
    }

    if line.starts_with('{') && line.ends_with('}') {
        if let Some(parsed) = parse_structured(line) {
            return parsed;
        }
    }

    parse_delimited(line)
}

/// `None` means "not a JSON object", and the caller falls back to columns
fn parse_structured(line: &str) -> Option<ParsedLine> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => {
            if map.is_empty() {
                return Some(ParsedLine::NoRecord);
            }
            let record: Record = map
                .into_iter()
                .map(|(key, value)| (key, value_to_string(value)))
                .collect();
            Some(ParsedLine::Structured(record))
        }
        _ => None,
    }
}

fn parse_delimited(line: &str) -> ParsedLine {
    let tokens: Vec<&str> = line.trim_matches('|').split('|').map(str::trim).collect();

    let non_empty = tokens.iter().filter(|t| !t.is_empty()).count();
    if non_empty < MIN_DELIMITED_COLUMNS {
        return ParsedLine::NoRecord;
    }

    // Empty columns keep their position but get no field
    let record: Record = tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| !token.is_empty())
        .map(|(idx, token)| (column_name(idx), *token))
        .collect();

    if record.is_empty() {
        ParsedLine::NoRecord
    } else {
        ParsedLine::Delimited(record)
    }
}

/// Strings are taken verbatim; any other JSON value becomes its compact text.
///
/// JSON spelling is kept on purpose (`true`, `null`, not `True`, `None`), so
/// criteria compare against what the log line actually contains.
pub fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
