use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Column names assigned, in order, to the tokens of a pipe-delimited line.
/// Columns past the end of this list are named `col<N>`.
pub const DEFAULT_SCHEMA: [&str; 15] = [
    "serialno",
    "version",
    "account-id",
    "instance-id",
    "srcaddr",
    "dstaddr",
    "protocol",
    "packets",
    "bytes",
    "starttime",
    "endtime",
    "action",
    "log-status",
    "srcport",
    "dstport",
];

/// Key under which the source file tag is serialized
pub const SOURCE_FILE_KEY: &str = "__file__";

/// Returns the field name for the delimited column at `index`
pub fn column_name(index: usize) -> String {
    match DEFAULT_SCHEMA.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("col{}", index),
    }
}

/// One parsed log line: field name to string value, plus the name of the
/// file it came from once a scanner has claimed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
    source_file: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of domain fields; the source file tag is not counted
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    /// Returns the record tagged with the file it was read from
    pub fn with_source_file(mut self, name: impl Into<String>) -> Self {
        self.source_file = Some(name.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source_file: None,
        }
    }
}

/// Serializes as one flat object. The source file tag replaces any field
/// already named [`SOURCE_FILE_KEY`].
impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let tagged = self.source_file.is_some();
        let shadowed = tagged && self.fields.contains_key(SOURCE_FILE_KEY);
        let len = self.fields.len() + usize::from(tagged) - usize::from(shadowed);

        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.fields {
            if shadowed && key == SOURCE_FILE_KEY {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        if let Some(file) = &self.source_file {
            map.serialize_entry(SOURCE_FILE_KEY, file)?;
        }
        map.end()
    }
}
