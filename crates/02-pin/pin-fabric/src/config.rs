//! Ordered key-value view over one comma-joined parameter group.

use log::{error, info};
use std::str::FromStr;

/// Parsed `key=value` list for one module or pin parameter group.
///
/// Entries keep their original order; duplicate keys are allowed and lookup
/// returns the first occurrence. Parsing never fails: malformed tokens are
/// logged and skipped, matching the module-level splitter's token rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KvConfig {
    entries: Vec<(String, String)>,
}

impl KvConfig {
    /// Parses a comma-separated `key=value` string.
    ///
    /// Empty tokens are skipped with an info log; tokens that do not split
    /// on `=` into exactly two parts are skipped with an error log.
    pub fn parse(raw: &str) -> Self {
        let mut entries = Vec::new();
        for token in raw.split(',') {
            if token.is_empty() {
                info!("skipping empty config token");
                continue;
            }
            let mut parts = token.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) if !key.is_empty() => {
                    entries.push((key.to_owned(), value.to_owned()));
                }
                _ => {
                    error!("malformed config token '{token}', expected key=value");
                }
            }
        }
        KvConfig { entries }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value stored under `key`, parsed into `T`.
    ///
    /// A present-but-unparseable value is logged and treated as absent.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                error!("config value '{value}' for key '{key}' failed to parse");
                None
            }
        }
    }

    /// All entries in original order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry survived parsing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
