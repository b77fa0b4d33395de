//! Parser and writer for the `.properties`-style `key=value` file format
//! used to persist typed configs.
//!
//! Lines are `key=value` pairs. Leading/trailing whitespace around both
//! key and value is trimmed. Lines that are blank, or whose first
//! non-whitespace character is `#`, are comments and are ignored on
//! read. Keys are unique; a later line wins over an earlier duplicate.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::ConfigError;

/// Parsed contents of a `.properties` file, keyed by property name.
///
/// `BTreeMap` keeps keys in sorted order so [`write`] produces a
/// deterministic, diff-friendly byte stream.
pub type PropertiesMap = BTreeMap<String, String>;

/// Parses `.properties`-format text into a [`PropertiesMap`].
///
/// `id` is only used to label a [`ConfigError::Parse`] if a non-comment
/// line has no `=` separator.
pub fn parse(id: &str, text: &str) -> Result<PropertiesMap, ConfigError> {
    let mut map = PropertiesMap::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Parse {
                id: id.to_string(),
                message: format!("line {}: missing '=' separator: {raw_line:?}", lineno + 1),
            });
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

/// Serializes a [`PropertiesMap`] back to `.properties` text, one
/// `key=value` line per entry in key order.
pub fn write(map: &PropertiesMap) -> String {
    let mut out = String::new();
    for (key, value) in map {
        let _ = writeln!(out, "{key}={value}");
    }
    out
}
