//! Pluggable document parsers.
//!
//! A [`Parser`] turns a raw byte stream into a normalized [`Bag`]. The
//! normalization rules (lower-cased keys, stringified non-string keys,
//! whole-number floats collapsed to integers) are applied by the `Value`
//! conversions, so every parser returns bags that compare consistently no
//! matter the input format.

use proteus_bag::{Bag, Value};

use crate::error::{ConfigError, ConfigResult};

/// A format-specific document parser.
///
/// File, directory, and REST sources are parameterized over this so the
/// format a source reads is a configuration choice, not a code change.
pub trait Parser: Send + Sync {
    /// Short format name, used as a resource id and in diagnostics.
    fn format(&self) -> &'static str;

    /// Parse a full document into a normalized bag.
    ///
    /// The top level of the document must be a mapping (an empty document is
    /// treated as an empty bag).
    fn parse(&self, bytes: &[u8]) -> ConfigResult<Bag>;
}

/// Parser for JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn format(&self) -> &'static str {
        "json"
    }

    fn parse(&self, bytes: &[u8]) -> ConfigResult<Bag> {
        let raw: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::parse("json", e.to_string()))?;
        into_bag(Value::from_json(raw), "json")
    }
}

/// Parser for YAML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl Parser for YamlParser {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn parse(&self, bytes: &[u8]) -> ConfigResult<Bag> {
        let raw: serde_yaml::Value =
            serde_yaml::from_slice(bytes).map_err(|e| ConfigError::parse("yaml", e.to_string()))?;
        into_bag(Value::from_yaml(raw), "yaml")
    }
}

fn into_bag(value: Value, format: &'static str) -> ConfigResult<Bag> {
    match value {
        Value::Mapping(bag) => Ok(bag),
        Value::Null => Ok(Bag::new()),
        other => Err(ConfigError::parse(
            format,
            format!("expected a top-level mapping, got {}", other.kind()),
        )),
    }
}
