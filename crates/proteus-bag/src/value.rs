//! Dynamic configuration values.
//!
//! [`Value`] is the tagged variant type stored inside a [`Bag`]. Matching on
//! the stored kind is exhaustive, so callers never need runtime type
//! assertions to find out what a path holds.

use std::time::Duration;

use crate::Bag;

/// A dynamically typed configuration value.
///
/// Every value parsed from a source or written through the API is one of
/// these variants. Scalars are owned; sequences and mappings own their
/// children, so [`Clone`] is always a deep copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number with a fractional part.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered sequence of values.
    Sequence(Vec<Value>),
    /// A nested bag.
    Mapping(Bag),
}

impl Value {
    /// Short name of the stored kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    /// Check whether the value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean payload, if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if this is a [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float payload, if this is a [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string payload, if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The sequence payload, if this is a [`Value::Sequence`].
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// The nested bag, if this is a [`Value::Mapping`].
    pub fn as_mapping(&self) -> Option<&Bag> {
        match self {
            Self::Mapping(bag) => Some(bag),
            _ => None,
        }
    }

    /// Interpret the value as a duration.
    ///
    /// The variant set has no duration kind; durations are represented as a
    /// non-negative integer count of milliseconds. Any other kind yields
    /// `None`.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Int(ms) if *ms >= 0 => Some(Duration::from_millis(*ms as u64)),
            _ => None,
        }
    }

    /// Parse a scalar from its string form, normalizing as source parsers do.
    ///
    /// Environment-style sources only ever see strings; this maps them onto
    /// the same variants JSON and YAML parsing produce so observer cache
    /// comparisons behave identically across formats.
    ///
    /// # Example
    ///
    /// ```
    /// use proteus_bag::Value;
    ///
    /// assert_eq!(Value::parse_scalar("8080"), Value::Int(8080));
    /// assert_eq!(Value::parse_scalar("true"), Value::Bool(true));
    /// assert_eq!(Value::parse_scalar("1.0"), Value::Int(1));
    /// assert_eq!(Value::parse_scalar("local"), Value::String("local".to_string()));
    /// ```
    pub fn parse_scalar(raw: &str) -> Self {
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return normalize_float(f);
        }
        Self::String(raw.to_string())
    }

    /// Convert a JSON document into a normalized value.
    ///
    /// Normalization happens here, once, at parse time: mapping keys are
    /// lower-cased recursively and floats with no fractional part collapse
    /// to integers.
    pub fn from_json(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    normalize_float(f)
                } else {
                    Self::Null
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => {
                let mut bag = Bag::new();
                for (key, value) in entries {
                    bag.insert(key.to_lowercase(), Self::from_json(value));
                }
                Self::Mapping(bag)
            }
        }
    }

    /// Convert a YAML document into a normalized value.
    ///
    /// Same normalization as [`Value::from_json`]; additionally, mappings
    /// keyed by non-string scalars get stringified keys so every mapping in
    /// a bag is string-keyed.
    pub fn from_yaml(raw: serde_yaml::Value) -> Self {
        match raw {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    normalize_float(f)
                } else {
                    Self::Null
                }
            }
            serde_yaml::Value::String(s) => Self::String(s),
            serde_yaml::Value::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Self::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(entries) => {
                let mut bag = Bag::new();
                for (key, value) in entries {
                    if let Some(key) = yaml_key_to_string(&key) {
                        bag.insert(key, Self::from_yaml(value));
                    }
                }
                Self::Mapping(bag)
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Convert the value into a JSON document.
    ///
    /// Used to drive structural decoding ([`Bag::populate`]) through serde.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Mapping(bag) => {
                let mut map = serde_json::Map::new();
                for key in bag.entries() {
                    if let Some(value) = bag.get(&key) {
                        map.insert(key, value.to_json());
                    }
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

/// Collapse a float with no fractional part to an integer.
fn normalize_float(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&f) {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

/// Stringify a YAML mapping key, lower-casing string keys.
///
/// Keys that are themselves collections are dropped; a bag mapping must be
/// string-keyed.
fn yaml_key_to_string(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.to_lowercase()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }
}

impl From<Bag> for Value {
    fn from(bag: Bag) -> Self {
        Self::Mapping(bag)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Self::Int(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}
