//! Check parameter mappings and the layered deep merge used to resolve them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which a positional value without transform is carried as a
/// full override of the resolved mapping.
pub const LEGACY_KEY: &str = "legacy";

/// A string-keyed parameter mapping handed to check functions.
///
/// # Examples
///
/// ```
/// use oxcheck_common::params::Parameters;
/// use serde_json::json;
///
/// let mut base = Parameters::from_value(json!({"levels": [80.0, 90.0], "opts": {"a": 1}})).unwrap();
/// let overlay = Parameters::from_value(json!({"opts": {"b": 2}})).unwrap();
/// base.merge(&overlay);
/// assert_eq!(base.get_levels("levels"), Some((80.0, 90.0)));
/// assert_eq!(base.get("opts"), Some(&json!({"a": 1, "b": 2})));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a JSON object; any other JSON value is rejected and handed back.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Reads a `[warn, crit]` pair.
    pub fn get_levels(&self, key: &str) -> Option<(f64, f64)> {
        match self.0.get(key)? {
            Value::Array(pair) if pair.len() == 2 => Some((pair[0].as_f64()?, pair[1].as_f64()?)),
            _ => None,
        }
    }

    /// The positional value carried as full override, if any.
    pub fn legacy(&self) -> Option<&Value> {
        self.0.get(LEGACY_KEY)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Deep-merges `overlay` on top of `self`: nested objects merge key by
    /// key, every other value replaces the existing one outright.
    pub fn merge(&mut self, overlay: &Parameters) {
        deep_merge(&mut self.0, &overlay.0);
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn deep_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => deep_merge(existing, nested),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Parameter value as found in rules and persisted autochecks.
///
/// Older plugins store positional tuples (JSON arrays or scalars) instead of
/// mappings; those must go through the ruleset's transform before they can
/// be merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyParameters {
    Structured(Parameters),
    Positional(Value),
}

impl LegacyParameters {
    /// `null`, an empty mapping, and an empty tuple carry no parameters.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(params) => params.is_empty(),
            Self::Positional(Value::Null) => true,
            Self::Positional(Value::Array(items)) => items.is_empty(),
            Self::Positional(_) => false,
        }
    }
}

impl Default for LegacyParameters {
    fn default() -> Self {
        Self::Structured(Parameters::new())
    }
}

impl From<Parameters> for LegacyParameters {
    fn from(params: Parameters) -> Self {
        Self::Structured(params)
    }
}

impl From<Value> for LegacyParameters {
    fn from(value: Value) -> Self {
        match Parameters::from_value(value) {
            Ok(params) => Self::Structured(params),
            Err(other) => Self::Positional(other),
        }
    }
}
