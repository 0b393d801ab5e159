//! Typed option values.
//!
//! Module entries carry free-form options (a list of RGB triples, a sample
//! count, a VISA address, ...). Instead of passing raw YAML around, options are
//! converted once into [`OptionValue`], a closed set of shapes that registered
//! module classes can check against a declared [`ValueKind`].

use crate::error::{ConfigError, ConfigResult};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A single option value taken from a module entry.
///
/// Equality treats two NaN floats as equal, so a document holding `.nan`
/// compares equal to itself after a write and reload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Explicit `null` / `~`
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Whole number above `i64::MAX`
    Unsigned(u64),
    /// Floating point number
    Float(f64),
    /// String scalar
    String(String),
    /// Sequence of values
    List(Vec<OptionValue>),
    /// Nested mapping with string keys
    Map(BTreeMap<String, OptionValue>),
}

/// Shape of an [`OptionValue`], used by module descriptors to declare what
/// they expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Whole number
    Integer,
    /// Any number
    Float,
    /// Text
    String,
    /// Sequence
    List,
    /// Mapping
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "number",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Map => "mapping",
        };
        f.write_str(name)
    }
}

impl OptionValue {
    /// Converts a parsed YAML node into an option value.
    ///
    /// `path` is the dotted key path of the node and is only used for error
    /// reporting. Tagged nodes are unwrapped to their inner value.
    pub fn from_yaml(value: &Value, path: &str) -> ConfigResult<Self> {
        match value {
            Value::Null => Ok(OptionValue::Null),
            Value::Bool(b) => Ok(OptionValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(OptionValue::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(OptionValue::Unsigned(u))
                } else {
                    // Neither integer form fits, so the number is float-backed
                    Ok(OptionValue::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Ok(OptionValue::String(s.clone())),
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_yaml(item, &format!("{path}[{i}]")))
                .collect::<ConfigResult<Vec<_>>>()
                .map(OptionValue::List),
            Value::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, item) in mapping {
                    let key = scalar_key(key, path)?;
                    let item = Self::from_yaml(item, &join_path(path, &key))?;
                    insert_unique(&mut map, key, item, path)?;
                }
                Ok(OptionValue::Map(map))
            }
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value, path),
        }
    }

    /// Converts back into a YAML node for serialization.
    pub fn to_yaml(&self) -> Value {
        match self {
            OptionValue::Null => Value::Null,
            OptionValue::Bool(b) => Value::Bool(*b),
            OptionValue::Integer(i) => Value::Number((*i).into()),
            OptionValue::Unsigned(u) => Value::Number((*u).into()),
            OptionValue::Float(f) => Value::Number((*f).into()),
            OptionValue::String(s) => Value::String(s.clone()),
            OptionValue::List(items) => {
                Value::Sequence(items.iter().map(OptionValue::to_yaml).collect())
            }
            OptionValue::Map(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_yaml()))
                    .collect(),
            ),
        }
    }

    /// Returns the shape of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            OptionValue::Null => ValueKind::Null,
            OptionValue::Bool(_) => ValueKind::Bool,
            OptionValue::Integer(_) | OptionValue::Unsigned(_) => ValueKind::Integer,
            OptionValue::Float(_) => ValueKind::Float,
            OptionValue::String(_) => ValueKind::String,
            OptionValue::List(_) => ValueKind::List,
            OptionValue::Map(_) => ValueKind::Map,
        }
    }

    /// Whether this value satisfies an expected kind.
    ///
    /// Integers are accepted where a float is expected.
    pub fn satisfies(&self, expected: ValueKind) -> bool {
        self.kind() == expected
            || (expected == ValueKind::Float && self.kind() == ValueKind::Integer)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The integer, if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            OptionValue::Integer(i) => u64::try_from(*i).ok(),
            OptionValue::Unsigned(u) => Some(*u),
            _ => None,
        }
    }

    /// The numeric value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Integer(i) => Some(*i as f64),
            OptionValue::Unsigned(u) => Some(*u as f64),
            OptionValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The items, if this is a list.
    pub fn as_list(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The entries, if this is a mapping.
    pub fn as_map(&self) -> Option<&BTreeMap<String, OptionValue>> {
        match self {
            OptionValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for OptionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OptionValue::Null, OptionValue::Null) => true,
            (OptionValue::Bool(a), OptionValue::Bool(b)) => a == b,
            (OptionValue::Integer(a), OptionValue::Integer(b)) => a == b,
            (OptionValue::Unsigned(a), OptionValue::Unsigned(b)) => a == b,
            (OptionValue::Float(a), OptionValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (OptionValue::String(a), OptionValue::String(b)) => a == b,
            (OptionValue::List(a), OptionValue::List(b)) => a == b,
            (OptionValue::Map(a), OptionValue::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

/// Appends a key to a dotted path.
pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Interprets a mapping key as a string. Numbers and booleans are accepted
/// in their textual form.
pub(crate) fn scalar_key(key: &Value, parent: &str) -> ConfigResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::type_mismatch(
            if parent.is_empty() { "<root>" } else { parent },
            "scalar mapping key",
            describe(other),
        )),
    }
}

/// Inserts under a key produced by [`scalar_key`].
///
/// Keys such as `1` and `'1'` map to the same text; the second one is
/// rejected instead of replacing the first.
pub(crate) fn insert_unique<V>(
    map: &mut BTreeMap<String, V>,
    key: String,
    value: V,
    parent: &str,
) -> ConfigResult<()> {
    if map.contains_key(&key) {
        return Err(ConfigError::schema(
            join_path(parent, &key),
            format!("duplicate key '{key}' (keys are compared by their text)"),
        ));
    }
    map.insert(key, value);
    Ok(())
}

/// Short human description of a YAML node for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Sequence(_) => "list".to_string(),
        Value::Mapping(_) => "mapping".to_string(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}
