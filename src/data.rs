//! Record and value types shared across the crate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw attribute value as observed in the input dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric attribute value.
    Number(f64),
    /// Categorical attribute value (a taxonomy leaf token).
    Category(String),
}

impl Value {
    /// Numeric payload, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Category(_) => None,
        }
    }

    /// Categorical payload, if this is a category token.
    pub fn as_category(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Category(v) => Some(v),
        }
    }

    /// Human-readable kind name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "numeric",
            Value::Category(_) => "categorical",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Category(v) => f.write_str(v),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Category(v.to_string())
    }
}

/// A single labeled input record.
///
/// Records are owned by the caller; the engine only ever sees `&[Record]`
/// and moves row *indices* between partition leaves, never the records
/// themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Attribute name to raw value.
    pub values: BTreeMap<String, Value>,
    /// Designated class label.
    pub label: String,
}

impl Record {
    /// Build a record from `(attribute, value)` pairs and a class label.
    pub fn new<I, K, V>(values: I, label: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            label: label.into(),
        }
    }

    /// Raw value of one attribute, if present.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }
}

/// A generalized region an attribute value maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeneralValue {
    /// A taxonomy node name covering one or more leaf categories.
    Category(String),
    /// A half-open numeric interval `[lo, hi)`.
    Interval(f64, f64),
}

impl fmt::Display for GeneralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralValue::Category(name) => f.write_str(name),
            GeneralValue::Interval(lo, hi) => write!(f, "[{},{})", lo, hi),
        }
    }
}
