//! Attribute values stored in feature rows

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric reading of the value.
    ///
    /// Strings are parsed; anything that does not parse, NaN, booleans and
    /// nulls give `None` and are treated as missing by numeric aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if !f.is_nan() => Some(*f),
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Wrap an aggregated number; NaN becomes null
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Float(value)
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_parsing() {
        assert_eq!(AttributeValue::from("  3.5 ").as_f64(), Some(3.5));
        assert_eq!(AttributeValue::from("n/a").as_f64(), None);
        assert_eq!(AttributeValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(AttributeValue::Float(f64::NAN).as_f64(), None);
        assert_eq!(AttributeValue::Bool(true).as_f64(), None);
        assert_eq!(AttributeValue::Null.as_f64(), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(AttributeValue::from(Some(2_i64)), AttributeValue::Int(2));
        assert_eq!(AttributeValue::from(None::<i64>), AttributeValue::Null);
        assert_eq!(AttributeValue::from(u64::MAX), AttributeValue::Float(u64::MAX as f64));
        assert_eq!(AttributeValue::from_f64(f64::NAN), AttributeValue::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(AttributeValue::from("a").to_string(), "a");
        assert_eq!(AttributeValue::Int(7).to_string(), "7");
        assert_eq!(AttributeValue::Null.to_string(), "");
    }
}
