use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::{EtlError, EtlResult};

/// A property value as written to the store.
///
/// `Null` removes the property when set on an existing node or edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Null,
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            PropertyValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

pub type Properties = BTreeMap<&'static str, PropertyValue>;

/// Type a raw CSV cell is coerced to before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    /// Unparseable values become null
    Integer,
    /// Unparseable values raise `InvalidAmount`
    Decimal,
}

impl ValueType {
    pub fn coerce(&self, raw: &str, column: &str, position: u64) -> EtlResult<PropertyValue> {
        if raw.is_empty() {
            return Ok(PropertyValue::Null);
        }

        match self {
            ValueType::Text => Ok(PropertyValue::Text(raw.to_string())),
            ValueType::Integer => Ok(parse_identifier(raw)
                .map(PropertyValue::Integer)
                .unwrap_or(PropertyValue::Null)),
            ValueType::Decimal => Decimal::from_str(raw.trim())
                .map(PropertyValue::Decimal)
                .map_err(|_| EtlError::InvalidAmount {
                    column: column.to_string(),
                    position,
                    value: raw.to_string(),
                }),
        }
    }
}

/// Parse an integer identifier, tolerating surrounding whitespace.
pub fn parse_identifier(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// One node to merge: its identifier plus the attributes to overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: i64,
    pub properties: Properties,
}

/// One edge to merge between two identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub from: i64,
    pub to: i64,
    pub properties: Properties,
}
