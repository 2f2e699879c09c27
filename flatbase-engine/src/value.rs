use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::catalog::ColumnType;
use crate::error::{EngineError, EngineResult};

/// A typed runtime value produced either by casting a row-file cell or by
/// evaluating a literal leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> EngineResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EngineError::data(format!(
                "expected boolean, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Int(v) => JsonValue::from(*v),
            Value::Float(v) => JsonValue::from(*v),
            Value::Str(v) => JsonValue::from(v.clone()),
            Value::Bool(v) => JsonValue::from(*v),
        }
    }

    /// Cast a textual row-file cell to its declared column type. Empty
    /// fields cast to the type's zero value rather than erroring, per the
    /// storage format's documented behaviour.
    pub fn cast(raw: &str, ty: ColumnType) -> EngineResult<Value> {
        let trimmed = raw.trim();
        match ty {
            ColumnType::Integer => {
                if trimmed.is_empty() {
                    Ok(Value::Int(0))
                } else {
                    trimmed
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| EngineError::data(format!("cannot cast '{trimmed}' to integer")))
                }
            }
            ColumnType::Float => {
                if trimmed.is_empty() {
                    Ok(Value::Float(0.0))
                } else {
                    trimmed
                        .parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| EngineError::data(format!("cannot cast '{trimmed}' to float")))
                }
            }
            ColumnType::String => Ok(Value::Str(trimmed.to_string())),
        }
    }
}
