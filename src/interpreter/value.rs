use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag constraining a parameter or return slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTag {
    /// Signed integer.
    Integer,
    /// UTF-8 string.
    String,
}

impl ValueTag {
    /// Parse a tag name as written in action signatures.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(ValueTag::Integer),
            "str" | "string" => Some(ValueTag::String),
            _ => None,
        }
    }

    /// Stand-in value used when a task is run without real arguments.
    pub fn placeholder(self) -> Value {
        match self {
            ValueTag::Integer => Value::Integer(0),
            ValueTag::String => Value::String(String::new()),
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTag::Integer => write!(f, "int"),
            ValueTag::String => write!(f, "str"),
        }
    }
}

/// Value passed between actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Absence of a value (actions without a return contract).
    #[default]
    None,
    /// Signed integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Tag of the value, `None` for [`Value::None`].
    pub fn tag(&self) -> Option<ValueTag> {
        match self {
            Value::None => None,
            Value::Integer(_) => Some(ValueTag::Integer),
            Value::String(_) => Some(ValueTag::String),
        }
    }

    /// Whether the value is [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(num) => Some(*num),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Integer(num) => write!(f, "{}", num),
            Value::String(text) => write!(f, "{}", text),
        }
    }
}
