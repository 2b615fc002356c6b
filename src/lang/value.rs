use super::data_type::DataType;
use serde::{Deserialize, Serialize};

/// Literal constant that can be pushed directly onto the VM stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// 32-bit signed integer.
    Int(i32),

    /// 32-bit float.
    Float(f32),

    /// String literal.
    String(String),

    /// Object handle literal (`OBJECT_SELF`, `OBJECT_INVALID`).
    Object(i32),

    /// Vector literal: `[x, y, z]`.
    Vector([f32; 3]),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Object(_) => DataType::Object,
            Value::Vector(_) => DataType::Vector,
        }
    }
}

impl std::fmt::Display for Value {
    /// Format a value using script surface syntax.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}f", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(n) => write!(f, "object({})", n),
            Value::Vector([x, y, z]) => write!(f, "[{:?}, {:?}, {:?}]", x, y, z),
        }
    }
}
