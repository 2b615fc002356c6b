use super::identifier::Identifier;
use serde::{Deserialize, Serialize};

/// Static type of a script value.
///
/// Every built-in kind occupies a fixed number of stack slots; a struct type
/// is only a name here and is sized through the struct registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Float,
    String,
    /// Engine object handle.
    Object,
    /// Three contiguous floats.
    Vector,
    Void,
    Event,
    Talent,
    Location,
    Effect,
    /// Deferred command passed to an engine routine. Occupies no slots.
    Action,
    /// User-defined struct, compared by name.
    Struct(Identifier),
}

impl DataType {
    /// Slot size of a built-in kind, `None` for structs.
    pub fn builtin_size(&self) -> Option<i32> {
        match self {
            DataType::Void | DataType::Action => Some(0),
            DataType::Vector => Some(3),
            DataType::Struct(_) => None,
            _ => Some(1),
        }
    }

    /// Whether a variable, member or script parameter can hold this type.
    pub fn is_storable(&self) -> bool {
        !matches!(self, DataType::Void | DataType::Action)
    }

    pub fn struct_name(&self) -> Option<&Identifier> {
        match self {
            DataType::Struct(name) => Some(name),
            _ => None,
        }
    }

    /// Keyword used for this type in script source.
    pub fn script_name(&self) -> &str {
        match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Object => "object",
            DataType::Vector => "vector",
            DataType::Void => "void",
            DataType::Event => "event",
            DataType::Talent => "talent",
            DataType::Location => "location",
            DataType::Effect => "effect",
            DataType::Action => "action",
            DataType::Struct(name) => name.label(),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Struct(name) => write!(f, "struct {}", name),
            other => f.write_str(other.script_name()),
        }
    }
}
