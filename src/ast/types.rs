use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type attached to every expression by the type checker.
/// Class types compare by name, everything else structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "tag")]
pub enum Type {
    Number,
    Bool,
    String,
    None,
    Class { name: String },
    List { elem: Box<Type> },
    Tuple { elems: Vec<Type> },
    Dict { key: Box<Type>, value: Box<Type> },
}

impl Type {
    pub fn class(name: impl Into<String>) -> Self {
        Type::Class { name: name.into() }
    }

    pub fn list(elem: Type) -> Self {
        Type::List {
            elem: Box::new(elem),
        }
    }

    pub fn tuple(elems: Vec<Type>) -> Self {
        Type::Tuple { elems }
    }

    pub fn dict(key: Type, value: Type) -> Self {
        Type::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Type::List { .. })
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    /// Whether values of this type are addresses into the heap
    pub fn is_heap_allocated(&self) -> bool {
        match self {
            Type::String
            | Type::Class { .. }
            | Type::List { .. }
            | Type::Tuple { .. }
            | Type::Dict { .. } => true,
            Type::Number | Type::Bool | Type::None => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "str"),
            Type::None => write!(f, "None"),
            Type::Class { name } => write!(f, "{}", name),
            Type::List { elem } => write!(f, "[{}]", elem),
            Type::Tuple { elems } => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            Type::Dict { key, value } => write!(f, "{{{}: {}}}", key, value),
        }
    }
}
