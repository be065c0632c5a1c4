//! Runtime values shared by local variables, operand stacks and native
//! calls.
use std::fmt;
use std::sync::Arc;

use crate::program::{BaseTypeKind, Object};

/// Reference to a heap object. The heap itself is owned elsewhere.
pub type ObjectRef = Arc<Object>;

/// JVM value types.
#[derive(Clone, Default)]
pub enum Value {
    /// Local slot that has not been written yet.
    #[default]
    Uninitialized,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Reference(ObjectRef),
    Null,
}

impl Value {
    /// Returns the type of the value, `None` for an uninitialized slot.
    pub fn t(&self) -> Option<BaseTypeKind> {
        match self {
            Self::Uninitialized => None,
            Self::Boolean(_) => Some(BaseTypeKind::Boolean),
            Self::Byte(_) => Some(BaseTypeKind::Byte),
            Self::Char(_) => Some(BaseTypeKind::Char),
            Self::Short(_) => Some(BaseTypeKind::Short),
            Self::Int(_) => Some(BaseTypeKind::Int),
            Self::Long(_) => Some(BaseTypeKind::Long),
            Self::Float(_) => Some(BaseTypeKind::Float),
            Self::Double(_) => Some(BaseTypeKind::Double),
            Self::Reference(_) | Self::Null => Some(BaseTypeKind::Reference),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the object behind a non-null reference.
    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Self::Reference(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the value as a JVM computational int. Sub-int kinds widen.
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Short(v) => Some(v as i32),
            Self::Byte(v) => Some(v as i32),
            Self::Char(v) => Some(v as i32),
            Self::Boolean(v) => Some(v as i32),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uninitialized, Self::Uninitialized) | (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            // references compare by identity
            (Self::Reference(a), Self::Reference(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Boolean(v) => write!(f, "Boolean({v})"),
            Self::Byte(v) => write!(f, "Byte({v})"),
            Self::Char(v) => write!(f, "Char({v})"),
            Self::Short(v) => write!(f, "Short({v})"),
            Self::Int(v) => write!(f, "Int({v})"),
            Self::Long(v) => write!(f, "Long({v})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Double(v) => write!(f, "Double({v})"),
            Self::Reference(object) => {
                write!(f, "Reference({}@{:p})", object.class().name(), Arc::as_ptr(object))
            }
            Self::Null => write!(f, "Null"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Reference(object)
    }
}

impl From<Option<ObjectRef>> for Value {
    fn from(object: Option<ObjectRef>) -> Self {
        object.map_or(Self::Null, Self::Reference)
    }
}
