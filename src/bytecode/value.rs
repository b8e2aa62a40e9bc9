//! Runtime values.

use serde::{Deserialize, Serialize};

use super::{
    BOOLEAN_CLASS, CLASS_CLASS, Constant, INTEGER_CLASS, NumKind, OBJECT_CLASS, ReturnKind,
    STRING_CLASS, TypeDesc,
};

/// Heap object. Objects are immutable and compared by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    /// Boxed boolean.
    Boolean(bool),
    /// Boxed integer.
    Integer(i32),
    /// String.
    Str(String),
    /// Type literal.
    Class(TypeDesc),
}

impl Object {
    /// Internal name of the object's runtime class.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => BOOLEAN_CLASS,
            Self::Integer(_) => INTEGER_CLASS,
            Self::Str(_) => STRING_CLASS,
            Self::Class(_) => CLASS_CLASS,
        }
    }

    /// Whether this object may be viewed as `internal_name`.
    pub fn is_instance_of(&self, internal_name: &str) -> bool {
        internal_name == OBJECT_CLASS
            || internal_name == self.class_name()
            || (internal_name == "lang/Number" && matches!(self, Self::Integer(_)))
    }

    /// Approximate heap footprint in bytes.
    pub fn footprint(&self) -> u64 {
        match self {
            Self::Str(s) => 16 + s.len() as u64,
            _ => 16,
        }
    }
}

/// One operand-stack or local slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer family, including booleans as `0`/`1`.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Reference, `None` is null.
    Ref(Option<Object>),
}

impl Value {
    /// Null reference.
    pub fn null() -> Self {
        Self::Ref(None)
    }

    /// Boolean as integer-family value.
    pub fn boolean(b: bool) -> Self {
        Self::Int(i32::from(b))
    }

    /// Boxed integer reference.
    pub fn boxed_int(v: i32) -> Self {
        Self::Ref(Some(Object::Integer(v)))
    }

    /// Boxed boolean reference.
    pub fn boxed_bool(v: bool) -> Self {
        Self::Ref(Some(Object::Boolean(v)))
    }

    /// String reference.
    pub fn string(s: impl Into<String>) -> Self {
        Self::Ref(Some(Object::Str(s.into())))
    }

    /// Value produced by a constant.
    pub fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Int(v) => Self::Int(*v),
            Constant::Long(v) => Self::Long(*v),
            Constant::Float(v) => Self::Float(*v),
            Constant::Double(v) => Self::Double(*v),
            Constant::Null => Self::Ref(None),
            Constant::Str(s) => Self::Ref(Some(Object::Str(s.clone()))),
            Constant::Class(t) => Self::Ref(Some(Object::Class(t.clone()))),
        }
    }

    /// Numeric kind, `None` for references.
    pub fn num_kind(&self) -> Option<NumKind> {
        match self {
            Self::Int(_) => Some(NumKind::Int),
            Self::Long(_) => Some(NumKind::Long),
            Self::Float(_) => Some(NumKind::Float),
            Self::Double(_) => Some(NumKind::Double),
            Self::Ref(_) => None,
        }
    }

    /// Whether this value may be returned by `kind`.
    pub fn fits_return(&self, kind: ReturnKind) -> bool {
        matches!(
            (self, kind),
            (Self::Int(_), ReturnKind::Int)
                | (Self::Long(_), ReturnKind::Long)
                | (Self::Float(_), ReturnKind::Float)
                | (Self::Double(_), ReturnKind::Double)
                | (Self::Ref(_), ReturnKind::Reference)
        )
    }

    /// Equality used by test expectations: NaN matches NaN, signed zeros differ.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Self::Double(a), Self::Double(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            _ => self == other,
        }
    }

    /// Approximate heap footprint in bytes, including the slot itself.
    pub fn footprint(&self) -> u64 {
        match self {
            Self::Ref(Some(object)) => super::vm::SLOT_BYTES + object.footprint(),
            _ => super::vm::SLOT_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_as_treats_nan_as_equal_and_zeros_as_distinct() {
        assert!(Value::Double(f64::NAN).same_as(&Value::Double(f64::NAN)));
        assert!(Value::Float(f32::NAN).same_as(&Value::Float(-f32::NAN)));
        assert!(!Value::Double(0.0).same_as(&Value::Double(-0.0)));
        assert!(Value::Int(3).same_as(&Value::Int(3)));
        assert!(!Value::Int(3).same_as(&Value::Long(3)));
    }

    #[test]
    fn instance_checks_follow_wrapper_hierarchy() {
        let five = Object::Integer(5);
        assert!(five.is_instance_of(INTEGER_CLASS));
        assert!(five.is_instance_of("lang/Number"));
        assert!(five.is_instance_of(OBJECT_CLASS));
        assert!(!five.is_instance_of(STRING_CLASS));
        assert!(!Object::Boolean(true).is_instance_of(INTEGER_CLASS));
    }
}
