use super::expression::Expression;
use super::loader::TypeLoader;
use super::object::{ArrayRef, ObjRef};
use super::types::RtType;
use crate::error::{Error, Result};
use crate::ops::Literal;
use itertools::Itertools;
use std::fmt;
use std::sync::Arc;

/// A callable value: interpreted lambdas and compiled expression trees.
pub trait Invocable: Send + Sync + fmt::Debug {
    fn parameter_count(&self) -> usize;

    fn invoke(&self, loader: &dyn TypeLoader, arguments: Vec<Value>) -> Result<Value>;

    /// The delegate type this callable was converted to, when known.
    fn delegate_type(&self) -> Option<RtType> {
        None
    }

    /// Targets of a combined delegate, in invocation order. `None` for a single target.
    fn invocation_list(&self) -> Option<Vec<Arc<dyn Invocable>>> {
        None
    }
}

/// A runtime value. Reference types compare by identity.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Void,
    Bool(bool),
    Char(char),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    String(Arc<str>),
    Object(ObjRef),
    Array(ArrayRef),
    Type(RtType),
    Tuple(Arc<Vec<Value>>),
    Delegate(Arc<dyn Invocable>),
    Expression(Arc<Expression>),
}

impl Value {
    pub fn string(value: impl AsRef<str>) -> Self {
        Value::String(Arc::from(value.as_ref()))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(items))
    }

    pub fn from_literal(literal: &Literal) -> Result<Self> {
        Ok(match literal {
            Literal::Null => Value::Null,
            Literal::Bool(v) => Value::Bool(*v),
            Literal::Char(v) => Value::Char(*v),
            Literal::SByte(v) => Value::SByte(*v),
            Literal::Byte(v) => Value::Byte(*v),
            Literal::Int16(v) => Value::Int16(*v),
            Literal::UInt16(v) => Value::UInt16(*v),
            Literal::Int32(v) => Value::Int32(*v),
            Literal::UInt32(v) => Value::UInt32(*v),
            Literal::Int64(v) => Value::Int64(*v),
            Literal::UInt64(v) => Value::UInt64(*v),
            Literal::Single(v) => Value::Single(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::String(v) => Value::string(v),
            Literal::Decimal(text) => {
                return Err(Error::not_supported(format!(
                    "literal of kind decimal ({}) cannot be represented",
                    text
                )))
            }
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::SByte(_) => "sbyte",
            Value::Byte(_) => "byte",
            Value::Int16(_) => "short",
            Value::UInt16(_) => "ushort",
            Value::Int32(_) => "int",
            Value::UInt32(_) => "uint",
            Value::Int64(_) => "long",
            Value::UInt64(_) => "ulong",
            Value::Single(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Type(_) => "type",
            Value::Tuple(_) => "tuple",
            Value::Delegate(_) => "delegate",
            Value::Expression(_) => "expression",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(Error::state(format!(
                "expected a bool, got {}",
                other.kind_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(v) => Ok(v),
            other => Err(Error::state(format!(
                "expected a string, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Integral value widened to `i64`; used for indices and sizes.
    pub fn as_i64(&self) -> Result<i64> {
        Ok(match self {
            Value::Char(v) => *v as i64,
            Value::SByte(v) => *v as i64,
            Value::Byte(v) => *v as i64,
            Value::Int16(v) => *v as i64,
            Value::UInt16(v) => *v as i64,
            Value::Int32(v) => *v as i64,
            Value::UInt32(v) => *v as i64,
            Value::Int64(v) => *v,
            Value::UInt64(v) => i64::try_from(*v)
                .map_err(|_| Error::state(format!("{} does not fit an index", v)))?,
            other => {
                return Err(Error::state(format!(
                    "expected an integer, got {}",
                    other.kind_name()
                )))
            }
        })
    }

    pub fn as_object(&self) -> Result<&ObjRef> {
        match self {
            Value::Object(obj) => Ok(obj),
            Value::Null => Err(null_reference()),
            other => Err(Error::state(format!(
                "expected an object, got {}",
                other.kind_name()
            ))),
        }
    }
}

pub(crate) fn null_reference() -> Error {
    Error::Thrown(
        "System.NullReferenceException: Object reference not set to an instance of an object."
            .to_string(),
    )
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::SByte(a), Value::SByte(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Single(a), Value::Single(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Delegate(a), Value::Delegate(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::Expression(a), Value::Expression(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Void => Ok(()),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Char(v) => write!(f, "{}", v),
            Value::SByte(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Object(obj) => write!(f, "{}", obj.ty()),
            Value::Array(array) => write!(f, "{}[]", array.element_type()),
            Value::Type(ty) => write!(f, "{}", ty),
            Value::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
            Value::Delegate(delegate) => match delegate.delegate_type() {
                Some(ty) => write!(f, "{}", ty),
                None => f.write_str("System.Delegate"),
            },
            Value::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_literals_are_rejected() {
        let err = Value::from_literal(&Literal::Decimal("1.25".into())).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotSupported);
    }

    #[test]
    fn every_other_literal_decodes_natively() {
        assert_eq!(Value::from_literal(&Literal::UInt16(7)).unwrap(), Value::UInt16(7));
        assert_eq!(Value::from_literal(&Literal::Char('x')).unwrap(), Value::Char('x'));
        assert_eq!(Value::from_literal(&Literal::Single(1.5)).unwrap(), Value::Single(1.5));
        assert_eq!(Value::from_literal(&Literal::String("s".into())).unwrap(), Value::from("s"));
    }

    #[test]
    fn display_follows_host_conventions() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Double(2.0).to_string(), "2");
        assert_eq!(Value::tuple(vec![Value::Int32(2), Value::from("str")]).to_string(), "(2, str)");
        assert_eq!(Value::Null.to_string(), "");
    }
}
