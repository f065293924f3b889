//! Operator semantics with host-style numeric promotion.

use super::loader::TypeLoader;
use super::types::{PrimitiveKind, RtType, RtTypeKind};
use super::value::Value;
use crate::error::{Error, Result};
use crate::ops::{BinaryOperator, UnaryOperator};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        Some(match value {
            Value::Char(v) => Num::I32(*v as i32),
            Value::SByte(v) => Num::I32(*v as i32),
            Value::Byte(v) => Num::I32(*v as i32),
            Value::Int16(v) => Num::I32(*v as i32),
            Value::UInt16(v) => Num::I32(*v as i32),
            Value::Int32(v) => Num::I32(*v),
            Value::UInt32(v) => Num::U32(*v),
            Value::Int64(v) => Num::I64(*v),
            Value::UInt64(v) => Num::U64(*v),
            Value::Single(v) => Num::F32(*v),
            Value::Double(v) => Num::F64(*v),
            _ => return None,
        })
    }

    fn rank(self) -> u8 {
        match self {
            Num::I32(_) => 0,
            Num::U32(_) => 1,
            Num::I64(_) => 2,
            Num::U64(_) => 3,
            Num::F32(_) => 4,
            Num::F64(_) => 5,
        }
    }

    fn is_signed_int(self) -> bool {
        matches!(self, Num::I32(_) | Num::I64(_))
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::I32(v) => v as f64,
            Num::U32(v) => v as f64,
            Num::I64(v) => v as f64,
            Num::U64(v) => v as f64,
            Num::F32(v) => v as f64,
            Num::F64(v) => v,
        }
    }

    fn as_i128(self) -> i128 {
        match self {
            Num::I32(v) => v as i128,
            Num::U32(v) => v as i128,
            Num::I64(v) => v as i128,
            Num::U64(v) => v as i128,
            Num::F32(v) => v.trunc() as i128,
            Num::F64(v) => v.trunc() as i128,
        }
    }

    fn to_rank(self, rank: u8) -> Num {
        match rank {
            0 => Num::I32(self.as_i128() as i32),
            1 => Num::U32(self.as_i128() as u32),
            2 => Num::I64(self.as_i128() as i64),
            3 => Num::U64(self.as_i128() as u64),
            4 => Num::F32(self.as_f64() as f32),
            _ => Num::F64(self.as_f64()),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::I32(v) => Value::Int32(v),
            Num::U32(v) => Value::UInt32(v),
            Num::I64(v) => Value::Int64(v),
            Num::U64(v) => Value::UInt64(v),
            Num::F32(v) => Value::Single(v),
            Num::F64(v) => Value::Double(v),
        }
    }
}

/// Binary numeric promotion: both operands widened to a common representation.
fn promote(left: Num, right: Num) -> (Num, Num) {
    let mut rank = left.rank().max(right.rank());
    // uint mixed with a signed int widens to long
    if rank == 1 && (left.is_signed_int() || right.is_signed_int()) {
        rank = 2;
    }
    if rank == 3 && (left.is_signed_int() || right.is_signed_int()) {
        rank = 2;
    }
    (left.to_rank(rank), right.to_rank(rank))
}

fn divide_by_zero() -> Error {
    Error::Thrown("System.DivideByZeroException: Attempted to divide by zero.".to_string())
}

fn overflow() -> Error {
    Error::Thrown(
        "System.OverflowException: Arithmetic operation resulted in an overflow.".to_string(),
    )
}

fn invalid_operands(op: BinaryOperator, left: &Value, right: &Value) -> Error {
    Error::not_supported(format!(
        "operator {} is not defined for {} and {}",
        op.symbol(),
        left.kind_name(),
        right.kind_name()
    ))
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $ctor:path) => {
        match $op {
            BinaryOperator::Add => $ctor($a.wrapping_add($b)),
            BinaryOperator::Subtract => $ctor($a.wrapping_sub($b)),
            BinaryOperator::Multiply => $ctor($a.wrapping_mul($b)),
            BinaryOperator::Divide | BinaryOperator::Remainder if $b == 0 => {
                return Err(divide_by_zero())
            }
            // MinValue / -1 is the only remaining failure
            BinaryOperator::Divide => $ctor($a.checked_div($b).ok_or_else(overflow)?),
            BinaryOperator::Remainder => $ctor($a.checked_rem($b).ok_or_else(overflow)?),
            BinaryOperator::And => $ctor($a & $b),
            BinaryOperator::Or => $ctor($a | $b),
            BinaryOperator::ExclusiveOr => $ctor($a ^ $b),
            _ => return Ok(None),
        }
    };
}

macro_rules! float_arith {
    ($op:expr, $a:expr, $b:expr, $ctor:path) => {
        match $op {
            BinaryOperator::Add => $ctor($a + $b),
            BinaryOperator::Subtract => $ctor($a - $b),
            BinaryOperator::Multiply => $ctor($a * $b),
            BinaryOperator::Divide => $ctor($a / $b),
            BinaryOperator::Remainder => $ctor($a % $b),
            _ => return Ok(None),
        }
    };
}

fn numeric_arith(op: BinaryOperator, left: Num, right: Num) -> Result<Option<Num>> {
    let (left, right) = promote(left, right);
    Ok(Some(match (left, right) {
        (Num::I32(a), Num::I32(b)) => int_arith!(op, a, b, Num::I32),
        (Num::U32(a), Num::U32(b)) => int_arith!(op, a, b, Num::U32),
        (Num::I64(a), Num::I64(b)) => int_arith!(op, a, b, Num::I64),
        (Num::U64(a), Num::U64(b)) => int_arith!(op, a, b, Num::U64),
        (Num::F32(a), Num::F32(b)) => float_arith!(op, a, b, Num::F32),
        (Num::F64(a), Num::F64(b)) => float_arith!(op, a, b, Num::F64),
        _ => return Ok(None),
    }))
}

fn numeric_compare(left: Num, right: Num) -> Option<Ordering> {
    match promote(left, right) {
        (Num::I32(a), Num::I32(b)) => Some(a.cmp(&b)),
        (Num::U32(a), Num::U32(b)) => Some(a.cmp(&b)),
        (Num::I64(a), Num::I64(b)) => Some(a.cmp(&b)),
        (Num::U64(a), Num::U64(b)) => Some(a.cmp(&b)),
        (Num::F32(a), Num::F32(b)) => a.partial_cmp(&b),
        (Num::F64(a), Num::F64(b)) => a.partial_cmp(&b),
        _ => None,
    }
}

fn shift(op: BinaryOperator, left: Num, count: i64) -> Option<Num> {
    let left_shift = op == BinaryOperator::LeftShift;
    Some(match left {
        Num::I32(v) => {
            let c = (count & 0x1f) as u32;
            Num::I32(if left_shift { v.wrapping_shl(c) } else { v >> c })
        }
        Num::U32(v) => {
            let c = (count & 0x1f) as u32;
            Num::U32(if left_shift { v.wrapping_shl(c) } else { v >> c })
        }
        Num::I64(v) => {
            let c = (count & 0x3f) as u32;
            Num::I64(if left_shift { v.wrapping_shl(c) } else { v >> c })
        }
        Num::U64(v) => {
            let c = (count & 0x3f) as u32;
            Num::U64(if left_shift { v.wrapping_shl(c) } else { v >> c })
        }
        _ => return None,
    })
}

fn compare_result(op: BinaryOperator, ordering: Option<Ordering>) -> bool {
    match (op, ordering) {
        (BinaryOperator::Equals, Some(o)) => o == Ordering::Equal,
        (BinaryOperator::NotEquals, Some(o)) => o != Ordering::Equal,
        (BinaryOperator::NotEquals, None) => true,
        (BinaryOperator::LessThan, Some(o)) => o == Ordering::Less,
        (BinaryOperator::LessThanOrEqual, Some(o)) => o != Ordering::Greater,
        (BinaryOperator::GreaterThan, Some(o)) => o == Ordering::Greater,
        (BinaryOperator::GreaterThanOrEqual, Some(o)) => o != Ordering::Less,
        _ => false,
    }
}

/// Evaluate a binary operator over two already-evaluated operands.
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    if op == BinaryOperator::Add
        && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
    {
        return Ok(Value::string(format!("{}{}", left, right)));
    }
    if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
        let (a, b) = (*a, *b);
        return Ok(Value::Bool(match op {
            BinaryOperator::And | BinaryOperator::ConditionalAnd => a && b,
            BinaryOperator::Or | BinaryOperator::ConditionalOr => a || b,
            BinaryOperator::ExclusiveOr | BinaryOperator::NotEquals => a != b,
            BinaryOperator::Equals => a == b,
            _ => return Err(invalid_operands(op, left, right)),
        }));
    }
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        if op.is_comparison() {
            return Ok(Value::Bool(compare_result(op, numeric_compare(a, b))));
        }
        if matches!(op, BinaryOperator::LeftShift | BinaryOperator::RightShift) {
            return shift(op, a, right.as_i64()?)
                .map(Num::into_value)
                .ok_or_else(|| invalid_operands(op, left, right));
        }
        return numeric_arith(op, a, b)?
            .map(Num::into_value)
            .ok_or_else(|| invalid_operands(op, left, right));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        if op.is_comparison() && !matches!(op, BinaryOperator::Equals | BinaryOperator::NotEquals) {
            return Err(invalid_operands(op, left, right));
        }
        return Ok(Value::Bool(compare_result(op, Some(a.cmp(b)))));
    }
    match op {
        BinaryOperator::Equals => Ok(Value::Bool(left == right)),
        BinaryOperator::NotEquals => Ok(Value::Bool(left != right)),
        _ => Err(invalid_operands(op, left, right)),
    }
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Result<Value> {
    let unsupported = || {
        Error::not_supported(format!(
            "unary operator {:?} is not defined for {}",
            op,
            operand.kind_name()
        ))
    };
    match (op, operand) {
        (UnaryOperator::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOperator::Plus, _) => Num::of(operand).map(Num::into_value).ok_or_else(unsupported),
        (UnaryOperator::Minus, _) => match Num::of(operand).ok_or_else(unsupported)? {
            Num::I32(v) => Ok(Value::Int32(v.wrapping_neg())),
            Num::U32(v) => Ok(Value::Int64(-(v as i64))),
            Num::I64(v) => Ok(Value::Int64(v.wrapping_neg())),
            Num::U64(_) => Err(unsupported()),
            Num::F32(v) => Ok(Value::Single(-v)),
            Num::F64(v) => Ok(Value::Double(-v)),
        },
        (UnaryOperator::BitwiseNegation, _) => match Num::of(operand).ok_or_else(unsupported)? {
            Num::I32(v) => Ok(Value::Int32(!v)),
            Num::U32(v) => Ok(Value::UInt32(!v)),
            Num::I64(v) => Ok(Value::Int64(!v)),
            Num::U64(v) => Ok(Value::UInt64(!v)),
            _ => Err(unsupported()),
        },
        _ => Err(unsupported()),
    }
}

/// `value + 1` / `value - 1` preserving the operand's own type.
pub fn step(value: &Value, decrement: bool) -> Result<Value> {
    let delta: i64 = if decrement { -1 } else { 1 };
    Ok(match value {
        Value::Char(v) => char::from_u32((*v as i64 + delta) as u32).map(Value::Char).ok_or_else(overflow)?,
        Value::SByte(v) => Value::SByte((*v as i64 + delta) as i8),
        Value::Byte(v) => Value::Byte((*v as i64 + delta) as u8),
        Value::Int16(v) => Value::Int16((*v as i64 + delta) as i16),
        Value::UInt16(v) => Value::UInt16((*v as i64 + delta) as u16),
        Value::Int32(v) => Value::Int32(v.wrapping_add(delta as i32)),
        Value::UInt32(v) => Value::UInt32(v.wrapping_add(delta as u32)),
        Value::Int64(v) => Value::Int64(v.wrapping_add(delta)),
        Value::UInt64(v) => Value::UInt64(v.wrapping_add(delta as u64)),
        Value::Single(v) => Value::Single(v + delta as f32),
        Value::Double(v) => Value::Double(v + delta as f64),
        other => {
            return Err(Error::not_supported(format!(
                "increment is not defined for {}",
                other.kind_name()
            )))
        }
    })
}

/// Result of a compound assignment keeps the target's own numeric type.
pub fn narrow_to(template: &Value, value: Value) -> Value {
    let Some(num) = Num::of(&value) else {
        return value;
    };
    let wide = num.as_i128();
    match template {
        Value::SByte(_) => Value::SByte(wide as i8),
        Value::Byte(_) => Value::Byte(wide as u8),
        Value::Int16(_) => Value::Int16(wide as i16),
        Value::UInt16(_) => Value::UInt16(wide as u16),
        Value::Char(_) => char::from_u32(wide as u32).map(Value::Char).unwrap_or(value),
        _ => value,
    }
}

fn invalid_cast(from: &str, to: &RtType) -> Error {
    Error::Thrown(format!(
        "System.InvalidCastException: Unable to cast object of type '{}' to type '{}'.",
        from, to
    ))
}

macro_rules! narrow {
    ($wide:expr, $checked:expr, $ty:ty, $ctor:path) => {{
        if $checked && ($wide < <$ty>::MIN as i128 || $wide > <$ty>::MAX as i128) {
            return Err(overflow());
        }
        $ctor($wide as $ty)
    }};
}

fn convert_primitive(value: &Value, kind: PrimitiveKind, target: &RtType, checked: bool) -> Result<Value> {
    match kind {
        PrimitiveKind::String => match value {
            Value::String(_) | Value::Null => Ok(value.clone()),
            other => Err(invalid_cast(other.kind_name(), target)),
        },
        PrimitiveKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(invalid_cast(other.kind_name(), target)),
        },
        _ => {
            let num = Num::of(value).ok_or_else(|| invalid_cast(value.kind_name(), target))?;
            if checked {
                if let Num::F32(f) = num {
                    if !f.is_finite() {
                        return Err(overflow());
                    }
                }
                if let Num::F64(f) = num {
                    if !f.is_finite() {
                        return Err(overflow());
                    }
                }
            }
            let wide = num.as_i128();
            Ok(match kind {
                PrimitiveKind::Single => Value::Single(num.as_f64() as f32),
                PrimitiveKind::Double => Value::Double(num.as_f64()),
                PrimitiveKind::SByte => narrow!(wide, checked, i8, Value::SByte),
                PrimitiveKind::Byte => narrow!(wide, checked, u8, Value::Byte),
                PrimitiveKind::Int16 => narrow!(wide, checked, i16, Value::Int16),
                PrimitiveKind::UInt16 => narrow!(wide, checked, u16, Value::UInt16),
                PrimitiveKind::Int32 => narrow!(wide, checked, i32, Value::Int32),
                PrimitiveKind::UInt32 => narrow!(wide, checked, u32, Value::UInt32),
                PrimitiveKind::Int64 => narrow!(wide, checked, i64, Value::Int64),
                PrimitiveKind::UInt64 => narrow!(wide, checked, u64, Value::UInt64),
                PrimitiveKind::Char => {
                    let code = narrow!(wide, checked, u16, Value::UInt16);
                    match code {
                        Value::UInt16(c) => char::from_u32(c as u32)
                            .map(Value::Char)
                            .ok_or_else(|| invalid_cast(value.kind_name(), target))?,
                        other => other,
                    }
                }
                PrimitiveKind::Boolean | PrimitiveKind::String => {
                    return Err(invalid_cast(value.kind_name(), target))
                }
            })
        }
    }
}

/// Explicit or implicit conversion of `value` to `target`.
pub fn convert(loader: &dyn TypeLoader, value: &Value, target: &RtType, checked: bool) -> Result<Value> {
    match target.kind {
        RtTypeKind::Primitive(kind) => convert_primitive(value, kind, target, checked),
        RtTypeKind::GenericParameter { .. } | RtTypeKind::Void => Ok(value.clone()),
        _ if value.is_null() => Ok(Value::Null),
        _ => {
            let actual = loader.type_of(value)?;
            if loader.is_assignable(target, &actual)? {
                Ok(value.clone())
            } else {
                Err(invalid_cast(&actual.full_name(), target))
            }
        }
    }
}

pub fn default_value(ty: &RtType) -> Value {
    match ty.kind {
        RtTypeKind::Primitive(kind) => match kind {
            PrimitiveKind::Boolean => Value::Bool(false),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::SByte => Value::SByte(0),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Int16 => Value::Int16(0),
            PrimitiveKind::UInt16 => Value::UInt16(0),
            PrimitiveKind::Int32 => Value::Int32(0),
            PrimitiveKind::UInt32 => Value::UInt32(0),
            PrimitiveKind::Int64 => Value::Int64(0),
            PrimitiveKind::UInt64 => Value::UInt64(0),
            PrimitiveKind::Single => Value::Single(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
            PrimitiveKind::String => Value::Null,
        },
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_promote_to_int() {
        let sum = binary(BinaryOperator::Add, &Value::Byte(200), &Value::Byte(100)).unwrap();
        assert_eq!(sum, Value::Int32(300));
    }

    #[test]
    fn uint_with_int_widens_to_long() {
        let diff = binary(BinaryOperator::Subtract, &Value::UInt32(1), &Value::Int32(2)).unwrap();
        assert_eq!(diff, Value::Int64(-1));
    }

    #[test]
    fn string_concatenation_formats_the_other_operand() {
        let joined = binary(BinaryOperator::Add, &Value::from("n="), &Value::Int32(4)).unwrap();
        assert_eq!(joined, Value::from("n=4"));
        let with_null = binary(BinaryOperator::Add, &Value::Null, &Value::from("x")).unwrap();
        assert_eq!(with_null, Value::from("x"));
    }

    #[test]
    fn integer_division_by_zero_throws() {
        let err = binary(BinaryOperator::Divide, &Value::Int32(1), &Value::Int32(0)).unwrap_err();
        assert!(err.to_string().contains("DivideByZeroException"));
    }

    #[test]
    fn min_value_over_minus_one_overflows() {
        let err = binary(BinaryOperator::Divide, &Value::Int32(i32::MIN), &Value::Int32(-1)).unwrap_err();
        assert!(err.to_string().contains("OverflowException"));
        let err = binary(BinaryOperator::Remainder, &Value::Int64(i64::MIN), &Value::Int64(-1)).unwrap_err();
        assert!(err.to_string().contains("OverflowException"));
        let err = binary(BinaryOperator::Remainder, &Value::Int64(7), &Value::Int64(0)).unwrap_err();
        assert!(err.to_string().contains("DivideByZeroException"));
    }

    #[test]
    fn comparisons_and_shifts() {
        assert_eq!(
            binary(BinaryOperator::LessThan, &Value::Int32(3), &Value::Double(3.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinaryOperator::LeftShift, &Value::Int32(1), &Value::Int32(33)).unwrap(),
            Value::Int32(2)
        );
        assert_eq!(
            binary(BinaryOperator::Equals, &Value::Null, &Value::Null).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn unary_minus_on_uint_yields_long() {
        assert_eq!(unary(UnaryOperator::Minus, &Value::UInt32(5)).unwrap(), Value::Int64(-5));
        assert_eq!(unary(UnaryOperator::Not, &Value::Bool(true)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn step_keeps_the_operand_type() {
        assert_eq!(step(&Value::Byte(255), false).unwrap(), Value::Byte(0));
        assert_eq!(step(&Value::Int64(0), true).unwrap(), Value::Int64(-1));
    }
}
