//! Formatting of interpolated segments: `{value,alignment:format}`.

use super::value::Value;
use crate::error::{Error, Result};

/// Exclusive upper bound on alignment widths and precision digits.
pub const MAX_FORMAT_WIDTH: usize = 1_000_000;

fn bounded(width: usize, what: &str) -> Result<usize> {
    if width >= MAX_FORMAT_WIDTH {
        return Err(Error::not_supported(format!(
            "{} {} exceeds the limit of {}",
            what,
            width,
            MAX_FORMAT_WIDTH - 1
        )));
    }
    Ok(width)
}

fn format_exception(specifier: &str, value: &Value) -> Error {
    Error::Thrown(format!(
        "System.FormatException: Format specifier '{}' is invalid for a {} value.",
        specifier,
        value.kind_name()
    ))
}

fn integer_of(value: &Value) -> Option<i128> {
    Some(match value {
        Value::SByte(v) => *v as i128,
        Value::Byte(v) => *v as i128,
        Value::Int16(v) => *v as i128,
        Value::UInt16(v) => *v as i128,
        Value::Int32(v) => *v as i128,
        Value::UInt32(v) => *v as i128,
        Value::Int64(v) => *v as i128,
        Value::UInt64(v) => *v as i128,
        _ => return None,
    })
}

fn float_of(value: &Value) -> Option<f64> {
    match value {
        Value::Single(v) => Some(*v as f64),
        Value::Double(v) => Some(*v),
        other => integer_of(other).map(|v| v as f64),
    }
}

/// Two's-complement bits of an integer at its own width.
fn hex_bits(value: &Value) -> Option<u128> {
    Some(match value {
        Value::SByte(v) => *v as u8 as u128,
        Value::Byte(v) => *v as u128,
        Value::Int16(v) => *v as u16 as u128,
        Value::UInt16(v) => *v as u128,
        Value::Int32(v) => *v as u32 as u128,
        Value::UInt32(v) => *v as u128,
        Value::Int64(v) => *v as u64 as u128,
        Value::UInt64(v) => *v as u128,
        _ => return None,
    })
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn exponential(value: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    let marker = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:03}", mantissa, marker, sign, exponent.abs())
}

fn apply_specifier(value: &Value, specifier: &str) -> Result<String> {
    let mut chars = specifier.chars();
    let Some(letter) = chars.next() else {
        return Ok(value.to_string());
    };
    let precision_text: String = chars.collect();
    let precision = if precision_text.is_empty() {
        None
    } else {
        let digits = precision_text
            .parse::<usize>()
            .map_err(|_| Error::not_supported(format!("custom format string '{}'", specifier)))?;
        Some(bounded(digits, "precision")?)
    };
    match letter {
        'D' | 'd' => {
            let v = integer_of(value).ok_or_else(|| format_exception(specifier, value))?;
            let digits = v.unsigned_abs().to_string();
            let width = precision.unwrap_or(0);
            let sign = if v < 0 { "-" } else { "" };
            Ok(format!("{}{:0>width$}", sign, digits, width = width))
        }
        'F' | 'f' => {
            let v = float_of(value).ok_or_else(|| format_exception(specifier, value))?;
            Ok(format!("{:.*}", precision.unwrap_or(2), v))
        }
        'N' | 'n' => {
            let v = float_of(value).ok_or_else(|| format_exception(specifier, value))?;
            let fixed = format!("{:.*}", precision.unwrap_or(2), v.abs());
            let (whole, fraction) = match fixed.split_once('.') {
                Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
                None => (fixed.clone(), None),
            };
            let sign = if v < 0.0 { "-" } else { "" };
            Ok(match fraction {
                Some(fraction) => format!("{}{}.{}", sign, group_thousands(&whole), fraction),
                None => format!("{}{}", sign, group_thousands(&whole)),
            })
        }
        'X' | 'x' => {
            let bits = hex_bits(value).ok_or_else(|| format_exception(specifier, value))?;
            let width = precision.unwrap_or(0);
            Ok(if letter == 'X' {
                format!("{:0>width$X}", bits, width = width)
            } else {
                format!("{:0>width$x}", bits, width = width)
            })
        }
        'E' | 'e' => {
            let v = float_of(value).ok_or_else(|| format_exception(specifier, value))?;
            Ok(exponential(v, precision.unwrap_or(6), letter == 'E'))
        }
        'G' | 'g' => Ok(value.to_string()),
        _ => Err(Error::not_supported(format!("custom format string '{}'", specifier))),
    }
}

/// Format one interpolation hole. Positive alignment right-aligns, negative left-aligns.
pub fn format_value(value: &Value, alignment: Option<i64>, format: Option<&str>) -> Result<String> {
    let text = match format {
        Some(specifier) if !specifier.is_empty() => apply_specifier(value, specifier)?,
        _ => value.to_string(),
    };
    let Some(alignment) = alignment else {
        return Ok(text);
    };
    let width = bounded(
        usize::try_from(alignment.unsigned_abs()).unwrap_or(usize::MAX),
        "alignment",
    )?;
    Ok(if alignment < 0 {
        format!("{:<width$}", text, width = width)
    } else {
        format!("{:>width$}", text, width = width)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn alignment_pads_on_the_requested_side() {
        assert_eq!(format_value(&Value::Int32(7), Some(4), None).unwrap(), "   7");
        assert_eq!(format_value(&Value::from("ab"), Some(-4), None).unwrap(), "ab  ");
    }

    #[test]
    fn oversized_alignment_and_precision_are_rejected() {
        let err = format_value(&Value::Int32(7), Some(i64::MIN), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotSupported);
        let err = format_value(&Value::Int32(7), Some(MAX_FORMAT_WIDTH as i64), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotSupported);
        let err = format_value(&Value::Int32(7), None, Some("D4000000000")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotSupported);
        let widest = format_value(&Value::Int32(7), Some(-999), None).unwrap();
        assert_eq!(widest.len(), 999);
    }

    #[test]
    fn standard_numeric_specifiers() {
        assert_eq!(format_value(&Value::Int32(-42), None, Some("D5")).unwrap(), "-00042");
        assert_eq!(format_value(&Value::Double(3.14159), None, Some("F2")).unwrap(), "3.14");
        assert_eq!(format_value(&Value::Int32(1234567), None, Some("N0")).unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::Int32(255), None, Some("X4")).unwrap(), "00FF");
        assert_eq!(format_value(&Value::Int32(-1), None, Some("x")).unwrap(), "ffffffff");
        assert_eq!(format_value(&Value::Double(1234.5), None, Some("E2")).unwrap(), "1.23E+003");
    }

    #[test]
    fn integer_specifier_rejects_floats() {
        let err = format_value(&Value::Double(1.0), None, Some("D")).unwrap_err();
        assert!(err.to_string().contains("FormatException"));
    }
}
