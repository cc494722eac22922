use serde_json::{Number, Value};

use super::{present, FormatError};
use crate::BoxError;

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOptions {
    /// Round to this many decimals, halves away from zero.
    pub to_fixed: Option<u32>,
}

/// Converts strings and numbers to a number.
///
/// Strings starting with `0x` are read as hexadecimal. Other strings are read
/// up to the first character that cannot continue a decimal number, so
/// `"1412 px"` is `1412`. Whole results are emitted as integers.
pub fn as_number(
    options: NumberOptions,
) -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static {
    move |value| {
        let Some(value) = present(value) else {
            return Ok(None);
        };

        let mut number = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number_prefix(s),
            _ => None,
        }
        .ok_or_else(|| FormatError::InvalidNumber(value.to_string()))?;

        if let Some(decimals) = options.to_fixed {
            let scale = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
            let scaled = number * scale;
            // Past f64 precision there is nothing left to round.
            if scaled.is_finite() {
                number = scaled.round() / scale;
            }
        }

        Ok(Some(to_json_number(number).ok_or_else(|| FormatError::InvalidNumber(value.to_string()))?))
    }
}

/// Shorthand for [`as_number`] rounding to zero decimals.
pub fn as_int() -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static {
    as_number(NumberOptions { to_fixed: Some(0) })
}

fn to_json_number(number: f64) -> Option<Value> {
    if !number.is_finite() {
        return None;
    }
    if number.fract() == 0.0 && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        return Some(Value::from(number as i64));
    }
    Number::from_f64(number).map(Value::Number)
}

fn parse_number_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return parse_hex_prefix(hex);
    }

    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

fn parse_hex_prefix(hex: &str) -> Option<f64> {
    let digits: Vec<u32> = hex.chars().map_while(|c| c.to_digit(16)).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.into_iter().fold(0.0, |acc, d| acc * 16.0 + f64::from(d)))
}
