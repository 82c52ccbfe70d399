//! Type inference for single fields.

use serde::{Deserialize, Serialize};

/// Narrowest type able to hold a field's value.
///
/// Variants are ordered from least to most specific for numbers, so the
/// widest integer seen in a column is simply the maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Empty or whitespace only.
    Null,
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    /// An integer that does not fit `i64`.
    BigInt,
    Double,
}

impl DataType {
    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::BigInt)
    }

    #[must_use]
    pub const fn is_num(self) -> bool {
        self.is_int() || matches!(self, Self::Double)
    }
}

/// Classify `s`, returning the value as well when it is numeric.
///
/// Leading and trailing spaces are ignored. Accepted numbers have an
/// optional sign, at least one digit, at most one decimal point and an
/// optional exponent (`e`/`E`, optional sign, digits).
#[must_use]
pub fn data_type(s: &str) -> (DataType, Option<f64>) {
    let s = s.trim_matches(|c: char| c.is_ascii_whitespace());
    if s.is_empty() {
        return (DataType::Null, None);
    }
    if !is_number_syntax(s) {
        return (DataType::String, None);
    }

    let is_float = s.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'));
    if !is_float {
        if let Ok(n) = s.parse::<i64>() {
            #[allow(clippy::cast_precision_loss)]
            return (int_type(n), Some(n as f64));
        }
        return (DataType::BigInt, s.parse::<f64>().ok());
    }
    match s.parse::<f64>() {
        Ok(x) => (DataType::Double, Some(x)),
        Err(_) => (DataType::String, None),
    }
}

fn int_type(n: i64) -> DataType {
    if i8::try_from(n).is_ok() {
        DataType::Int8
    } else if i16::try_from(n).is_ok() {
        DataType::Int16
    } else if i32::try_from(n).is_ok() {
        DataType::Int32
    } else {
        DataType::Int64
    }
}

fn is_number_syntax(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut digits = 0;
    let mut dot = false;

    while let Some(&b) = bytes.get(i) {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' if !dot => dot = true,
            b'e' | b'E' => {
                if digits == 0 {
                    return false;
                }
                let mut j = i + 1;
                if matches!(bytes.get(j), Some(b'+' | b'-')) {
                    j += 1;
                }
                let exponent = &bytes[j.min(bytes.len())..];
                return !exponent.is_empty() && exponent.iter().all(u8::is_ascii_digit);
            }
            _ => return false,
        }
        i += 1;
    }
    digits > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_integers_by_width() {
        assert_eq!(data_type("12").0, DataType::Int8);
        assert_eq!(data_type("-300").0, DataType::Int16);
        assert_eq!(data_type("70000").0, DataType::Int32);
        assert_eq!(data_type("5000000000").0, DataType::Int64);
        assert_eq!(data_type("99999999999999999999").0, DataType::BigInt);
        assert_eq!(data_type("  42 "), (DataType::Int8, Some(42.0)));
    }

    #[test]
    fn classifies_floats_and_strings() {
        assert_eq!(data_type("3.25"), (DataType::Double, Some(3.25)));
        assert_eq!(data_type("-1e3"), (DataType::Double, Some(-1000.0)));
        assert_eq!(data_type("2.5E-1"), (DataType::Double, Some(0.25)));
        assert_eq!(data_type(".5").0, DataType::Double);
        assert_eq!(data_type("1.2.3").0, DataType::String);
        assert_eq!(data_type("1e").0, DataType::String);
        assert_eq!(data_type("e5").0, DataType::String);
        assert_eq!(data_type("-").0, DataType::String);
        assert_eq!(data_type("12abc").0, DataType::String);
        assert_eq!(data_type("1 2").0, DataType::String);
        assert_eq!(data_type("   ").0, DataType::Null);
    }
}
