// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Loosely-typed row cells and the numeric coercions used by the encoder.

use std::collections::HashMap;

use num::{BigInt, Integer, One, Signed, ToPrimitive, Zero};

use crate::errors::{IngestError, IngestResult};

/// A single row submitted to [`crate::buffer::ArrowRowBuffer::insert_rows`],
/// keyed by column name (quoted or unquoted spelling).
pub type Row = HashMap<String, Value>;

/// A loosely-typed cell value. The encoder coerces it into the column's
/// storage type and rejects it with `INVALID_ROW` when it does not fit.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical string form used by the temporal and decimal coercions.
    pub(crate) fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Binary(v) => v.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

// Exponents past this point cannot come from a sane timestamp or decimal and
// would force materializing enormous integers.
const MAX_DECIMAL_EXPONENT: i32 = 1000;

/// An exact decimal: `unscaled × 10^(−scale)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedDecimal {
    unscaled: BigInt,
    scale: u32,
}

impl ParsedDecimal {
    /// Change to `target_scale` fractional digits, only if no digits are
    /// lost. Returns the rescaled unscaled integer.
    pub(crate) fn rescale(&self, target_scale: u32) -> Option<BigInt> {
        if target_scale >= self.scale {
            Some(&self.unscaled * pow10(target_scale - self.scale))
        } else {
            let divisor = pow10(self.scale - target_scale);
            let (quotient, remainder) = self.unscaled.div_rem(&divisor);
            remainder.is_zero().then_some(quotient)
        }
    }

    /// Integer part, truncated toward zero.
    pub(crate) fn to_big_int(&self) -> BigInt {
        if self.scale == 0 {
            self.unscaled.clone()
        } else {
            &self.unscaled / pow10(self.scale)
        }
    }

    /// `round(self × 10^scale)`, half-up away from zero.
    pub(crate) fn time_in_scale(&self, scale: u32) -> BigInt {
        let shifted = &self.unscaled * pow10(scale);
        if self.scale == 0 {
            return shifted;
        }
        let divisor = pow10(self.scale);
        let (quotient, remainder) = shifted.div_rem(&divisor);
        if remainder.abs() * BigInt::from(2) >= divisor {
            if shifted.is_negative() {
                quotient - BigInt::one()
            } else {
                quotient + BigInt::one()
            }
        } else {
            quotient
        }
    }
}

pub(crate) fn pow10(exponent: u32) -> BigInt {
    num::pow(BigInt::from(10), exponent as usize)
}

/// Parses a plain or scientific-notation decimal string into an exact
/// unscaled-integer/scale pair.
pub(crate) fn parse_decimal(input: &str) -> IngestResult<ParsedDecimal> {
    let invalid = || IngestError::InvalidRow(format!("cannot parse '{input}' as a number"));

    let trimmed = input.trim();
    let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
        Some(pos) => {
            let exponent: i32 = trimmed[pos + 1..].parse().map_err(|_| invalid())?;
            if exponent.abs() > MAX_DECIMAL_EXPONENT {
                return Err(invalid());
            }
            (&trimmed[..pos], exponent)
        }
        None => (trimmed, 0),
    };

    let (digits, negative) = match mantissa.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (mantissa.strip_prefix('+').unwrap_or(mantissa), false),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let mut unscaled =
        BigInt::parse_bytes(format!("{int_part}{frac_part}").as_bytes(), 10).ok_or_else(invalid)?;
    if negative {
        unscaled = -unscaled;
    }
    let mut scale = frac_part.len() as i64 - exponent as i64;
    if scale < 0 {
        unscaled *= pow10((-scale) as u32);
        scale = 0;
    }
    Ok(ParsedDecimal {
        unscaled,
        scale: scale as u32,
    })
}

/// Low 64 bits of the integer, two's complement.
pub(crate) fn low_i64(value: &BigInt) -> i64 {
    let modulus = BigInt::one() << 64u32;
    value.mod_floor(&modulus).to_u64().unwrap_or_default() as i64
}

/// Low 32 bits of the integer, two's complement.
pub(crate) fn low_i32(value: &BigInt) -> i32 {
    let modulus = BigInt::one() << 32u32;
    value.mod_floor(&modulus).to_u32().unwrap_or_default() as i32
}

/// Decodes a hex-encoded binary value. The encoding must be complete bytes,
/// so an odd number of digits is rejected.
pub(crate) fn parse_hex_binary(input: &str) -> IngestResult<Vec<u8>> {
    if input.len() % 2 != 0 {
        return Err(IngestError::InvalidRow(format!(
            "hex-encoded binary value must have an even number of digits: '{input}'"
        )));
    }
    let mut decoded = Vec::with_capacity(input.len() / 2);
    let mut chars = input.chars();
    while let (Some(high_char), Some(low_char)) = (chars.next(), chars.next()) {
        let high = high_char.to_digit(16).ok_or_else(|| {
            IngestError::InvalidRow(format!("invalid hex character '{high_char}' in '{input}'"))
        })?;
        let low = low_char.to_digit(16).ok_or_else(|| {
            IngestError::InvalidRow(format!("invalid hex character '{low_char}' in '{input}'"))
        })?;
        decoded.push((high << 4 | low) as u8);
    }
    Ok(decoded)
}

/// The accepted spellings of boolean true; everything else is false.
pub(crate) fn string_to_boolean(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "yes" | "y" | "t" | "true" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> ParsedDecimal {
        parse_decimal(s).unwrap()
    }

    #[test]
    fn parse_plain_decimals() {
        assert_eq!(dec("12.34").rescale(2).unwrap(), BigInt::from(1234));
        assert_eq!(dec("0.01").rescale(2).unwrap(), BigInt::from(1));
        assert_eq!(dec("-3.5").rescale(1).unwrap(), BigInt::from(-35));
        assert_eq!(dec("42").rescale(0).unwrap(), BigInt::from(42));
        assert_eq!(dec("+7").rescale(0).unwrap(), BigInt::from(7));
        assert_eq!(dec(".5").rescale(1).unwrap(), BigInt::from(5));
    }

    #[test]
    fn parse_scientific_notation() {
        assert_eq!(dec("1e3").rescale(0).unwrap(), BigInt::from(1000));
        assert_eq!(dec("1.5e2").rescale(0).unwrap(), BigInt::from(150));
        assert_eq!(dec("25e-2").rescale(2).unwrap(), BigInt::from(25));
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in ["", ".", "abc", "1.2.3", "0x10", "1e99999"] {
            assert!(parse_decimal(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn rescale_is_lossless_or_none() {
        // Scaling up pads zeros; scaling down only drops zeros.
        assert_eq!(dec("12.3").rescale(3).unwrap(), BigInt::from(12300));
        assert_eq!(dec("12.300").rescale(1).unwrap(), BigInt::from(123));
        assert_eq!(dec("12.34").rescale(1), None);
    }

    #[test]
    fn integer_part_truncates_toward_zero() {
        assert_eq!(dec("12.34").to_big_int(), BigInt::from(12));
        assert_eq!(dec("0.01").to_big_int(), BigInt::from(0));
        assert_eq!(dec("-12.9").to_big_int(), BigInt::from(-12));
    }

    #[test]
    fn time_in_scale_rounds_half_up() {
        assert_eq!(dec("1.5").time_in_scale(0), BigInt::from(2));
        assert_eq!(dec("1.4").time_in_scale(0), BigInt::from(1));
        assert_eq!(dec("-1.5").time_in_scale(0), BigInt::from(-2));
        assert_eq!(
            dec("1700000000.123456").time_in_scale(6),
            BigInt::from(1700000000123456i64)
        );
        assert_eq!(dec("1700000000.1235").time_in_scale(3), {
            BigInt::from(1700000000124i64)
        });
    }

    #[test]
    fn low_bits_match_twos_complement() {
        assert_eq!(low_i64(&BigInt::from(-1)), -1);
        assert_eq!(low_i64(&BigInt::from(i64::MAX)), i64::MAX);
        assert_eq!(low_i32(&BigInt::from(1i64 << 33 | 5)), 5);
        assert_eq!(low_i32(&BigInt::from(-1)), -1);
    }

    #[test]
    fn hex_binary_decoding() {
        assert_eq!(
            parse_hex_binary("deadBEEF").unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(parse_hex_binary("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex_binary("abc").is_err());
        assert!(parse_hex_binary("zz").is_err());
    }

    #[test]
    fn boolean_spellings() {
        for s in ["1", "yes", "YES", "y", "t", "TRUE", "true", "On"] {
            assert!(string_to_boolean(s), "{s} should be true");
        }
        for s in ["0", "no", "false", "off", "2", ""] {
            assert!(!string_to_boolean(s), "{s} should be false");
        }
    }

    #[test]
    fn canonical_string_forms() {
        assert_eq!(Value::Int(42).as_string(), "42");
        assert_eq!(Value::Real(0.25).as_string(), "0.25");
        assert_eq!(Value::Boolean(true).as_string(), "true");
        assert_eq!(Value::Text("x".to_string()).as_string(), "x");
        assert_eq!(Value::Binary(vec![0xde, 0xad]).as_string(), "dead");
    }
}
