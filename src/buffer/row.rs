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

//! Type-directed coercion of row cells into columnar appends.
//!
//! Encoding is split into two steps so that a row either lands completely or
//! not at all: [`encode_cell`] does every fallible coercion and range check
//! without touching the vector, and [`append_cell`] performs the appends and
//! statistics updates, which cannot fail for a well-formed cell.

use arrow::array::builder::{Int32Builder, Int64Builder};
use arrow::datatypes::{is_validate_decimal_precision, Field};
use num::{BigInt, ToPrimitive};

use crate::buffer::stats::RowBufferStats;
use crate::buffer::vector::{ColumnVector, EPOCH_CHILD, FRACTION_CHILD};
use crate::errors::{IngestError, IngestResult};
use crate::schema::{
    column_precision, column_scale, column_types_of, ColumnLogicalType, ColumnPhysicalType,
};
use crate::value::{low_i32, low_i64, parse_decimal, parse_hex_binary, string_to_boolean, Value};

/// A fully coerced cell, ready to append to its column vector.
#[derive(Debug)]
pub(crate) enum EncodedCell {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int {
        value: i32,
        stat: BigInt,
    },
    BigInt {
        value: i64,
        stat: BigInt,
    },
    Decimal {
        unscaled: i128,
        integer_part: BigInt,
    },
    Float8(f64),
    VarChar(String),
    VarBinary(Vec<u8>),
    Bit(bool),
    DateDay(i32),
    Epoch {
        epoch: i64,
        fraction: i32,
        stat: BigInt,
    },
}

impl EncodedCell {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::TinyInt(_) => "TinyInt",
            Self::SmallInt(_) => "SmallInt",
            Self::Int { .. } => "Int",
            Self::BigInt { .. } => "BigInt",
            Self::Decimal { .. } => "Decimal",
            Self::Float8(_) => "Float8",
            Self::VarChar(_) => "VarChar",
            Self::VarBinary(_) => "VarBinary",
            Self::Bit(_) => "Bit",
            Self::DateDay(_) => "DateDay",
            Self::Epoch { .. } => "Epoch",
        }
    }
}

/// Coerces `value` into the column's storage form, accumulating the byte
/// estimate into `row_size`. Rejects values that do not fit the column with
/// `INVALID_ROW` and inconsistent vector kinds with `INTERNAL_ERROR`.
pub(crate) fn encode_cell(
    field: &Field,
    vector: &ColumnVector,
    value: &Value,
    row_size: &mut f32,
) -> IngestResult<EncodedCell> {
    use ColumnLogicalType as L;
    use ColumnPhysicalType as P;

    let (logical, physical) = column_types_of(field)?;
    let type_mismatch = |value: &Value| {
        IngestError::InvalidRow(format!(
            "value {value:?} cannot be stored in column {} with logical type {} and physical type {}",
            field.name(),
            logical.as_str(),
            physical.as_str()
        ))
    };
    let wrong_vector = |vector: &ColumnVector| {
        IngestError::Internal(format!(
            "unexpected {} vector for column {}, logical type: {}, physical type: {}",
            vector.kind(),
            field.name(),
            logical.as_str(),
            physical.as_str()
        ))
    };
    let unknown_pair = || IngestError::UnknownDataType {
        logical: logical.as_str().to_string(),
        physical: physical.as_str().to_string(),
    };

    match logical {
        L::Fixed => {
            let scale = column_scale(field)?;
            match physical {
                P::Sb1 if scale == 0 => {
                    if !matches!(vector, ColumnVector::TinyInt(_)) {
                        return Err(wrong_vector(vector));
                    }
                    let Value::Int(v) = value else {
                        return Err(type_mismatch(value));
                    };
                    let v = i8::try_from(*v).map_err(|_| {
                        IngestError::InvalidRow(format!(
                            "value {v} out of range for physical type SB1"
                        ))
                    })?;
                    *row_size += 1.0;
                    Ok(EncodedCell::TinyInt(v))
                }
                P::Sb2 if scale == 0 => {
                    if !matches!(vector, ColumnVector::SmallInt(_)) {
                        return Err(wrong_vector(vector));
                    }
                    let Value::Int(v) = value else {
                        return Err(type_mismatch(value));
                    };
                    let v = i16::try_from(*v).map_err(|_| {
                        IngestError::InvalidRow(format!(
                            "value {v} out of range for physical type SB2"
                        ))
                    })?;
                    *row_size += 2.0;
                    Ok(EncodedCell::SmallInt(v))
                }
                P::Sb4 if scale == 0 => {
                    if !matches!(vector, ColumnVector::Int(_)) {
                        return Err(wrong_vector(vector));
                    }
                    let Value::Int(v) = value else {
                        return Err(type_mismatch(value));
                    };
                    let v = i32::try_from(*v).map_err(|_| {
                        IngestError::InvalidRow(format!(
                            "value {v} out of range for physical type SB4"
                        ))
                    })?;
                    *row_size += 4.0;
                    Ok(EncodedCell::Int {
                        value: v,
                        stat: BigInt::from(v),
                    })
                }
                P::Sb8 if scale == 0 => {
                    if !matches!(vector, ColumnVector::BigInt(_)) {
                        return Err(wrong_vector(vector));
                    }
                    let Value::Int(v) = value else {
                        return Err(type_mismatch(value));
                    };
                    *row_size += 8.0;
                    Ok(EncodedCell::BigInt {
                        value: *v,
                        stat: BigInt::from(*v),
                    })
                }
                P::Sb1 | P::Sb2 | P::Sb4 | P::Sb8 | P::Sb16 => {
                    if !matches!(vector, ColumnVector::Decimal(_)) {
                        return Err(wrong_vector(vector));
                    }
                    let precision = column_precision(field)?;
                    let text = value.as_string();
                    let decimal = parse_decimal(&text)?;
                    let unscaled = decimal.rescale(scale).ok_or_else(|| {
                        IngestError::InvalidRow(format!(
                            "value '{text}' has more fractional digits than column scale {scale}"
                        ))
                    })?;
                    let unscaled = unscaled.to_i128().ok_or_else(|| {
                        IngestError::InvalidRow(format!(
                            "value '{text}' does not fit precision {precision} and scale {scale}"
                        ))
                    })?;
                    if !is_validate_decimal_precision(unscaled, precision as u8) {
                        return Err(IngestError::InvalidRow(format!(
                            "value '{text}' does not fit precision {precision} and scale {scale}"
                        )));
                    }
                    *row_size += 16.0;
                    Ok(EncodedCell::Decimal {
                        unscaled,
                        integer_part: decimal.to_big_int(),
                    })
                }
                _ => Err(unknown_pair()),
            }
        }
        L::Any | L::Array | L::Char | L::Text | L::Object | L::Variant => {
            if !matches!(vector, ColumnVector::VarChar(_)) {
                return Err(wrong_vector(vector));
            }
            let text = value.as_string();
            *row_size += text.len() as f32;
            Ok(EncodedCell::VarChar(text))
        }
        L::TimestampLtz | L::TimestampNtz => {
            let scale = column_scale(field)?;
            match physical {
                P::Sb8 => {
                    if !matches!(vector, ColumnVector::BigInt(_)) {
                        return Err(wrong_vector(vector));
                    }
                    let time = parse_decimal(&value.as_string())?.time_in_scale(scale);
                    *row_size += 8.0;
                    Ok(EncodedCell::BigInt {
                        value: low_i64(&time),
                        stat: time,
                    })
                }
                P::Sb16 => {
                    if !matches!(vector, ColumnVector::EpochStruct(_)) {
                        return Err(wrong_vector(vector));
                    }
                    if scale > 9 {
                        return Err(IngestError::InvalidRow(format!(
                            "invalid timestamp scale {scale}"
                        )));
                    }
                    let text = value.as_string();
                    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
                    let epoch: i64 = whole.parse()?;
                    // Fraction is stored in nanoseconds, but the server
                    // rejects accuracy beyond the column scale.
                    let fraction: i32 = if frac.is_empty() {
                        0
                    } else {
                        let digits: i32 = frac.parse()?;
                        if frac.len() < 9 {
                            digits * 10_i32.pow(9 - frac.len() as u32)
                        } else {
                            digits
                        }
                    };
                    if fraction % 10_i32.pow(9 - scale) != 0 {
                        return Err(IngestError::InvalidRow(
                            "row specifies accuracy greater than column scale".to_string(),
                        ));
                    }
                    *row_size += 0.25; // null bits of the two children
                    *row_size += 12.0;
                    Ok(EncodedCell::Epoch {
                        epoch,
                        fraction,
                        stat: parse_decimal(&text)?.time_in_scale(scale),
                    })
                }
                _ => Err(unknown_pair()),
            }
        }
        L::Date => {
            if !matches!(vector, ColumnVector::DateDay(_)) {
                return Err(wrong_vector(vector));
            }
            // Days past the Unix epoch, in string form.
            let Value::Text(text) = value else {
                return Err(type_mismatch(value));
            };
            let days: i32 = text.parse()?;
            *row_size += 4.0;
            Ok(EncodedCell::DateDay(days))
        }
        L::Time => {
            let scale = column_scale(field)?;
            let time = parse_decimal(&value.as_string())?.time_in_scale(scale);
            match physical {
                P::Sb4 => {
                    if !matches!(vector, ColumnVector::Int(_)) {
                        return Err(wrong_vector(vector));
                    }
                    *row_size += 4.0;
                    Ok(EncodedCell::Int {
                        value: low_i32(&time),
                        stat: time,
                    })
                }
                P::Sb8 => {
                    if !matches!(vector, ColumnVector::BigInt(_)) {
                        return Err(wrong_vector(vector));
                    }
                    *row_size += 8.0;
                    Ok(EncodedCell::BigInt {
                        value: low_i64(&time),
                        stat: time,
                    })
                }
                _ => Err(unknown_pair()),
            }
        }
        L::Boolean => {
            if !matches!(vector, ColumnVector::Bit(_)) {
                return Err(wrong_vector(vector));
            }
            let bit = match value {
                Value::Boolean(v) => *v,
                Value::Int(v) => *v > 0,
                Value::Real(v) => *v > 0.0,
                Value::Text(text) => string_to_boolean(text),
                Value::Binary(_) | Value::Null => return Err(type_mismatch(value)),
            };
            *row_size += 0.125;
            Ok(EncodedCell::Bit(bit))
        }
        L::Binary => {
            if !matches!(vector, ColumnVector::VarBinary(_)) {
                return Err(wrong_vector(vector));
            }
            let bytes = match value {
                Value::Binary(bytes) => bytes.clone(),
                Value::Text(text) => parse_hex_binary(text)?,
                _ => return Err(type_mismatch(value)),
            };
            *row_size += bytes.len() as f32;
            Ok(EncodedCell::VarBinary(bytes))
        }
        L::Real => {
            if !matches!(vector, ColumnVector::Float8(_)) {
                return Err(wrong_vector(vector));
            }
            let real = match value {
                Value::Real(v) => *v,
                Value::Text(text) => text.trim().parse()?,
                _ => return Err(type_mismatch(value)),
            };
            *row_size += 8.0;
            Ok(EncodedCell::Float8(real))
        }
        _ => Err(unknown_pair()),
    }
}

/// Appends a coerced cell to its vector and folds it into the column stats.
pub(crate) fn append_cell(
    vector: &mut ColumnVector,
    stats: &mut RowBufferStats,
    cell: EncodedCell,
) -> IngestResult<()> {
    match (vector, cell) {
        (vector, EncodedCell::Null) => {
            vector.append_null();
            stats.inc_current_null_count();
        }
        (ColumnVector::TinyInt(b), EncodedCell::TinyInt(v)) => {
            b.append_value(v);
            stats.add_int_value(&BigInt::from(v));
        }
        (ColumnVector::SmallInt(b), EncodedCell::SmallInt(v)) => {
            b.append_value(v);
            stats.add_int_value(&BigInt::from(v));
        }
        (ColumnVector::Int(b), EncodedCell::Int { value, stat }) => {
            b.append_value(value);
            stats.add_int_value(&stat);
        }
        (ColumnVector::BigInt(b), EncodedCell::BigInt { value, stat }) => {
            b.append_value(value);
            stats.add_int_value(&stat);
        }
        (
            ColumnVector::Decimal(b),
            EncodedCell::Decimal {
                unscaled,
                integer_part,
            },
        ) => {
            b.append_value(unscaled);
            stats.add_int_value(&integer_part);
        }
        (ColumnVector::Float8(b), EncodedCell::Float8(v)) => {
            b.append_value(v);
            stats.add_real_value(v);
        }
        (ColumnVector::VarChar(b), EncodedCell::VarChar(text)) => {
            b.append_value(&text);
            stats.set_current_max_length(text.len() as i64);
            stats.add_str_value(&text);
        }
        (ColumnVector::VarBinary(b), EncodedCell::VarBinary(bytes)) => {
            b.append_value(&bytes);
            stats.set_current_max_length(bytes.len() as i64);
        }
        (ColumnVector::Bit(b), EncodedCell::Bit(v)) => {
            b.append_value(v);
            stats.add_int_value(&BigInt::from(v as i64));
        }
        (ColumnVector::DateDay(b), EncodedCell::DateDay(v)) => {
            b.append_value(v);
            stats.add_int_value(&BigInt::from(v));
        }
        (
            ColumnVector::EpochStruct(b),
            EncodedCell::Epoch {
                epoch,
                fraction,
                stat,
            },
        ) => {
            b.field_builder::<Int64Builder>(EPOCH_CHILD)
                .unwrap()
                .append_value(epoch);
            b.field_builder::<Int32Builder>(FRACTION_CHILD)
                .unwrap()
                .append_value(fraction);
            b.append(true);
            stats.add_int_value(&stat);
        }
        (vector, cell) => {
            return Err(IngestError::Internal(format!(
                "{} vector cannot accept a {} cell",
                vector.kind(),
                cell.kind()
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::schema::{build_field, ColumnMetadata};

    fn field_for(logical: &str, physical: &str, precision: Option<u32>, scale: Option<u32>) -> Field {
        build_field(&ColumnMetadata {
            name: "C".to_string(),
            nullable: true,
            logical_type: logical.to_string(),
            physical_type: physical.to_string(),
            precision,
            scale,
            byte_length: None,
            length: None,
        })
        .unwrap()
    }

    fn encode(field: &Field, value: Value) -> IngestResult<(EncodedCell, f32)> {
        let vector = ColumnVector::for_field(field).unwrap();
        let mut size = 0.0;
        encode_cell(field, &vector, &value, &mut size).map(|cell| (cell, size))
    }

    #[test]
    fn sb1_accepts_full_signed_byte_range() {
        let field = field_for("FIXED", "SB1", Some(3), Some(0));
        for v in [-128i64, 0, 127] {
            let (cell, size) = encode(&field, Value::Int(v)).unwrap();
            assert!(matches!(cell, EncodedCell::TinyInt(_)), "{v}");
            assert_eq!(size, 1.0);
        }
        for v in [-129i64, 128] {
            let err = encode(&field, Value::Int(v)).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::InvalidRow, "{v}");
        }
    }

    #[test]
    fn fixed_requires_an_integer_value() {
        let field = field_for("FIXED", "SB4", Some(9), Some(0));
        let err = encode(&field, Value::Text("12".to_string())).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidRow);
        assert!(err.to_string().contains("FIXED"));
        assert!(err.to_string().contains("SB4"));
    }

    #[test]
    fn decimal_cells_scale_and_validate_precision() {
        let field = field_for("FIXED", "SB4", Some(9), Some(2));
        let (cell, size) = encode(&field, Value::Text("12.34".to_string())).unwrap();
        let EncodedCell::Decimal {
            unscaled,
            integer_part,
        } = cell
        else {
            panic!("expected a decimal cell");
        };
        assert_eq!(unscaled, 1234);
        assert_eq!(integer_part, BigInt::from(12));
        assert_eq!(size, 16.0);

        // Too many fractional digits
        assert!(encode(&field, Value::Text("0.001".to_string())).is_err());
        // Exceeds precision 9 at scale 2
        assert!(encode(&field, Value::Text("123456789.00".to_string())).is_err());
    }

    #[test]
    fn timestamp_sb16_splits_epoch_and_fraction() {
        let field = field_for("TIMESTAMP_NTZ", "SB16", None, Some(6));
        let (cell, size) = encode(&field, Value::Text("1700000000.123456".to_string())).unwrap();
        let EncodedCell::Epoch {
            epoch,
            fraction,
            stat,
        } = cell
        else {
            panic!("expected an epoch cell");
        };
        assert_eq!(epoch, 1_700_000_000);
        assert_eq!(fraction, 123_456_000);
        assert_eq!(stat, BigInt::from(1_700_000_000_123_456i64));
        assert_eq!(size, 12.25);
    }

    #[test]
    fn timestamp_fraction_finer_than_scale_is_rejected() {
        let field = field_for("TIMESTAMP_NTZ", "SB16", None, Some(3));
        let err = encode(&field, Value::Text("1700000000.123456789".to_string())).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidRow);
        assert!(err.to_string().contains("accuracy greater than column scale"));

        let (cell, _) = encode(&field, Value::Text("1700000000.123000000".to_string())).unwrap();
        let EncodedCell::Epoch { fraction, .. } = cell else {
            panic!("expected an epoch cell");
        };
        assert_eq!(fraction, 123_000_000);
    }

    #[test]
    fn timestamp_sb8_uses_time_in_scale() {
        let field = field_for("TIMESTAMP_NTZ", "SB8", None, Some(3));
        let (cell, _) = encode(&field, Value::Text("1700000000.5".to_string())).unwrap();
        let EncodedCell::BigInt { value, stat } = cell else {
            panic!("expected a bigint cell");
        };
        assert_eq!(value, 1_700_000_000_500);
        assert_eq!(stat, BigInt::from(1_700_000_000_500i64));
    }

    #[test]
    fn date_requires_a_day_string() {
        let field = field_for("DATE", "SB4", None, None);
        let (cell, _) = encode(&field, Value::Text("-365".to_string())).unwrap();
        assert!(matches!(cell, EncodedCell::DateDay(-365)));

        assert!(encode(&field, Value::Int(10)).is_err());
        assert!(encode(&field, Value::Text("not-a-day".to_string())).is_err());
    }

    #[test]
    fn time_cells_encode_scaled_values() {
        let field = field_for("TIME", "SB4", None, Some(3));
        let (cell, _) = encode(&field, Value::Text("10.5".to_string())).unwrap();
        let EncodedCell::Int { value, .. } = cell else {
            panic!("expected an int cell");
        };
        assert_eq!(value, 10_500);

        let field = field_for("TIME", "SB8", None, Some(9));
        let (cell, _) = encode(&field, Value::Text("86399.123456789".to_string())).unwrap();
        let EncodedCell::BigInt { value, .. } = cell else {
            panic!("expected a bigint cell");
        };
        assert_eq!(value, 86_399_123_456_789);
    }

    #[test]
    fn boolean_coercion_table() {
        let field = field_for("BOOLEAN", "SB1", None, None);
        let cases = [
            (Value::Text("YES".to_string()), true),
            (Value::Text("no".to_string()), false),
            (Value::Real(0.0), false),
            (Value::Real(-1.5), false),
            (Value::Real(0.1), true),
            (Value::Int(0), false),
            (Value::Int(-7), false),
            (Value::Int(1), true),
            (Value::Boolean(true), true),
        ];
        for (value, expected) in cases {
            let (cell, size) = encode(&field, value.clone()).unwrap();
            assert!(
                matches!(cell, EncodedCell::Bit(v) if v == expected),
                "{value:?}"
            );
            assert_eq!(size, 0.125);
        }
        assert!(encode(&field, Value::Binary(vec![1])).is_err());
    }

    #[test]
    fn binary_accepts_bytes_or_hex() {
        let field = field_for("BINARY", "LOB", None, None);
        let (cell, size) = encode(&field, Value::Text("deadBEEF".to_string())).unwrap();
        assert!(matches!(cell, EncodedCell::VarBinary(ref b) if b == &[0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(size, 4.0);

        let (cell, _) = encode(&field, Value::Binary(vec![1, 2, 3])).unwrap();
        assert!(matches!(cell, EncodedCell::VarBinary(ref b) if b == &[1, 2, 3]));

        assert!(encode(&field, Value::Text("abc".to_string())).is_err());
        assert!(encode(&field, Value::Int(5)).is_err());
    }

    #[test]
    fn real_accepts_floats_and_strings_only() {
        let field = field_for("REAL", "DOUBLE", None, None);
        let (cell, size) = encode(&field, Value::Real(2.5)).unwrap();
        assert!(matches!(cell, EncodedCell::Float8(v) if v == 2.5));
        assert_eq!(size, 8.0);

        let (cell, _) = encode(&field, Value::Text(" -1.25 ".to_string())).unwrap();
        assert!(matches!(cell, EncodedCell::Float8(v) if v == -1.25));

        assert!(encode(&field, Value::Int(3)).is_err());
    }

    #[test]
    fn text_family_stringifies_any_value() {
        let field = field_for("VARIANT", "LOB", None, None);
        let (cell, size) = encode(&field, Value::Int(42)).unwrap();
        assert!(matches!(cell, EncodedCell::VarChar(ref s) if s == "42"));
        assert_eq!(size, 2.0);

        let (cell, size) = encode(&field, Value::Text("héllo".to_string())).unwrap();
        assert!(matches!(cell, EncodedCell::VarChar(ref s) if s == "héllo"));
        // Byte length, not character count.
        assert_eq!(size, 6.0);
    }

    #[test]
    fn mismatched_vector_kind_is_internal() {
        let text_field = field_for("TEXT", "LOB", None, None);
        let int_field = field_for("FIXED", "SB4", Some(9), Some(0));
        // Vector built for the wrong column.
        let vector = ColumnVector::for_field(&int_field).unwrap();
        let mut size = 0.0;
        let err = encode_cell(&text_field, &vector, &Value::Text("x".to_string()), &mut size)
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
    }

    #[test]
    fn append_cell_rejects_mismatched_cell() {
        let int_field = field_for("FIXED", "SB4", Some(9), Some(0));
        let mut vector = ColumnVector::for_field(&int_field).unwrap();
        let mut stats = RowBufferStats::new();
        let err = append_cell(&mut vector, &mut stats, EncodedCell::Float8(1.0)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
    }
}
