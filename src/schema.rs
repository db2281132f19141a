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

//! Server column metadata and its mapping onto Arrow fields.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields};
use serde::Deserialize;

use crate::errors::{IngestError, IngestResult};

// Metadata keys attached to each flushed vector so the server-side reader
// can decode it.
pub const COLUMN_LOGICAL_TYPE: &str = "logicalType";
pub const COLUMN_PHYSICAL_TYPE: &str = "physicalType";
pub const COLUMN_PRECISION: &str = "precision";
pub const COLUMN_SCALE: &str = "scale";
pub const COLUMN_BYTE_LENGTH: &str = "byteLength";
pub const COLUMN_CHAR_LENGTH: &str = "charLength";

// Child field names of the two-part timestamp struct.
pub const FIELD_EPOCH_IN_SECONDS: &str = "epoch";
pub const FIELD_FRACTION_IN_NANOSECONDS: &str = "fraction";

/// Column description from the channel-open response.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub nullable: bool,
    #[serde(rename = "logicalType")]
    pub logical_type: String,
    #[serde(rename = "physicalType")]
    pub physical_type: String,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(rename = "byteLength", default)]
    pub byte_length: Option<u32>,
    #[serde(rename = "length", default)]
    pub length: Option<u32>,
}

/// SQL-level column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLogicalType {
    Any,
    Boolean,
    Rowindex,
    Null,
    Real,
    Fixed,
    Text,
    Char,
    Binary,
    Date,
    Time,
    TimestampLtz,
    TimestampNtz,
    TimestampTz,
    Interval,
    Raw,
    Array,
    Object,
    Variant,
    Row,
    Sequence,
    Function,
    UserDefinedType,
}

impl ColumnLogicalType {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "ANY" => Self::Any,
            "BOOLEAN" => Self::Boolean,
            "ROWINDEX" => Self::Rowindex,
            "NULL" => Self::Null,
            "REAL" => Self::Real,
            "FIXED" => Self::Fixed,
            "TEXT" => Self::Text,
            "CHAR" => Self::Char,
            "BINARY" => Self::Binary,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP_LTZ" => Self::TimestampLtz,
            "TIMESTAMP_NTZ" => Self::TimestampNtz,
            "TIMESTAMP_TZ" => Self::TimestampTz,
            "INTERVAL" => Self::Interval,
            "RAW" => Self::Raw,
            "ARRAY" => Self::Array,
            "OBJECT" => Self::Object,
            "VARIANT" => Self::Variant,
            "ROW" => Self::Row,
            "SEQUENCE" => Self::Sequence,
            "FUNCTION" => Self::Function,
            "USER_DEFINED_TYPE" => Self::UserDefinedType,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Boolean => "BOOLEAN",
            Self::Rowindex => "ROWINDEX",
            Self::Null => "NULL",
            Self::Real => "REAL",
            Self::Fixed => "FIXED",
            Self::Text => "TEXT",
            Self::Char => "CHAR",
            Self::Binary => "BINARY",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::TimestampLtz => "TIMESTAMP_LTZ",
            Self::TimestampNtz => "TIMESTAMP_NTZ",
            Self::TimestampTz => "TIMESTAMP_TZ",
            Self::Interval => "INTERVAL",
            Self::Raw => "RAW",
            Self::Array => "ARRAY",
            Self::Object => "OBJECT",
            Self::Variant => "VARIANT",
            Self::Row => "ROW",
            Self::Sequence => "SEQUENCE",
            Self::Function => "FUNCTION",
            Self::UserDefinedType => "USER_DEFINED_TYPE",
        }
    }
}

/// Storage width/kind realizing a logical type. `SBn` is a signed n-byte
/// integer-like encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPhysicalType {
    Rowindex,
    Double,
    Sb1,
    Sb2,
    Sb4,
    Sb8,
    Sb16,
    Lob,
    Binary,
    Row,
}

impl ColumnPhysicalType {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "ROWINDEX" => Self::Rowindex,
            "DOUBLE" => Self::Double,
            "SB1" => Self::Sb1,
            "SB2" => Self::Sb2,
            "SB4" => Self::Sb4,
            "SB8" => Self::Sb8,
            "SB16" => Self::Sb16,
            "LOB" => Self::Lob,
            "BINARY" => Self::Binary,
            "ROW" => Self::Row,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rowindex => "ROWINDEX",
            Self::Double => "DOUBLE",
            Self::Sb1 => "SB1",
            Self::Sb2 => "SB2",
            Self::Sb4 => "SB4",
            Self::Sb8 => "SB8",
            Self::Sb16 => "SB16",
            Self::Lob => "LOB",
            Self::Binary => "BINARY",
            Self::Row => "ROW",
        }
    }
}

/// Case normalization for column identifiers: a double-quoted name keeps its
/// inner spelling verbatim, anything else is upper-cased.
pub(crate) fn normalize_column_name(name: &str) -> String {
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        name[1..name.len() - 1].to_string()
    } else {
        name.to_uppercase()
    }
}

fn unknown_type(column: &ColumnMetadata) -> IngestError {
    IngestError::UnknownDataType {
        logical: column.logical_type.clone(),
        physical: column.physical_type.clone(),
    }
}

/// Builds the Arrow field for a column, picking the vector encoding from the
/// (logical, physical) type pair and attaching the encoding metadata the
/// server-side reader needs. Pairs outside the supported matrix fail with
/// `UNKNOWN_DATA_TYPE`.
pub fn build_field(column: &ColumnMetadata) -> IngestResult<Field> {
    use ColumnLogicalType as L;
    use ColumnPhysicalType as P;

    let logical = ColumnLogicalType::parse(&column.logical_type).ok_or_else(|| unknown_type(column))?;
    let physical =
        ColumnPhysicalType::parse(&column.physical_type).ok_or_else(|| unknown_type(column))?;

    let mut metadata = HashMap::from([
        (COLUMN_LOGICAL_TYPE.to_string(), column.logical_type.clone()),
        (
            COLUMN_PHYSICAL_TYPE.to_string(),
            column.physical_type.clone(),
        ),
    ]);
    if let Some(precision) = column.precision {
        metadata.insert(COLUMN_PRECISION.to_string(), precision.to_string());
    }
    if let Some(scale) = column.scale {
        metadata.insert(COLUMN_SCALE.to_string(), scale.to_string());
    }
    if let Some(byte_length) = column.byte_length {
        metadata.insert(COLUMN_BYTE_LENGTH.to_string(), byte_length.to_string());
    }
    if let Some(length) = column.length {
        metadata.insert(COLUMN_CHAR_LENGTH.to_string(), length.to_string());
    }

    let scale = column.scale.unwrap_or(0);
    let decimal_type = |column: &ColumnMetadata| -> IngestResult<DataType> {
        let precision = column.precision.ok_or_else(|| unknown_type(column))?;
        if precision == 0 || precision > 38 || scale > precision {
            return Err(unknown_type(column));
        }
        Ok(DataType::Decimal128(precision as u8, scale as i8))
    };

    let data_type = match logical {
        L::Fixed => match physical {
            P::Sb1 if scale == 0 => DataType::Int8,
            P::Sb2 if scale == 0 => DataType::Int16,
            P::Sb4 if scale == 0 => DataType::Int32,
            P::Sb8 if scale == 0 => DataType::Int64,
            P::Sb1 | P::Sb2 | P::Sb4 | P::Sb8 | P::Sb16 => decimal_type(column)?,
            _ => return Err(unknown_type(column)),
        },
        L::Any | L::Array | L::Char | L::Text | L::Object | L::Variant => DataType::Utf8,
        L::TimestampLtz | L::TimestampNtz => match physical {
            P::Sb8 => DataType::Int64,
            P::Sb16 => {
                let epoch = Field::new(FIELD_EPOCH_IN_SECONDS, DataType::Int64, true)
                    .with_metadata(metadata.clone());
                let fraction = Field::new(FIELD_FRACTION_IN_NANOSECONDS, DataType::Int32, true)
                    .with_metadata(metadata.clone());
                DataType::Struct(Fields::from(vec![Arc::new(epoch), Arc::new(fraction)]))
            }
            _ => return Err(unknown_type(column)),
        },
        L::Date => DataType::Date32,
        L::Time => match physical {
            P::Sb4 => DataType::Int32,
            P::Sb8 => DataType::Int64,
            _ => return Err(unknown_type(column)),
        },
        L::Boolean => DataType::Boolean,
        L::Binary => DataType::Binary,
        L::Real => DataType::Float64,
        _ => return Err(unknown_type(column)),
    };

    Ok(
        Field::new(normalize_column_name(&column.name), data_type, column.nullable)
            .with_metadata(metadata),
    )
}

/// Reads the (logical, physical) type pair back out of a materialized
/// field. Unparseable metadata means the vector cannot be decoded.
pub(crate) fn column_types_of(field: &Field) -> IngestResult<(ColumnLogicalType, ColumnPhysicalType)> {
    let logical = field
        .metadata()
        .get(COLUMN_LOGICAL_TYPE)
        .map(String::as_str)
        .unwrap_or_default();
    let physical = field
        .metadata()
        .get(COLUMN_PHYSICAL_TYPE)
        .map(String::as_str)
        .unwrap_or_default();
    match (
        ColumnLogicalType::parse(logical),
        ColumnPhysicalType::parse(physical),
    ) {
        (Some(logical), Some(physical)) => Ok((logical, physical)),
        _ => Err(IngestError::UnknownDataType {
            logical: logical.to_string(),
            physical: physical.to_string(),
        }),
    }
}

pub(crate) fn column_scale(field: &Field) -> IngestResult<u32> {
    match field.metadata().get(COLUMN_SCALE) {
        Some(scale) => scale.parse().map_err(|_| {
            IngestError::Internal(format!(
                "corrupted scale metadata '{scale}' on column {}",
                field.name()
            ))
        }),
        None => Ok(0),
    }
}

pub(crate) fn column_precision(field: &Field) -> IngestResult<u32> {
    match field.metadata().get(COLUMN_PRECISION) {
        Some(precision) => precision.parse().map_err(|_| {
            IngestError::Internal(format!(
                "corrupted precision metadata '{precision}' on column {}",
                field.name()
            ))
        }),
        None => Ok(38),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn column(name: &str, logical: &str, physical: &str) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            nullable: true,
            logical_type: logical.to_string(),
            physical_type: physical.to_string(),
            precision: None,
            scale: None,
            byte_length: None,
            length: None,
        }
    }

    #[test]
    fn fixed_types_map_to_integer_widths() {
        for (physical, expected) in [
            ("SB1", DataType::Int8),
            ("SB2", DataType::Int16),
            ("SB4", DataType::Int32),
            ("SB8", DataType::Int64),
        ] {
            let mut c = column("C", "FIXED", physical);
            c.scale = Some(0);
            c.precision = Some(18);
            assert_eq!(build_field(&c).unwrap().data_type(), &expected);
        }
    }

    #[test]
    fn fixed_with_scale_maps_to_decimal() {
        let mut c = column("PRICE", "FIXED", "SB4");
        c.precision = Some(9);
        c.scale = Some(2);
        let field = build_field(&c).unwrap();
        assert_eq!(field.data_type(), &DataType::Decimal128(9, 2));
        assert_eq!(field.metadata()[COLUMN_SCALE], "2");
        assert_eq!(field.metadata()[COLUMN_PRECISION], "9");

        let mut c = column("BIG", "FIXED", "SB16");
        c.precision = Some(38);
        c.scale = Some(0);
        assert_eq!(
            build_field(&c).unwrap().data_type(),
            &DataType::Decimal128(38, 0)
        );
    }

    #[test]
    fn text_family_maps_to_utf8() {
        for logical in ["ANY", "ARRAY", "CHAR", "TEXT", "OBJECT", "VARIANT"] {
            let field = build_field(&column("C", logical, "LOB")).unwrap();
            assert_eq!(field.data_type(), &DataType::Utf8);
        }
    }

    #[test]
    fn timestamp_sb16_is_epoch_fraction_struct() {
        let mut c = column("TS", "TIMESTAMP_NTZ", "SB16");
        c.scale = Some(6);
        let field = build_field(&c).unwrap();
        let DataType::Struct(children) = field.data_type() else {
            panic!("expected a struct, got {:?}", field.data_type());
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name(), FIELD_EPOCH_IN_SECONDS);
        assert_eq!(children[0].data_type(), &DataType::Int64);
        assert_eq!(children[1].name(), FIELD_FRACTION_IN_NANOSECONDS);
        assert_eq!(children[1].data_type(), &DataType::Int32);
        assert_eq!(children[0].metadata()[COLUMN_SCALE], "6");
    }

    #[test]
    fn remaining_scalar_mappings() {
        assert_eq!(
            build_field(&column("D", "DATE", "SB4")).unwrap().data_type(),
            &DataType::Date32
        );
        assert_eq!(
            build_field(&column("T4", "TIME", "SB4")).unwrap().data_type(),
            &DataType::Int32
        );
        assert_eq!(
            build_field(&column("T8", "TIME", "SB8")).unwrap().data_type(),
            &DataType::Int64
        );
        assert_eq!(
            build_field(&column("B", "BOOLEAN", "SB1")).unwrap().data_type(),
            &DataType::Boolean
        );
        assert_eq!(
            build_field(&column("BIN", "BINARY", "LOB"))
                .unwrap()
                .data_type(),
            &DataType::Binary
        );
        assert_eq!(
            build_field(&column("R", "REAL", "DOUBLE"))
                .unwrap()
                .data_type(),
            &DataType::Float64
        );
        assert_eq!(
            build_field(&column("TS8", "TIMESTAMP_LTZ", "SB8"))
                .unwrap()
                .data_type(),
            &DataType::Int64
        );
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        for (logical, physical) in [
            ("TIMESTAMP_TZ", "SB16"),
            ("TIME", "SB16"),
            ("FIXED", "LOB"),
            ("INTERVAL", "SB8"),
            ("ROWINDEX", "ROWINDEX"),
            ("NOT_A_TYPE", "SB4"),
            ("FIXED", "NOT_A_TYPE"),
        ] {
            let err = build_field(&column("C", logical, physical)).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::UnknownDataType, "{logical}/{physical}");
        }
    }

    #[test]
    fn decimal_requires_sane_precision() {
        let mut c = column("C", "FIXED", "SB16");
        assert!(build_field(&c).is_err());
        c.precision = Some(39);
        assert!(build_field(&c).is_err());
        c.precision = Some(9);
        c.scale = Some(10);
        assert!(build_field(&c).is_err());
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_column_name("foo"), "FOO");
        assert_eq!(normalize_column_name("\"foo\""), "foo");
        assert_eq!(normalize_column_name("\"Mixed Case\""), "Mixed Case");
        assert_eq!(normalize_column_name("\""), "\"");
        assert_eq!(normalize_column_name("\"\""), "");
    }

    #[test]
    fn metadata_round_trip() {
        let mut c = column("\"ts\"", "TIMESTAMP_NTZ", "SB8");
        c.scale = Some(3);
        let field = build_field(&c).unwrap();
        assert_eq!(field.name(), "ts");
        let (logical, physical) = column_types_of(&field).unwrap();
        assert_eq!(logical, ColumnLogicalType::TimestampNtz);
        assert_eq!(physical, ColumnPhysicalType::Sb8);
        assert_eq!(column_scale(&field).unwrap(), 3);
    }

    #[test]
    fn corrupted_metadata_is_unknown_data_type() {
        let field = Field::new("C", DataType::Int8, true);
        let err = column_types_of(&field).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UnknownDataType);
    }

    #[test]
    fn column_metadata_deserializes_wire_names() {
        let json = r#"{
            "name": "PRICE",
            "nullable": false,
            "logicalType": "FIXED",
            "physicalType": "SB4",
            "precision": 9,
            "scale": 2,
            "byteLength": 16,
            "length": 8
        }"#;
        let c: ColumnMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(c.name, "PRICE");
        assert!(!c.nullable);
        assert_eq!(c.logical_type, "FIXED");
        assert_eq!(c.physical_type, "SB4");
        assert_eq!(c.precision, Some(9));
        assert_eq!(c.scale, Some(2));
        assert_eq!(c.byte_length, Some(16));
        assert_eq!(c.length, Some(8));
    }
}
