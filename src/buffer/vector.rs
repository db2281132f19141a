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

//! Append-only columnar vectors backing the row buffer.

use std::sync::Arc;

use arrow::array::builder::{
    ArrayBuilder, BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder, Float64Builder,
    Int16Builder, Int32Builder, Int64Builder, Int8Builder, StringBuilder, StructBuilder,
};
use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, Field};

use crate::errors::{IngestError, IngestResult};

// Child positions inside the two-part timestamp struct.
pub(crate) const EPOCH_CHILD: usize = 0;
pub(crate) const FRACTION_CHILD: usize = 1;

/// One column's mutable storage. The variant is fixed at schema setup; the
/// encoder destructures it and treats any mismatch with the column's type
/// metadata as an internal error.
pub(crate) enum ColumnVector {
    TinyInt(Int8Builder),
    SmallInt(Int16Builder),
    Int(Int32Builder),
    BigInt(Int64Builder),
    Decimal(Decimal128Builder),
    Float8(Float64Builder),
    VarChar(StringBuilder),
    VarBinary(BinaryBuilder),
    Bit(BooleanBuilder),
    DateDay(Date32Builder),
    /// Struct of `epoch` seconds (i64) and `fraction` nanoseconds (i32).
    EpochStruct(StructBuilder),
}

impl ColumnVector {
    pub(crate) fn for_field(field: &Field) -> IngestResult<Self> {
        Ok(match field.data_type() {
            DataType::Int8 => Self::TinyInt(Int8Builder::new()),
            DataType::Int16 => Self::SmallInt(Int16Builder::new()),
            DataType::Int32 => Self::Int(Int32Builder::new()),
            DataType::Int64 => Self::BigInt(Int64Builder::new()),
            DataType::Decimal128(precision, scale) => Self::Decimal(
                Decimal128Builder::new()
                    .with_data_type(DataType::Decimal128(*precision, *scale)),
            ),
            DataType::Float64 => Self::Float8(Float64Builder::new()),
            DataType::Utf8 => Self::VarChar(StringBuilder::new()),
            DataType::Binary => Self::VarBinary(BinaryBuilder::new()),
            DataType::Boolean => Self::Bit(BooleanBuilder::new()),
            DataType::Date32 => Self::DateDay(Date32Builder::new()),
            DataType::Struct(fields) => {
                Self::EpochStruct(StructBuilder::from_fields(fields.clone(), 0))
            }
            other => {
                return Err(IngestError::Internal(format!(
                    "no column vector for arrow type {other:?} on column {}",
                    field.name()
                )))
            }
        })
    }

    /// Marks the next slot null. For the timestamp struct both children are
    /// nulled as well so every child stays aligned with the parent.
    pub(crate) fn append_null(&mut self) {
        match self {
            Self::TinyInt(b) => b.append_null(),
            Self::SmallInt(b) => b.append_null(),
            Self::Int(b) => b.append_null(),
            Self::BigInt(b) => b.append_null(),
            Self::Decimal(b) => b.append_null(),
            Self::Float8(b) => b.append_null(),
            Self::VarChar(b) => b.append_null(),
            Self::VarBinary(b) => b.append_null(),
            Self::Bit(b) => b.append_null(),
            Self::DateDay(b) => b.append_null(),
            Self::EpochStruct(b) => {
                b.field_builder::<Int64Builder>(EPOCH_CHILD)
                    .unwrap()
                    .append_null();
                b.field_builder::<Int32Builder>(FRACTION_CHILD)
                    .unwrap()
                    .append_null();
                b.append(false);
            }
        }
    }

    /// Number of slots appended so far (null or not).
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::TinyInt(b) => b.len(),
            Self::SmallInt(b) => b.len(),
            Self::Int(b) => b.len(),
            Self::BigInt(b) => b.len(),
            Self::Decimal(b) => b.len(),
            Self::Float8(b) => b.len(),
            Self::VarChar(b) => b.len(),
            Self::VarBinary(b) => b.len(),
            Self::Bit(b) => b.len(),
            Self::DateDay(b) => b.len(),
            Self::EpochStruct(b) => b.len(),
        }
    }

    /// Hands the accumulated values off as an immutable array, leaving this
    /// vector empty and ready for the next epoch.
    pub(crate) fn finish(&mut self) -> ArrayRef {
        match self {
            Self::TinyInt(b) => Arc::new(b.finish()),
            Self::SmallInt(b) => Arc::new(b.finish()),
            Self::Int(b) => Arc::new(b.finish()),
            Self::BigInt(b) => Arc::new(b.finish()),
            Self::Decimal(b) => Arc::new(b.finish()),
            Self::Float8(b) => Arc::new(b.finish()),
            Self::VarChar(b) => Arc::new(b.finish()),
            Self::VarBinary(b) => Arc::new(b.finish()),
            Self::Bit(b) => Arc::new(b.finish()),
            Self::DateDay(b) => Arc::new(b.finish()),
            Self::EpochStruct(b) => Arc::new(b.finish()),
        }
    }

    /// Drops any accumulated values without handing them off.
    pub(crate) fn clear(&mut self) {
        let _ = self.finish();
    }

    /// Vector kind for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::TinyInt(_) => "TinyInt",
            Self::SmallInt(_) => "SmallInt",
            Self::Int(_) => "Int",
            Self::BigInt(_) => "BigInt",
            Self::Decimal(_) => "Decimal",
            Self::Float8(_) => "Float8",
            Self::VarChar(_) => "VarChar",
            Self::VarBinary(_) => "VarBinary",
            Self::Bit(_) => "Bit",
            Self::DateDay(_) => "DateDay",
            Self::EpochStruct(_) => "EpochStruct",
        }
    }
}
