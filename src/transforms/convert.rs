//! Column type conversion.
//!
//! [`Conversion::resolve`] picks a conversion from a closed table:
//!
//! | From                    | To               | Rule                                   |
//! |-------------------------|------------------|----------------------------------------|
//! | any                     | same kind + range| identity                               |
//! | unsigned                | unsigned         | `v + plus`, checked against the range  |
//! | `i64`                   | `u32` / `u64`    | range check, then `v + plus`           |
//! | key                     | `f32`            | `0 → NaN`, `k → k - 1`                 |
//! | unsigned / bool         | `f32`            | plain cast                             |
//! | `f32`                   | key              | `NaN → 0`, integral `v → v + 1`        |
//!
//! `plus` is `dst_is_key - src_is_key`: keys are 1-based, so converting a raw
//! integer to a key adds one and converting a key to a raw integer subtracts one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ColumnDeriver, DerivedView};
use crate::data::{Column, ColumnType, DataKind, DataView, RowCursor, Scalar, ScalarType, Value};
use crate::error::{ConfigError, DataError, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Identity,
    Integer { plus: i64 },
    KeyToFloat,
    ToFloat,
    FloatToKey,
}

/// A resolved scalar conversion between two column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    src: ColumnType,
    dst: ColumnType,
    op: Op,
}

impl Conversion {
    /// Look up the conversion from `src` to `dst`.
    pub fn resolve(
        src: ColumnType,
        dst: ColumnType,
    ) -> std::result::Result<Self, ConfigError> {
        let unsupported = || ConfigError::UnsupportedConversion { from: src, to: dst };
        let (s, d) = match (src.as_scalar(), dst.as_scalar()) {
            (Some(s), Some(d)) => (s, d),
            _ if src == dst => {
                return Ok(Self {
                    src,
                    dst,
                    op: Op::Identity,
                })
            }
            _ => return Err(unsupported()),
        };

        let op = match (s.kind, d.kind) {
            (a, b) if a == b && s.key == d.key => Op::Identity,
            (a, b) if a.is_unsigned() && b.is_unsigned() => Op::Integer {
                plus: i64::from(d.is_key()) - i64::from(s.is_key()),
            },
            (DataKind::I64, DataKind::U32 | DataKind::U64) => Op::Integer {
                plus: i64::from(d.is_key()) - i64::from(s.is_key()),
            },
            (a, DataKind::F32) if s.is_key() && a.is_unsigned() => Op::KeyToFloat,
            (a, DataKind::F32) if a.is_unsigned() || a == DataKind::Bool => Op::ToFloat,
            (DataKind::F32, b) if d.is_key() && b.is_unsigned() => Op::FloatToKey,
            _ => return Err(unsupported()),
        };
        Ok(Self { src, dst, op })
    }

    #[inline]
    pub fn source_type(&self) -> ColumnType {
        self.src
    }

    #[inline]
    pub fn target_type(&self) -> ColumnType {
        self.dst
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.op == Op::Identity
    }

    /// Convert one value.
    ///
    /// Fails with [`Error::Overflow`] when the value does not fit the
    /// destination type or key range.
    pub fn apply(&self, value: Scalar) -> Result<Scalar> {
        let (Some(s), Some(d)) = (self.src.as_scalar(), self.dst.as_scalar()) else {
            return Ok(value);
        };
        if value.kind() != s.kind {
            return Err(DataError::UnexpectedKind {
                expected: s.kind,
                actual: value.kind(),
            }
            .into());
        }

        match self.op {
            Op::Identity => Ok(value),
            Op::Integer { plus } => {
                let v: i128 = match value {
                    Scalar::I64(v) => {
                        let v = i128::from(v);
                        let max = match d.kind {
                            DataKind::U32 => i128::from(u32::MAX) - 1,
                            _ => i128::from(u64::MAX),
                        };
                        if v < 0 || v > max {
                            return Err(self.overflow(value));
                        }
                        v
                    }
                    other => other.as_u64().map(i128::from).ok_or_else(|| self.overflow(other))?,
                };
                let out = u64::try_from(v + i128::from(plus)).map_err(|_| self.overflow(value))?;
                self.fit(d, out).ok_or_else(|| self.overflow(value))
            }
            Op::KeyToFloat => {
                let k = value.as_u64().ok_or_else(|| self.overflow(value))?;
                Ok(Scalar::F32(if k == 0 { f32::NAN } else { (k - 1) as f32 }))
            }
            Op::ToFloat => Ok(Scalar::F32(value.as_f32())),
            Op::FloatToKey => {
                let v = value.as_f32();
                if v.is_nan() {
                    return Scalar::unsigned(d.kind, 0).ok_or_else(|| self.overflow(value));
                }
                if !(v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f32) {
                    return Err(self.overflow(value));
                }
                self.fit(d, v as u64 + 1).ok_or_else(|| self.overflow(value))
            }
        }
    }

    /// `raw` as a scalar of `d`, checked against the key range when `d` is a key.
    fn fit(&self, d: ScalarType, raw: u64) -> Option<Scalar> {
        if let Some(range) = d.key {
            if raw != 0 && !range.contains(raw) {
                return None;
            }
        }
        Scalar::unsigned(d.kind, raw)
    }

    fn overflow(&self, value: Scalar) -> Error {
        let shown = match value {
            Scalar::F32(v) => v.to_string(),
            Scalar::U8(v) => v.to_string(),
            Scalar::U16(v) => v.to_string(),
            Scalar::U32(v) => v.to_string(),
            Scalar::U64(v) => v.to_string(),
            Scalar::I64(v) => v.to_string(),
            Scalar::Bool(v) => v.to_string(),
        };
        Error::Overflow {
            value: shown,
            target: self.dst,
        }
    }
}

// =============================================================================
// ConvertTransform
// =============================================================================

/// One converted column: `name` is `source` converted to `ty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertColumn {
    pub name: String,
    pub source: String,
    pub ty: ColumnType,
}

impl ConvertColumn {
    pub fn new(name: impl Into<String>, source: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ty,
        }
    }

    /// Convert `name` in place.
    pub fn in_place(name: impl Into<String>, ty: ColumnType) -> Self {
        let name = name.into();
        Self::new(name.clone(), name, ty)
    }
}

/// Resolved conversions of a [`ConvertTransform`].
#[derive(Debug, Clone)]
pub struct ConvertColumns {
    columns: Vec<ConvertColumn>,
    resolved: Vec<(usize, Conversion)>,
}

impl ConvertColumns {
    pub fn columns(&self) -> &[ConvertColumn] {
        &self.columns
    }
}

impl ColumnDeriver for ConvertColumns {
    fn inputs(&self, k: usize) -> Vec<usize> {
        vec![self.resolved[k].0]
    }

    fn derive(&self, k: usize, input: &dyn RowCursor) -> Result<Value> {
        let (col, conversion) = &self.resolved[k];
        if conversion.is_identity() {
            return input.value(*col);
        }
        Ok(conversion.apply(input.scalar(*col)?)?.into())
    }
}

/// Converts columns of a view to other types.
pub type ConvertTransform = DerivedView<ConvertColumns>;

impl DerivedView<ConvertColumns> {
    /// Resolve every conversion against the source schema.
    pub fn new(source: Arc<dyn DataView>, columns: Vec<ConvertColumn>) -> Result<Self> {
        let mut resolved = Vec::with_capacity(columns.len());
        let mut derived = Vec::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(ConfigError::EmptyColumnName.into());
            }
            let col = source.schema().require(&column.source)?;
            let src = source
                .schema()
                .column_type(col)
                .ok_or(DataError::ColumnOutOfRange(col))?;
            resolved.push((col, Conversion::resolve(src, column.ty)?));
            derived.push(Column::new(column.name.clone(), column.ty));
        }
        tracing::debug!(n_columns = columns.len(), "convert transform");
        Ok(Self::from_parts(
            source,
            derived,
            ConvertColumns { columns, resolved },
        ))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::data::{ActiveColumns, InMemoryView, KeyRange};

    fn key_u32(n: u64) -> ColumnType {
        ColumnType::key(DataKind::U32, KeyRange::new(n))
    }

    #[rstest]
    #[case(Scalar::U32(0), None)]
    #[case(Scalar::U32(1), Some(0.0))]
    #[case(Scalar::U32(3), Some(2.0))]
    fn test_key_to_float(#[case] input: Scalar, #[case] expected: Option<f32>) {
        let c = Conversion::resolve(key_u32(4), ColumnType::f32()).unwrap();
        let Scalar::F32(out) = c.apply(input).unwrap() else {
            panic!("expected f32");
        };
        match expected {
            None => assert!(out.is_nan()),
            Some(v) => assert_eq!(out, v),
        }
    }

    #[rstest]
    #[case(f32::NAN, 0)]
    #[case(0.0, 1)]
    #[case(3.0, 4)]
    fn test_float_to_key(#[case] input: f32, #[case] expected: u32) {
        let c = Conversion::resolve(ColumnType::f32(), key_u32(4)).unwrap();
        assert_eq!(c.apply(Scalar::F32(input)).unwrap(), Scalar::U32(expected));
    }

    #[rstest]
    #[case(4.0)]
    #[case(1.5)]
    #[case(-1.0)]
    fn test_float_to_key_overflow(#[case] input: f32) {
        let c = Conversion::resolve(ColumnType::f32(), key_u32(4)).unwrap();
        assert!(matches!(
            c.apply(Scalar::F32(input)),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn test_u32_key_offsets() {
        let to_key = Conversion::resolve(ColumnType::u32(), key_u32(10)).unwrap();
        assert_eq!(to_key.apply(Scalar::U32(2)).unwrap(), Scalar::U32(3));
        let from_key = Conversion::resolve(key_u32(10), ColumnType::u32()).unwrap();
        assert_eq!(from_key.apply(Scalar::U32(3)).unwrap(), Scalar::U32(2));
        assert!(from_key.apply(Scalar::U32(0)).is_err());
    }

    #[rstest]
    #[case(-1, false)]
    #[case(0, true)]
    #[case(u32::MAX as i64 - 1, true)]
    #[case(u32::MAX as i64, false)]
    fn test_i64_to_u32_range(#[case] v: i64, #[case] ok: bool) {
        let c = Conversion::resolve(ColumnType::scalar(DataKind::I64), ColumnType::u32()).unwrap();
        assert_eq!(c.apply(Scalar::I64(v)).is_ok(), ok);
    }

    #[test]
    fn test_i64_to_u64() {
        let c = Conversion::resolve(
            ColumnType::scalar(DataKind::I64),
            ColumnType::scalar(DataKind::U64),
        )
        .unwrap();
        assert_eq!(c.apply(Scalar::I64(7)).unwrap(), Scalar::U64(7));
        assert!(c.apply(Scalar::I64(-7)).is_err());
    }

    #[test]
    fn test_unsigned_narrowing_checked() {
        let c = Conversion::resolve(
            ColumnType::u32(),
            ColumnType::scalar(DataKind::U8),
        )
        .unwrap();
        assert_eq!(c.apply(Scalar::U32(200)).unwrap(), Scalar::U8(200));
        assert!(c.apply(Scalar::U32(300)).is_err());
    }

    #[test]
    fn test_key_range_narrowing_checked() {
        let c = Conversion::resolve(key_u32(10), key_u32(3)).unwrap();
        assert!(!c.is_identity());
        assert_eq!(c.apply(Scalar::U32(2)).unwrap(), Scalar::U32(2));
        assert_eq!(c.apply(Scalar::U32(0)).unwrap(), Scalar::U32(0));
        assert!(matches!(
            c.apply(Scalar::U32(7)),
            Err(Error::Overflow { .. })
        ));
        assert!(Conversion::resolve(key_u32(3), key_u32(3)).unwrap().is_identity());
    }

    #[test]
    fn test_bool_to_float() {
        let c = Conversion::resolve(ColumnType::bool(), ColumnType::f32()).unwrap();
        assert_eq!(c.apply(Scalar::Bool(true)).unwrap(), Scalar::F32(1.0));
    }

    #[rstest]
    #[case(ColumnType::f32(), ColumnType::bool())]
    #[case(ColumnType::vector(3), ColumnType::f32())]
    #[case(ColumnType::scalar(DataKind::I64), ColumnType::scalar(DataKind::U8))]
    fn test_unsupported(#[case] from: ColumnType, #[case] to: ColumnType) {
        assert!(matches!(
            Conversion::resolve(from, to),
            Err(ConfigError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let c = Conversion::resolve(key_u32(4), ColumnType::f32()).unwrap();
        assert!(c.apply(Scalar::F32(1.0)).unwrap_err().is_data());
    }

    #[test]
    fn test_transform_in_place_and_appended() {
        let view = InMemoryView::builder()
            .add_key_u32("Label", vec![1, 0, 3], KeyRange::new(3))
            .build()
            .unwrap();
        let view = ConvertTransform::new(
            Arc::new(view),
            vec![
                ConvertColumn::new("LabelF", "Label", ColumnType::f32()),
                ConvertColumn::in_place("Label", ColumnType::key(DataKind::U64, KeyRange::new(3))),
            ],
        )
        .unwrap();

        assert_eq!(view.schema().len(), 2);
        assert_eq!(view.schema().index_of("Label"), Some(0));
        assert_eq!(view.schema().index_of("LabelF"), Some(1));

        let mut cursor = view.cursor(&ActiveColumns::all(2)).unwrap();
        let mut floats = Vec::new();
        let mut raws = Vec::new();
        while cursor.move_next().unwrap() {
            floats.push(cursor.scalar(1).unwrap().as_f32());
            raws.push(cursor.scalar(0).unwrap());
        }
        assert_eq!(floats[0], 0.0);
        assert!(floats[1].is_nan());
        assert_eq!(floats[2], 2.0);
        assert_eq!(raws, vec![Scalar::U64(1), Scalar::U64(0), Scalar::U64(3)]);
    }
}
