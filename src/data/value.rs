//! Cell values returned by cursors.

use super::kind::DataKind;
use super::vbuffer::VBuffer;

/// A scalar cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F32(f32),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    Bool(bool),
}

impl Scalar {
    #[inline]
    pub fn kind(&self) -> DataKind {
        match self {
            Scalar::F32(_) => DataKind::F32,
            Scalar::U8(_) => DataKind::U8,
            Scalar::U16(_) => DataKind::U16,
            Scalar::U32(_) => DataKind::U32,
            Scalar::U64(_) => DataKind::U64,
            Scalar::I64(_) => DataKind::I64,
            Scalar::Bool(_) => DataKind::Bool,
        }
    }

    /// Value of an unsigned scalar widened to `u64`.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Scalar::U8(v) => Some(v as u64),
            Scalar::U16(v) => Some(v as u64),
            Scalar::U32(v) => Some(v as u64),
            Scalar::U64(v) => Some(v),
            _ => None,
        }
    }

    /// Lossy numeric value, used for features and weights.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match *self {
            Scalar::F32(v) => v,
            Scalar::U8(v) => v as f32,
            Scalar::U16(v) => v as f32,
            Scalar::U32(v) => v as f32,
            Scalar::U64(v) => v as f32,
            Scalar::I64(v) => v as f32,
            Scalar::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Build an unsigned scalar of `kind` from a `u64`, if it fits.
    pub fn unsigned(kind: DataKind, v: u64) -> Option<Scalar> {
        match kind {
            DataKind::U8 => u8::try_from(v).ok().map(Scalar::U8),
            DataKind::U16 => u16::try_from(v).ok().map(Scalar::U16),
            DataKind::U32 => u32::try_from(v).ok().map(Scalar::U32),
            DataKind::U64 => Some(Scalar::U64(v)),
            _ => None,
        }
    }
}

/// A cell: either a scalar or an `f32` vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Vector(VBuffer),
}

impl Value {
    #[inline]
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Vector(_) => None,
        }
    }

    #[inline]
    pub fn as_vector(&self) -> Option<&VBuffer> {
        match self {
            Value::Vector(v) => Some(v),
            Value::Scalar(_) => None,
        }
    }

    #[inline]
    pub fn into_vector(self) -> Option<VBuffer> {
        match self {
            Value::Vector(v) => Some(v),
            Value::Scalar(_) => None,
        }
    }

    /// Name of the held representation, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.kind().name(),
            Value::Vector(_) => "vector",
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<VBuffer> for Value {
    fn from(v: VBuffer) -> Self {
        Value::Vector(v)
    }
}
