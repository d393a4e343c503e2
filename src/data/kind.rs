//! Column type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive storage kind of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    F32,
    U8,
    U16,
    U32,
    U64,
    I64,
    Bool,
}

impl DataKind {
    /// Short lowercase name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            DataKind::F32 => "f32",
            DataKind::U8 => "u8",
            DataKind::U16 => "u16",
            DataKind::U32 => "u32",
            DataKind::U64 => "u64",
            DataKind::I64 => "i64",
            DataKind::Bool => "bool",
        }
    }

    /// Largest representable value for unsigned kinds.
    #[inline]
    pub fn unsigned_max(self) -> Option<u64> {
        match self {
            DataKind::U8 => Some(u8::MAX as u64),
            DataKind::U16 => Some(u16::MAX as u64),
            DataKind::U32 => Some(u32::MAX as u64),
            DataKind::U64 => Some(u64::MAX),
            _ => None,
        }
    }

    #[inline]
    pub fn is_unsigned(self) -> bool {
        self.unsigned_max().is_some()
    }

    /// Kinds that may carry a key range.
    #[inline]
    pub fn can_be_key(self) -> bool {
        matches!(
            self,
            DataKind::U8 | DataKind::U16 | DataKind::U32 | DataKind::U64
        )
    }

    /// Kinds admissible as a multi-class label.
    #[inline]
    pub fn is_label_kind(self) -> bool {
        matches!(
            self,
            DataKind::F32 | DataKind::U8 | DataKind::U16 | DataKind::U32 | DataKind::Bool
        )
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Range of a key-typed column.
///
/// Keys are 1-based: raw value `0` means missing, raw value `k` in
/// `1..=count` is the `k - 1`-th category. A `count` of `None` means the
/// number of categories is not known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyRange {
    pub count: Option<u64>,
}

impl KeyRange {
    pub fn new(count: u64) -> Self {
        Self { count: Some(count) }
    }

    pub fn unknown() -> Self {
        Self { count: None }
    }

    /// Returns true if raw key `k` is a valid non-missing key in this range.
    #[inline]
    pub fn contains(&self, k: u64) -> bool {
        k >= 1 && self.count.map_or(true, |c| k <= c)
    }
}

/// Scalar column type: a storage kind, optionally interpreted as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarType {
    pub kind: DataKind,
    pub key: Option<KeyRange>,
}

impl ScalarType {
    #[inline]
    pub fn is_key(&self) -> bool {
        self.key.is_some()
    }
}

/// Type of a column.
///
/// Vector columns always hold `f32` items; `len == 0` means variable length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Scalar(ScalarType),
    Vector { len: usize },
}

impl ColumnType {
    pub fn scalar(kind: DataKind) -> Self {
        ColumnType::Scalar(ScalarType { kind, key: None })
    }

    pub fn key(kind: DataKind, range: KeyRange) -> Self {
        debug_assert!(kind.can_be_key(), "{kind} cannot be a key type");
        ColumnType::Scalar(ScalarType {
            kind,
            key: Some(range),
        })
    }

    pub fn f32() -> Self {
        Self::scalar(DataKind::F32)
    }

    pub fn u32() -> Self {
        Self::scalar(DataKind::U32)
    }

    pub fn bool() -> Self {
        Self::scalar(DataKind::Bool)
    }

    pub fn vector(len: usize) -> Self {
        ColumnType::Vector { len }
    }

    #[inline]
    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            ColumnType::Scalar(s) => Some(*s),
            ColumnType::Vector { .. } => None,
        }
    }

    #[inline]
    pub fn kind(&self) -> Option<DataKind> {
        self.as_scalar().map(|s| s.kind)
    }

    #[inline]
    pub fn is_key(&self) -> bool {
        self.as_scalar().is_some_and(|s| s.is_key())
    }

    #[inline]
    pub fn is_vector(&self) -> bool {
        matches!(self, ColumnType::Vector { .. })
    }

    /// Number of slots: 1 for scalars, the vector length otherwise.
    #[inline]
    pub fn value_count(&self) -> usize {
        match self {
            ColumnType::Scalar(_) => 1,
            ColumnType::Vector { len } => *len,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Scalar(ScalarType { kind, key: None }) => write!(f, "{kind}"),
            ColumnType::Scalar(ScalarType {
                kind,
                key: Some(KeyRange { count: Some(c) }),
            }) => write!(f, "key<{kind}, 1..={c}>"),
            ColumnType::Scalar(ScalarType {
                kind,
                key: Some(KeyRange { count: None }),
            }) => write!(f, "key<{kind}>"),
            ColumnType::Vector { len: 0 } => write!(f, "vec<f32>"),
            ColumnType::Vector { len } => write!(f, "vec<f32, {len}>"),
        }
    }
}
