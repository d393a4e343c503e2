//! Multi-class label values.
//!
//! A label column holds one of five representations. [`LabelValue`] is the
//! closed set of those representations, with a total order so that labels can
//! key ordered maps and be sorted into a class set.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::kind::DataKind;
use super::value::Scalar;

/// One label value.
///
/// Integer representations are usually key encodings: `0` is missing and
/// `n + 1` is the `n`-th class. Floats use `NaN` for missing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LabelValue {
    Float(f32),
    U8(u8),
    U16(u16),
    U32(u32),
    Bool(bool),
}

impl LabelValue {
    /// Storage kind of this label.
    #[inline]
    pub fn kind(&self) -> DataKind {
        match self {
            LabelValue::Float(_) => DataKind::F32,
            LabelValue::U8(_) => DataKind::U8,
            LabelValue::U16(_) => DataKind::U16,
            LabelValue::U32(_) => DataKind::U32,
            LabelValue::Bool(_) => DataKind::Bool,
        }
    }

    /// Returns true if the label means "unlabeled".
    ///
    /// `NaN` is always missing. Integer zero is missing only under a key
    /// encoding.
    #[inline]
    pub fn is_missing(&self, is_key: bool) -> bool {
        match *self {
            LabelValue::Float(v) => v.is_nan(),
            LabelValue::U8(v) => is_key && v == 0,
            LabelValue::U16(v) => is_key && v == 0,
            LabelValue::U32(v) => is_key && v == 0,
            LabelValue::Bool(_) => false,
        }
    }

    /// Numeric value as `f32`, without any key adjustment.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match *self {
            LabelValue::Float(v) => v,
            LabelValue::U8(v) => v as f32,
            LabelValue::U16(v) => v as f32,
            LabelValue::U32(v) => v as f32,
            LabelValue::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Integer class index used by one-hot and float label outputs.
    ///
    /// Floats are truncated toward zero. The result may be negative; callers
    /// decide whether that is an error.
    #[inline]
    pub fn class_index(&self) -> i64 {
        match *self {
            LabelValue::Float(v) => v as i64,
            LabelValue::U8(v) => v as i64,
            LabelValue::U16(v) => v as i64,
            LabelValue::U32(v) => v as i64,
            LabelValue::Bool(v) => v as i64,
        }
    }

    /// Build a label of the given kind from its numeric value.
    ///
    /// Returns `None` when the value is not representable in `kind`.
    pub fn from_f32(kind: DataKind, value: f32) -> Option<Self> {
        let integral = value.is_finite() && value >= 0.0 && value.fract() == 0.0;
        match kind {
            DataKind::F32 => Some(LabelValue::Float(value)),
            DataKind::U8 if integral && value <= u8::MAX as f32 => {
                Some(LabelValue::U8(value as u8))
            }
            DataKind::U16 if integral && value <= u16::MAX as f32 => {
                Some(LabelValue::U16(value as u16))
            }
            DataKind::U32 if integral && value <= u32::MAX as f32 => {
                Some(LabelValue::U32(value as u32))
            }
            DataKind::Bool if value == 0.0 => Some(LabelValue::Bool(false)),
            DataKind::Bool if value == 1.0 => Some(LabelValue::Bool(true)),
            _ => None,
        }
    }

    /// Canonical bits used for equality and hashing.
    #[inline]
    fn bits(&self) -> u32 {
        match *self {
            LabelValue::Float(v) if v.is_nan() => f32::NAN.to_bits(),
            // -0.0 and 0.0 are the same class.
            LabelValue::Float(v) if v == 0.0 => 0,
            LabelValue::Float(v) => v.to_bits(),
            LabelValue::U8(v) => v as u32,
            LabelValue::U16(v) => v as u32,
            LabelValue::U32(v) => v,
            LabelValue::Bool(v) => v as u32,
        }
    }

    #[inline]
    fn rank(&self) -> u8 {
        match self {
            LabelValue::Float(_) => 0,
            LabelValue::U8(_) => 1,
            LabelValue::U16(_) => 2,
            LabelValue::U32(_) => 3,
            LabelValue::Bool(_) => 4,
        }
    }
}

impl PartialEq for LabelValue {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank() && self.bits() == other.bits()
    }
}

impl Eq for LabelValue {}

impl Hash for LabelValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        self.bits().hash(state);
    }
}

impl Ord for LabelValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            // NaN sorts last.
            (LabelValue::Float(a), LabelValue::Float(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            },
            (LabelValue::U8(a), LabelValue::U8(b)) => a.cmp(&b),
            (LabelValue::U16(a), LabelValue::U16(b)) => a.cmp(&b),
            (LabelValue::U32(a), LabelValue::U32(b)) => a.cmp(&b),
            (LabelValue::Bool(a), LabelValue::Bool(b)) => a.cmp(&b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for LabelValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Float(v) => write!(f, "{v}"),
            LabelValue::U8(v) => write!(f, "{v}"),
            LabelValue::U16(v) => write!(f, "{v}"),
            LabelValue::U32(v) => write!(f, "{v}"),
            LabelValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl TryFrom<Scalar> for LabelValue {
    type Error = DataKind;

    /// Fails with the scalar's kind when it is not a label representation.
    fn try_from(s: Scalar) -> Result<Self, Self::Error> {
        match s {
            Scalar::F32(v) => Ok(LabelValue::Float(v)),
            Scalar::U8(v) => Ok(LabelValue::U8(v)),
            Scalar::U16(v) => Ok(LabelValue::U16(v)),
            Scalar::U32(v) => Ok(LabelValue::U32(v)),
            Scalar::Bool(v) => Ok(LabelValue::Bool(v)),
            other => Err(other.kind()),
        }
    }
}

impl From<LabelValue> for Scalar {
    fn from(label: LabelValue) -> Self {
        match label {
            LabelValue::Float(v) => Scalar::F32(v),
            LabelValue::U8(v) => Scalar::U8(v),
            LabelValue::U16(v) => Scalar::U16(v),
            LabelValue::U32(v) => Scalar::U32(v),
            LabelValue::Bool(v) => Scalar::Bool(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use super::*;

    #[test]
    fn test_float_nan_equality() {
        assert_eq!(LabelValue::Float(f32::NAN), LabelValue::Float(-f32::NAN));
        assert_eq!(LabelValue::Float(0.0), LabelValue::Float(-0.0));
        assert_ne!(LabelValue::Float(1.0), LabelValue::U32(1));
    }

    #[test]
    fn test_ordering_within_kind() {
        let set: BTreeSet<_> = [3.0, 1.0, 2.0, 1.0]
            .into_iter()
            .map(LabelValue::Float)
            .collect();
        let sorted: Vec<f32> = set.iter().map(|l| l.as_f32()).collect();
        assert_eq!(sorted, vec![1.0, 2.0, 3.0]);

        assert!(LabelValue::Bool(false) < LabelValue::Bool(true));
        assert!(LabelValue::U16(2) < LabelValue::U16(10));
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        let set: HashSet<_> = [LabelValue::Float(0.0), LabelValue::Float(-0.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_missing() {
        assert!(LabelValue::Float(f32::NAN).is_missing(false));
        assert!(LabelValue::U32(0).is_missing(true));
        assert!(!LabelValue::U32(0).is_missing(false));
        assert!(!LabelValue::Bool(false).is_missing(true));
    }

    #[test]
    fn test_from_f32() {
        assert_eq!(
            LabelValue::from_f32(DataKind::U8, 3.0),
            Some(LabelValue::U8(3))
        );
        assert_eq!(LabelValue::from_f32(DataKind::U8, 300.0), None);
        assert_eq!(LabelValue::from_f32(DataKind::U32, 1.5), None);
        assert_eq!(
            LabelValue::from_f32(DataKind::Bool, 1.0),
            Some(LabelValue::Bool(true))
        );
        assert_eq!(LabelValue::from_f32(DataKind::I64, 1.0), None);
    }

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(
            LabelValue::try_from(Scalar::U16(4)),
            Ok(LabelValue::U16(4))
        );
        assert_eq!(LabelValue::try_from(Scalar::I64(4)), Err(DataKind::I64));
    }
}
