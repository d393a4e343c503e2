//! Replication policy.
//!
//! Given the label histogram and the configured algorithm, the policy decides
//! for each base row which `(label, derived label)` copies the multiplied view
//! emits. The plan is recomputed per base row from a seeded generator owned by
//! the cursor.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::config::{validate_max_multi, MultiplicationAlgorithm};
use super::histogram::LabelHistogram;
use crate::data::{ColumnType, DataKind, LabelValue, RowId, Scalar};
use crate::error::{DataError, Result};

/// Hard cap on the number of copies of one base row.
pub const MAX_REPLICA_LIMIT: usize = 1000;

/// Relevance given to the true class under [`MultiplicationAlgorithm::Ranking`].
pub const RANK_RELEVANT: u32 = 4;

/// Stream offset between partition generators.
const PARTITION_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Value of the derived label column on one copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedLabel {
    /// Whether the copy carries the true class.
    Match(bool),
    /// Relevance of the copy, `4` for the true class and `0` otherwise.
    Rank(u32),
}

impl DerivedLabel {
    #[inline]
    pub fn to_scalar(self) -> Scalar {
        match self {
            DerivedLabel::Match(b) => Scalar::Bool(b),
            DerivedLabel::Rank(r) => Scalar::U32(r),
        }
    }

    /// Column type of the derived label for `algorithm`.
    pub fn column_type(algorithm: MultiplicationAlgorithm) -> ColumnType {
        match algorithm {
            MultiplicationAlgorithm::Ranking => ColumnType::scalar(DataKind::U32),
            _ => ColumnType::bool(),
        }
    }
}

/// One emitted copy of a base row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Replica {
    pub label: LabelValue,
    pub derived: DerivedLabel,
}

/// Replication rules fixed once the histogram is known.
#[derive(Debug, Clone)]
pub struct ReplicationPolicy {
    algorithm: MultiplicationAlgorithm,
    histogram: LabelHistogram,
    classes: Vec<LabelValue>,
    max_replica: usize,
    /// Reference frequency of [`MultiplicationAlgorithm::Reweight`].
    min_freq: f32,
    /// Bits reserved for the copy index in synthetic row ids.
    shift: u32,
}

impl ReplicationPolicy {
    /// Fix the replication rules.
    ///
    /// `max_replica = max(2, min(n_classes, floor(max_multi)))`.
    pub fn finalize(
        histogram: LabelHistogram,
        max_multi: f32,
        algorithm: MultiplicationAlgorithm,
    ) -> Result<Self> {
        validate_max_multi(max_multi)?;
        let classes = histogram.classes();
        let max_replica = classes.len().min(max_multi.floor() as usize).max(2);
        let min_freq = 1.0f32
            .max(histogram.min_freq())
            .max(histogram.max_freq() / max_replica as f32);
        let shift = usize::BITS - (max_replica + 1).leading_zeros();

        tracing::debug!(
            ?algorithm,
            classes = classes.len(),
            max_replica,
            min_freq,
            "replication policy finalized"
        );
        Ok(Self {
            algorithm,
            histogram,
            classes,
            max_replica,
            min_freq,
            shift,
        })
    }

    #[inline]
    pub fn algorithm(&self) -> MultiplicationAlgorithm {
        self.algorithm
    }

    #[inline]
    pub fn histogram(&self) -> &LabelHistogram {
        &self.histogram
    }

    /// Sorted class set.
    #[inline]
    pub fn classes(&self) -> &[LabelValue] {
        &self.classes
    }

    #[inline]
    pub fn max_replica(&self) -> usize {
        self.max_replica
    }

    #[inline]
    pub fn min_freq(&self) -> f32 {
        self.min_freq
    }

    #[inline]
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Identity of copy `copy` of base row `base`. High bits of `base` that
    /// do not fit after the shift are dropped.
    #[inline]
    pub fn row_id(&self, base: RowId, copy: usize) -> RowId {
        (base << self.shift) | copy as RowId
    }

    /// Length of one-hot label vectors: largest class index plus one.
    pub fn label_vector_len(&self) -> Result<usize> {
        let mut len = 0;
        for class in &self.classes {
            let index = class.class_index();
            if index < 0 {
                return Err(DataError::NegativeLabel(index).into());
            }
            len = len.max(index as usize + 1);
        }
        Ok(len)
    }

    /// Number of copies given to a label of accumulated weight `freq` under
    /// [`MultiplicationAlgorithm::Reweight`].
    pub fn reweight_count(&self, freq: f32) -> usize {
        let k = (self.max_replica as f32 * self.min_freq / freq + 0.0001).floor();
        if k.is_nan() || k <= 0.0 {
            0
        } else if k >= self.max_replica as f32 {
            self.max_replica
        } else {
            k as usize
        }
    }

    /// Fill `out` with the copies of a base row labeled `label`.
    pub fn plan<R: Rng>(
        &self,
        label: LabelValue,
        rng: &mut R,
        out: &mut Vec<Replica>,
    ) -> Result<()> {
        out.clear();
        match self.algorithm {
            MultiplicationAlgorithm::Default | MultiplicationAlgorithm::Ranking => {
                if self.classes.len() <= self.max_replica {
                    out.extend(self.classes.iter().map(|&c| self.replica(c, label)));
                } else {
                    self.sample(label, self.max_replica, rng, out);
                }
            }
            MultiplicationAlgorithm::Reweight => {
                let freq = self
                    .histogram
                    .get(&label)
                    .ok_or_else(|| DataError::UnknownLabel(label.to_string()))?;
                let k = self.reweight_count(freq);
                if k > 0 {
                    self.sample(label, k, rng, out);
                }
            }
        }
        Ok(())
    }

    /// `k` copies: a coin flip decides whether the first carries the true
    /// class, the rest are drawn uniformly with replacement.
    fn sample<R: Rng>(
        &self,
        label: LabelValue,
        k: usize,
        rng: &mut R,
        out: &mut Vec<Replica>,
    ) {
        let mut remaining = k;
        if rng.gen_bool(0.5) {
            out.push(self.replica(label, label));
            remaining -= 1;
        }
        for _ in 0..remaining {
            let class = self.classes[rng.gen_range(0..self.classes.len())];
            out.push(self.replica(class, label));
        }
    }

    #[inline]
    fn replica(&self, class: LabelValue, truth: LabelValue) -> Replica {
        let is_true = class == truth;
        let derived = match self.algorithm {
            MultiplicationAlgorithm::Ranking => {
                DerivedLabel::Rank(if is_true { RANK_RELEVANT } else { 0 })
            }
            _ => DerivedLabel::Match(is_true),
        };
        Replica {
            label: class,
            derived,
        }
    }
}

/// Generator of partition `partition` for a configured seed.
///
/// Partition `0` (and the single-cursor path) uses the seed as is.
pub(crate) fn partition_rng(seed: u64, partition: usize) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(
        seed.wrapping_add((partition as u64).wrapping_mul(PARTITION_STREAM)),
    )
}
