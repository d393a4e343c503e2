//! Label histogram.
//!
//! One pass over the label (and weight) column accumulates the weight of each
//! distinct label. The pass runs either on a single cursor or on a set of
//! partition cursors, one per worker, whose partial maps are merged at the end.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::data::{ActiveColumns, BoxedCursor, DataKind, DataView, LabelValue};
use crate::error::{ConfigError, DataError, Result};
use crate::utils::{resolve_threads, run_with_threads};

/// Accumulated weight per distinct label.
///
/// Labels are kept in their sorted order, which is also the class order of
/// the trained predictor. A parallel build sums floats in a different order
/// than a sequential one, so counts agree up to rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelHistogram {
    counts: BTreeMap<LabelValue, f32>,
    kind: DataKind,
    is_key: bool,
    n_rows: usize,
}

/// Partial counts of one partition.
#[derive(Debug, Default)]
struct Partial {
    counts: HashMap<LabelValue, f32>,
    n_rows: usize,
}

impl LabelHistogram {
    /// Scan `view` and count its labels.
    ///
    /// `n_threads` follows [`resolve_threads`]; the scan is partitioned only
    /// when at least two threads are requested and the view actually splits.
    ///
    /// # Errors
    ///
    /// - the label column is not a scalar label type
    /// - a row holds a label of another kind than the column declares
    /// - no row has a non-missing label
    pub fn build(
        view: &dyn DataView,
        label: usize,
        weight: Option<usize>,
        n_threads: Option<usize>,
    ) -> Result<Self> {
        let schema = view.schema();
        let ty = schema
            .column_type(label)
            .ok_or(DataError::ColumnOutOfRange(label))?;
        let kind = match ty.kind() {
            Some(kind) if kind.is_label_kind() => kind,
            _ => {
                let column = schema.column(label).map(|c| c.name.clone()).unwrap_or_default();
                return Err(ConfigError::UnsupportedLabelType { column, ty }.into());
            }
        };
        let is_key = ty.is_key();

        let active = ActiveColumns::from_indices(schema.len(), std::iter::once(label).chain(weight));
        let n = resolve_threads(n_threads);
        let cursors = if n >= 2 {
            view.cursor_set(&active, n)?
        } else {
            vec![view.cursor(&active)?]
        };
        let parallel = cursors.len() > 1;

        let scan = |cursor| scan_partition(cursor, label, weight, kind, is_key);
        let partials: Vec<Result<Partial>> = if parallel {
            run_with_threads(n, |par| par.maybe_par_map(cursors, scan))?
        } else {
            cursors.into_iter().map(scan).collect()
        };

        let mut merged = Partial::default();
        for partial in partials {
            let partial = partial?;
            merged.n_rows += partial.n_rows;
            for (label, w) in partial.counts {
                *merged.counts.entry(label).or_insert(0.0) += w;
            }
        }

        let histogram = Self::from_counts(kind, is_key, merged.counts)?.with_rows(merged.n_rows);
        tracing::debug!(
            classes = histogram.n_classes(),
            rows = histogram.n_rows,
            parallel,
            "label histogram built"
        );
        Ok(histogram)
    }

    /// Histogram from precomputed counts.
    pub fn from_counts(
        kind: DataKind,
        is_key: bool,
        counts: impl IntoIterator<Item = (LabelValue, f32)>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (label, w) in counts {
            if label.kind() != kind {
                return Err(DataError::MixedLabelKinds {
                    first: kind,
                    second: label.kind(),
                }
                .into());
            }
            if label.is_missing(is_key) {
                continue;
            }
            *map.entry(label).or_insert(0.0) += w;
        }
        if map.is_empty() {
            return Err(DataError::EmptyView.into());
        }
        Ok(Self {
            counts: map,
            kind,
            is_key,
            n_rows: 0,
        })
    }

    fn with_rows(mut self, n_rows: usize) -> Self {
        self.n_rows = n_rows;
        self
    }

    /// Sorted distinct labels.
    pub fn classes(&self) -> Vec<LabelValue> {
        self.counts.keys().copied().collect()
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn get(&self, label: &LabelValue) -> Option<f32> {
        self.counts.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelValue, f32)> + '_ {
        self.counts.iter().map(|(&l, &w)| (l, w))
    }

    /// Smallest accumulated weight.
    pub fn min_freq(&self) -> f32 {
        self.counts.values().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest accumulated weight.
    pub fn max_freq(&self) -> f32 {
        self.counts.values().copied().fold(0.0, f32::max)
    }

    #[inline]
    pub fn kind(&self) -> DataKind {
        self.kind
    }

    #[inline]
    pub fn is_key(&self) -> bool {
        self.is_key
    }

    /// Rows counted by [`build`](Self::build); `0` for [`from_counts`](Self::from_counts).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }
}

fn scan_partition(
    mut cursor: BoxedCursor<'_>,
    label: usize,
    weight: Option<usize>,
    kind: DataKind,
    is_key: bool,
) -> Result<Partial> {
    let mut partial = Partial::default();
    while cursor.move_next()? {
        let value = cursor.label(label)?;
        if value.kind() != kind {
            return Err(DataError::MixedLabelKinds {
                first: kind,
                second: value.kind(),
            }
            .into());
        }
        if value.is_missing(is_key) {
            continue;
        }
        let w = cursor.weight(weight)?;
        let w = if w.is_nan() { 0.0 } else { w };
        *partial.counts.entry(value).or_insert(0.0) += w;
        partial.n_rows += 1;
    }
    Ok(partial)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    use super::*;
    use crate::data::{InMemoryView, KeyRange};

    #[test]
    fn test_key_labels() {
        let view = InMemoryView::builder()
            .add_key_u32("Label", vec![1, 1, 2, 0], KeyRange::new(2))
            .build()
            .unwrap();
        let h = LabelHistogram::build(&view, 0, None, Some(1)).unwrap();
        assert_eq!(h.classes(), vec![LabelValue::U32(1), LabelValue::U32(2)]);
        assert_eq!(h.get(&LabelValue::U32(1)), Some(2.0));
        assert_eq!(h.get(&LabelValue::U32(2)), Some(1.0));
        assert_eq!(h.n_rows(), 3);
        assert!(h.is_key());
    }

    #[test]
    fn test_weights_and_nan() {
        let view = InMemoryView::builder()
            .add_f32("Label", array![0.0, 1.0, 1.0, f32::NAN].view())
            .add_f32("Weight", array![2.0, 0.5, f32::NAN, 3.0].view())
            .build()
            .unwrap();
        let h = LabelHistogram::build(&view, 0, Some(1), Some(1)).unwrap();
        assert_eq!(h.n_classes(), 2);
        assert_abs_diff_eq!(h.get(&LabelValue::Float(0.0)).unwrap(), 2.0);
        assert_abs_diff_eq!(h.get(&LabelValue::Float(1.0)).unwrap(), 0.5);
        assert_abs_diff_eq!(h.min_freq(), 0.5);
        assert_abs_diff_eq!(h.max_freq(), 2.0);
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(8)]
    fn test_parallel_matches_sequential(#[case] n_threads: usize) {
        let labels: Vec<f32> = (0..500).map(|i| (i % 7) as f32).collect();
        let weights: Vec<f32> = (0..500).map(|i| 0.1 + (i % 3) as f32).collect();
        let view = InMemoryView::builder()
            .add_f32("Label", ndarray::Array1::from(labels).view())
            .add_f32("Weight", ndarray::Array1::from(weights).view())
            .build()
            .unwrap();
        let seq = LabelHistogram::build(&view, 0, Some(1), Some(1)).unwrap();
        let par = LabelHistogram::build(&view, 0, Some(1), Some(n_threads)).unwrap();
        assert_eq!(seq.classes(), par.classes());
        assert_eq!(seq.n_rows(), par.n_rows());
        for (label, w) in seq.iter() {
            assert_abs_diff_eq!(par.get(&label).unwrap(), w, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_all_missing_is_empty() {
        let view = InMemoryView::builder()
            .add_f32("Label", array![f32::NAN, f32::NAN].view())
            .build()
            .unwrap();
        let err = LabelHistogram::build(&view, 0, None, Some(1)).unwrap_err();
        assert!(matches!(err, crate::Error::Data(DataError::EmptyView)));
    }

    #[test]
    fn test_unsupported_label_type() {
        let view = InMemoryView::builder()
            .add_i64("Label", vec![1, 2])
            .build()
            .unwrap();
        let err = LabelHistogram::build(&view, 0, None, None).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_counts_rejects_mixed_kinds() {
        let err = LabelHistogram::from_counts(
            DataKind::U32,
            true,
            [(LabelValue::U32(1), 1.0), (LabelValue::Float(1.0), 1.0)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Data(DataError::MixedLabelKinds { .. })
        ));
    }
}
