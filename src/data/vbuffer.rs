//! Dense or sparse `f32` vectors.

use ndarray::ArrayView1;

use crate::error::DataError;

/// An `f32` vector of logical length `len`, stored densely or sparsely.
///
/// - Dense: `indices` is `None` and `values.len() == len`.
/// - Sparse: `indices` holds strictly increasing positions below `len`, one per
///   entry of `values`. Missing positions are zero.
///
/// Vectors received from outside the crate may be inconsistent (values without
/// indices); [`from_raw_parts`](Self::from_raw_parts) keeps them as given so
/// consumers can report the problem at the row where it occurs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VBuffer {
    len: usize,
    values: Vec<f32>,
    indices: Option<Vec<usize>>,
}

impl VBuffer {
    /// Dense vector owning `values`.
    pub fn dense(values: Vec<f32>) -> Self {
        Self {
            len: values.len(),
            values,
            indices: None,
        }
    }

    /// All-zero sparse vector.
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            values: Vec::new(),
            indices: Some(Vec::new()),
        }
    }

    /// Validated sparse vector.
    pub fn sparse(len: usize, indices: Vec<usize>, values: Vec<f32>) -> Result<Self, DataError> {
        if indices.len() != values.len() {
            return Err(DataError::InvalidSparse(format!(
                "{} indices for {} values",
                indices.len(),
                values.len()
            )));
        }
        if let Some(w) = indices.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DataError::InvalidSparse(format!(
                "indices not strictly increasing at {}",
                w[1]
            )));
        }
        if let Some(&last) = indices.last() {
            if last >= len {
                return Err(DataError::InvalidSparse(format!(
                    "index {last} out of bounds for length {len}"
                )));
            }
        }
        Ok(Self {
            len,
            values,
            indices: Some(indices),
        })
    }

    /// Unchecked constructor.
    pub fn from_raw_parts(len: usize, values: Vec<f32>, indices: Option<Vec<usize>>) -> Self {
        Self {
            len,
            values,
            indices,
        }
    }

    /// One-hot vector: a single `1.0` at `index`.
    pub fn one_hot(len: usize, index: usize) -> Result<Self, DataError> {
        Self::sparse(len, vec![index], vec![1.0])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of stored values.
    #[inline]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn indices(&self) -> Option<&[usize]> {
        self.indices.as_deref()
    }

    #[inline]
    pub fn is_dense(&self) -> bool {
        self.indices.is_none() && self.values.len() == self.len
    }

    /// Value at logical position `i`.
    pub fn get(&self, i: usize) -> f32 {
        match &self.indices {
            None => self.values.get(i).copied().unwrap_or(0.0),
            Some(idx) => idx
                .binary_search(&i)
                .map(|p| self.values[p])
                .unwrap_or(0.0),
        }
    }

    /// Iterate `(position, value)` over stored entries.
    ///
    /// Inconsistent sparse vectors (values without indices) yield nothing.
    pub fn iter_stored(&self) -> Box<dyn Iterator<Item = (usize, f32)> + '_> {
        match &self.indices {
            Some(idx) => Box::new(idx.iter().copied().zip(self.values.iter().copied())),
            None if self.is_dense() => Box::new(self.values.iter().copied().enumerate()),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Dense copy of the vector.
    pub fn to_dense(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len];
        for (i, v) in self.iter_stored() {
            out[i] = v;
        }
        out
    }

    /// Dot product against a weight vector of at least `len` entries.
    ///
    /// Positions beyond the weight vector contribute nothing.
    pub fn dot(&self, weights: ArrayView1<'_, f32>) -> f32 {
        self.iter_stored()
            .filter(|&(i, _)| i < weights.len())
            .map(|(i, v)| v * weights[i])
            .sum()
    }

    // -------------------------------------------------------------------------
    // In-place editing, used by scratch buffers.
    // -------------------------------------------------------------------------

    /// Overwrite with a dense copy of `src` followed by `extra` zero slots.
    pub(crate) fn assign_dense_extended(&mut self, src: &[f32], extra: usize) {
        self.values.clear();
        self.values.extend_from_slice(src);
        self.values.resize(src.len() + extra, 0.0);
        self.indices = None;
        self.len = src.len() + extra;
    }

    /// Overwrite with a sparse copy of `src` followed by one extra entry at
    /// position `extra_index`, with logical length `len`.
    pub(crate) fn assign_sparse_extended(
        &mut self,
        src_indices: &[usize],
        src_values: &[f32],
        len: usize,
        extra_index: usize,
    ) {
        self.values.clear();
        self.values.extend_from_slice(src_values);
        self.values.push(0.0);
        let idx = self.indices.get_or_insert_with(Vec::new);
        idx.clear();
        idx.extend_from_slice(src_indices);
        idx.push(extra_index);
        self.len = len;
    }

    #[inline]
    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Mutable access to the last stored entry's position.
    #[inline]
    pub(crate) fn last_index_mut(&mut self) -> Option<&mut usize> {
        self.indices.as_mut().and_then(|idx| idx.last_mut())
    }

    /// Reset to an all-zero dense vector of length `len`.
    pub(crate) fn reset_dense(&mut self, len: usize) {
        self.values.clear();
        self.values.resize(len, 0.0);
        self.indices = None;
        self.len = len;
    }
}
