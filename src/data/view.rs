//! Data view and row cursor traits.
//!
//! A [`DataView`] is a columnar dataset: a [`Schema`] plus the ability to open
//! forward-only [`RowCursor`]s over it, either one at a time or as a set of
//! partition cursors over disjoint rows for parallel consumption.
//!
//! Cursors are pull-based. A consumer calls [`RowCursor::move_next`] and then
//! reads the columns it activated with [`RowCursor::value`]. Reading a column
//! that was not activated is an error.

use fixedbitset::FixedBitSet;

use super::label::LabelValue;
use super::schema::Schema;
use super::value::{Scalar, Value};
use super::vbuffer::VBuffer;
use crate::error::{DataError, Result};

/// Stable row identity.
pub type RowId = u128;

/// Cursor over a view, possibly borrowing it.
pub type BoxedCursor<'a> = Box<dyn RowCursor + 'a>;

/// Lifecycle of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    NotStarted,
    Good,
    Done,
}

// =============================================================================
// ActiveColumns
// =============================================================================

/// The set of columns a consumer wants to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveColumns {
    bits: FixedBitSet,
}

impl ActiveColumns {
    /// No column active.
    pub fn none(n_columns: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(n_columns),
        }
    }

    /// Every column active.
    pub fn all(n_columns: usize) -> Self {
        let mut bits = FixedBitSet::with_capacity(n_columns);
        bits.insert_range(..);
        Self { bits }
    }

    pub fn from_indices(n_columns: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut active = Self::none(n_columns);
        for i in indices {
            active.insert(i);
        }
        active
    }

    /// Number of columns of the schema this set refers to.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn contains(&self, col: usize) -> bool {
        self.bits.contains(col)
    }

    /// Activate `col`, growing the set if needed.
    pub fn insert(&mut self, col: usize) {
        if col >= self.bits.len() {
            self.bits.grow(col + 1);
        }
        self.bits.insert(col);
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    /// The same set seen through a schema with `n_columns` columns; columns
    /// past the end are dropped.
    pub fn restrict(&self, n_columns: usize) -> Self {
        Self::from_indices(n_columns, self.iter().filter(|&c| c < n_columns))
    }
}

// =============================================================================
// RowCursor
// =============================================================================

/// Forward-only cursor over the rows of a view.
pub trait RowCursor: Send {
    fn schema(&self) -> &Schema;

    fn state(&self) -> CursorState;

    /// Index of the current row within this cursor, `-1` before the first row.
    fn position(&self) -> i64;

    /// Advance to the next row. Returns `false` once the cursor is exhausted.
    fn move_next(&mut self) -> Result<bool>;

    /// Identity of the current row.
    fn row_id(&self) -> Result<RowId>;

    fn is_active(&self, col: usize) -> bool;

    /// Value of an active column at the current row.
    fn value(&self, col: usize) -> Result<Value>;

    /// Scalar value of an active column.
    fn scalar(&self, col: usize) -> Result<Scalar> {
        let value = self.value(col)?;
        value.as_scalar().ok_or_else(|| {
            DataError::TypeMismatch {
                column: col,
                expected: "scalar",
                actual: value.type_name(),
            }
            .into()
        })
    }

    /// Label value of an active column.
    fn label(&self, col: usize) -> Result<LabelValue> {
        let scalar = self.scalar(col)?;
        LabelValue::try_from(scalar).map_err(|kind| {
            DataError::TypeMismatch {
                column: col,
                expected: "label",
                actual: kind.name(),
            }
            .into()
        })
    }

    /// Vector value of an active column. Scalars are promoted to length 1.
    fn vector(&self, col: usize) -> Result<VBuffer> {
        match self.value(col)? {
            Value::Vector(v) => Ok(v),
            Value::Scalar(s) => Ok(VBuffer::dense(vec![s.as_f32()])),
        }
    }

    /// Row weight: the weight column's value, or `1.0` without one.
    fn weight(&self, col: Option<usize>) -> Result<f32> {
        match col {
            None => Ok(1.0),
            Some(c) => Ok(self.scalar(c)?.as_f32()),
        }
    }
}

// =============================================================================
// DataView
// =============================================================================

/// A columnar dataset.
pub trait DataView: Send + Sync {
    fn schema(&self) -> &Schema;

    /// Number of rows when known without a scan.
    fn row_count(&self) -> Option<usize>;

    /// Open a cursor reading the `active` columns.
    fn cursor(&self, active: &ActiveColumns) -> Result<BoxedCursor<'_>>;

    /// Open up to `n` cursors over disjoint rows covering the whole view.
    ///
    /// Views that cannot split return a single cursor.
    fn cursor_set(&self, active: &ActiveColumns, n: usize) -> Result<Vec<BoxedCursor<'_>>> {
        let _ = n;
        Ok(vec![self.cursor(active)?])
    }
}

/// Count rows by scanning, unless the view knows its size.
pub fn count_rows(view: &dyn DataView) -> Result<usize> {
    if let Some(n) = view.row_count() {
        return Ok(n);
    }
    let mut cursor = view.cursor(&ActiveColumns::none(view.schema().len()))?;
    let mut n = 0;
    while cursor.move_next()? {
        n += 1;
    }
    Ok(n)
}
