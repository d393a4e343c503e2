//! In-memory data view.
//!
//! [`InMemoryView`] stores each column as a typed array. Partition cursors
//! cover contiguous row ranges; row ids are global row indices.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::kind::{ColumnType, DataKind, KeyRange};
use super::schema::{Column, Schema};
use super::value::{Scalar, Value};
use super::vbuffer::VBuffer;
use super::view::{ActiveColumns, BoxedCursor, CursorState, DataView, RowCursor, RowId};
use crate::error::{DataError, Result};

/// Storage of one column.
#[derive(Debug, Clone)]
pub enum ColumnData {
    F32(Array1<f32>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
    /// Fixed-length dense vectors, shape `[n_rows, len]`.
    Dense(Array2<f32>),
    /// One vector per row.
    Vectors(Vec<VBuffer>),
}

impl ColumnData {
    fn n_rows(&self) -> usize {
        match self {
            ColumnData::F32(v) => v.len(),
            ColumnData::U8(v) => v.len(),
            ColumnData::U16(v) => v.len(),
            ColumnData::U32(v) => v.len(),
            ColumnData::U64(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Dense(a) => a.nrows(),
            ColumnData::Vectors(v) => v.len(),
        }
    }

    #[inline]
    fn value(&self, row: usize) -> Value {
        match self {
            ColumnData::F32(v) => Scalar::F32(v[row]).into(),
            ColumnData::U8(v) => Scalar::U8(v[row]).into(),
            ColumnData::U16(v) => Scalar::U16(v[row]).into(),
            ColumnData::U32(v) => Scalar::U32(v[row]).into(),
            ColumnData::U64(v) => Scalar::U64(v[row]).into(),
            ColumnData::I64(v) => Scalar::I64(v[row]).into(),
            ColumnData::Bool(v) => Scalar::Bool(v[row]).into(),
            ColumnData::Dense(a) => VBuffer::dense(a.row(row).to_vec()).into(),
            ColumnData::Vectors(v) => v[row].clone().into(),
        }
    }
}

// =============================================================================
// InMemoryView
// =============================================================================

/// A dataset held entirely in memory.
///
/// # Example
///
/// ```
/// use multiclass_reduce::data::{DataView, InMemoryView};
/// use ndarray::array;
///
/// let view = InMemoryView::builder()
///     .add_f32("Label", array![0.0, 1.0, 2.0].view())
///     .add_dense("Features", array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]].view())
///     .build()
///     .unwrap();
///
/// assert_eq!(view.row_count(), Some(3));
/// assert_eq!(view.schema().index_of("Features"), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryView {
    schema: Schema,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

impl InMemoryView {
    pub fn builder() -> InMemoryViewBuilder {
        InMemoryViewBuilder::default()
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Storage of a column.
    pub fn column_data(&self, col: usize) -> Option<&ColumnData> {
        self.columns.get(col)
    }

    /// Read every row of `view` into memory.
    pub fn materialize(view: &dyn DataView) -> Result<InMemoryView> {
        let schema = view.schema().clone();
        let n_cols = schema.len();
        let mut cursor = view.cursor(&ActiveColumns::all(n_cols))?;
        let mut rows: Vec<Vec<Value>> = (0..n_cols).map(|_| Vec::new()).collect();
        while cursor.move_next()? {
            for (col, out) in rows.iter_mut().enumerate() {
                out.push(cursor.value(col)?);
            }
        }
        let mut builder = InMemoryView::builder();
        for (col, values) in rows.into_iter().enumerate() {
            let meta = schema.column(col).cloned().ok_or(DataError::ColumnOutOfRange(col))?;
            builder = builder.add_values(meta, values)?;
        }
        builder.build()
    }
}

impl DataView for InMemoryView {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> Option<usize> {
        Some(self.n_rows)
    }

    fn cursor(&self, active: &ActiveColumns) -> Result<BoxedCursor<'_>> {
        Ok(Box::new(MemoryCursor::new(self, active, 0, self.n_rows)))
    }

    fn cursor_set(&self, active: &ActiveColumns, n: usize) -> Result<Vec<BoxedCursor<'_>>> {
        let n = n.clamp(1, self.n_rows.max(1));
        let chunk = self.n_rows.div_ceil(n).max(1);
        let mut cursors: Vec<BoxedCursor<'_>> = Vec::with_capacity(n);
        let mut start = 0;
        while start < self.n_rows || cursors.is_empty() {
            let end = (start + chunk).min(self.n_rows);
            cursors.push(Box::new(MemoryCursor::new(self, active, start, end)));
            start = end;
        }
        Ok(cursors)
    }
}

struct MemoryCursor<'a> {
    view: &'a InMemoryView,
    active: ActiveColumns,
    start: usize,
    end: usize,
    pos: i64,
    state: CursorState,
}

impl<'a> MemoryCursor<'a> {
    fn new(view: &'a InMemoryView, active: &ActiveColumns, start: usize, end: usize) -> Self {
        Self {
            view,
            active: active.restrict(view.schema.len()),
            start,
            end,
            pos: -1,
            state: CursorState::NotStarted,
        }
    }

    #[inline]
    fn row(&self) -> Result<usize> {
        if self.state != CursorState::Good {
            return Err(DataError::NoCurrentRow.into());
        }
        Ok(self.start + self.pos as usize)
    }
}

impl RowCursor for MemoryCursor<'_> {
    fn schema(&self) -> &Schema {
        &self.view.schema
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn position(&self) -> i64 {
        self.pos
    }

    fn move_next(&mut self) -> Result<bool> {
        if self.state == CursorState::Done {
            return Ok(false);
        }
        if self.start + ((self.pos + 1) as usize) < self.end {
            self.pos += 1;
            self.state = CursorState::Good;
            Ok(true)
        } else {
            self.state = CursorState::Done;
            Ok(false)
        }
    }

    fn row_id(&self) -> Result<RowId> {
        Ok(self.row()? as RowId)
    }

    fn is_active(&self, col: usize) -> bool {
        self.active.contains(col)
    }

    fn value(&self, col: usize) -> Result<Value> {
        let data = self
            .view
            .columns
            .get(col)
            .ok_or(DataError::ColumnOutOfRange(col))?;
        if !self.active.contains(col) {
            return Err(DataError::InactiveColumn(col).into());
        }
        Ok(data.value(self.row()?))
    }
}

// =============================================================================
// InMemoryViewBuilder
// =============================================================================

/// Builder for [`InMemoryView`].
#[derive(Debug, Default)]
pub struct InMemoryViewBuilder {
    columns: Vec<Column>,
    data: Vec<ColumnData>,
}

impl InMemoryViewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column with explicit type and storage.
    pub fn add_column(mut self, column: Column, data: ColumnData) -> Self {
        self.columns.push(column);
        self.data.push(data);
        self
    }

    pub fn add_f32(self, name: &str, values: ArrayView1<f32>) -> Self {
        self.add_column(
            Column::new(name, ColumnType::f32()),
            ColumnData::F32(values.to_owned()),
        )
    }

    pub fn add_bool(self, name: &str, values: Vec<bool>) -> Self {
        self.add_column(Column::new(name, ColumnType::bool()), ColumnData::Bool(values))
    }

    pub fn add_i64(self, name: &str, values: Vec<i64>) -> Self {
        self.add_column(
            Column::new(name, ColumnType::scalar(DataKind::I64)),
            ColumnData::I64(values),
        )
    }

    pub fn add_u32(self, name: &str, values: Vec<u32>) -> Self {
        self.add_column(Column::new(name, ColumnType::u32()), ColumnData::U32(values))
    }

    /// Add a 1-based key column stored as `u32`.
    pub fn add_key_u32(self, name: &str, values: Vec<u32>, range: KeyRange) -> Self {
        self.add_column(
            Column::new(name, ColumnType::key(DataKind::U32, range)),
            ColumnData::U32(values),
        )
    }

    /// Add a 1-based key column stored as `u8`.
    pub fn add_key_u8(self, name: &str, values: Vec<u8>, range: KeyRange) -> Self {
        self.add_column(
            Column::new(name, ColumnType::key(DataKind::U8, range)),
            ColumnData::U8(values),
        )
    }

    /// Add a 1-based key column stored as `u16`.
    pub fn add_key_u16(self, name: &str, values: Vec<u16>, range: KeyRange) -> Self {
        self.add_column(
            Column::new(name, ColumnType::key(DataKind::U16, range)),
            ColumnData::U16(values),
        )
    }

    /// Add a fixed-length dense vector column; `rows` has shape `[n_rows, len]`.
    pub fn add_dense(self, name: &str, rows: ArrayView2<f32>) -> Self {
        self.add_column(
            Column::new(name, ColumnType::vector(rows.ncols())),
            ColumnData::Dense(rows.to_owned()),
        )
    }

    /// Add a vector column from per-row vectors.
    pub fn add_vectors(self, name: &str, len: usize, rows: Vec<VBuffer>) -> Self {
        self.add_column(
            Column::new(name, ColumnType::vector(len)),
            ColumnData::Vectors(rows),
        )
    }

    /// Add a column from a sequence of cell values of the column's type.
    pub fn add_values(self, column: Column, values: Vec<Value>) -> Result<Self> {
        let data = collect_values(self.columns.len(), &column, values)?;
        Ok(self.add_column(column, data))
    }

    /// Build the view.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::RowCountMismatch`] if columns have different lengths
    /// and [`DataError::VectorLength`] if a fixed-length vector column holds a
    /// vector of another length.
    pub fn build(self) -> Result<InMemoryView> {
        let n_rows = self.data.first().map_or(0, ColumnData::n_rows);
        for (column, data) in self.columns.iter().zip(&self.data) {
            if data.n_rows() != n_rows {
                return Err(DataError::RowCountMismatch {
                    name: column.name.clone(),
                    expected: n_rows,
                    actual: data.n_rows(),
                }
                .into());
            }
            if let (ColumnType::Vector { len }, ColumnData::Vectors(rows)) = (column.ty, data) {
                if len > 0 {
                    if let Some(bad) = rows.iter().find(|v| v.len() != len) {
                        return Err(DataError::VectorLength {
                            expected: len,
                            actual: bad.len(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(InMemoryView {
            schema: Schema::new(self.columns),
            columns: self.data,
            n_rows,
        })
    }
}

fn collect_values(index: usize, column: &Column, values: Vec<Value>) -> Result<ColumnData> {
    let mismatch = |expected: &'static str, actual: &'static str| -> crate::Error {
        DataError::TypeMismatch {
            column: index,
            expected,
            actual,
        }
        .into()
    };

    macro_rules! scalars {
        ($variant:ident, $name:literal) => {
            values
                .into_iter()
                .map(|v| match v {
                    Value::Scalar(Scalar::$variant(x)) => Ok(x),
                    other => Err(mismatch($name, other.type_name())),
                })
                .collect::<Result<Vec<_>>>()?
        };
    }

    let data = match column.ty {
        ColumnType::Vector { .. } => ColumnData::Vectors(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Vector(b) => b,
                    Value::Scalar(s) => VBuffer::dense(vec![s.as_f32()]),
                })
                .collect(),
        ),
        ColumnType::Scalar(s) => match s.kind {
            DataKind::F32 => ColumnData::F32(Array1::from(scalars!(F32, "f32"))),
            DataKind::U8 => ColumnData::U8(scalars!(U8, "u8")),
            DataKind::U16 => ColumnData::U16(scalars!(U16, "u16")),
            DataKind::U32 => ColumnData::U32(scalars!(U32, "u32")),
            DataKind::U64 => ColumnData::U64(scalars!(U64, "u64")),
            DataKind::I64 => ColumnData::I64(scalars!(I64, "i64")),
            DataKind::Bool => ColumnData::Bool(scalars!(Bool, "bool")),
        },
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn view() -> InMemoryView {
        InMemoryView::builder()
            .add_f32("Label", array![0.0, 1.0, 2.0, 1.0, 0.0].view())
            .add_dense(
                "Features",
                array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0], [9.0, 10.0]].view(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_cursor_reads_active_columns() {
        let v = view();
        let mut c = v.cursor(&ActiveColumns::from_indices(2, [0])).unwrap();
        assert_eq!(c.state(), CursorState::NotStarted);
        assert!(matches!(
            c.value(0),
            Err(crate::Error::Data(DataError::NoCurrentRow))
        ));
        assert!(c.move_next().unwrap());
        assert_eq!(c.scalar(0).unwrap(), Scalar::F32(0.0));
        assert!(matches!(
            c.value(1),
            Err(crate::Error::Data(DataError::InactiveColumn(1)))
        ));
    }

    #[test]
    fn test_cursor_exhausts() {
        let v = view();
        let mut c = v.cursor(&ActiveColumns::all(2)).unwrap();
        let mut n = 0;
        while c.move_next().unwrap() {
            assert_eq!(c.row_id().unwrap(), n as RowId);
            n += 1;
        }
        assert_eq!(n, 5);
        assert_eq!(c.state(), CursorState::Done);
        assert!(!c.move_next().unwrap());
    }

    #[test]
    fn test_cursor_set_partitions_rows() {
        let v = view();
        let cursors = v.cursor_set(&ActiveColumns::all(2), 2).unwrap();
        assert_eq!(cursors.len(), 2);
        let mut ids = Vec::new();
        for mut c in cursors {
            while c.move_next().unwrap() {
                ids.push(c.row_id().unwrap());
            }
        }
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cursor_set_on_empty_view() {
        let v = InMemoryView::builder()
            .add_f32("Label", Array1::<f32>::zeros(0).view())
            .build()
            .unwrap();
        let cursors = v.cursor_set(&ActiveColumns::all(1), 4).unwrap();
        assert_eq!(cursors.len(), 1);
    }

    #[test]
    fn test_row_count_mismatch() {
        let err = InMemoryView::builder()
            .add_f32("A", array![1.0, 2.0].view())
            .add_u32("B", vec![1])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Data(DataError::RowCountMismatch { .. })
        ));
    }

    #[test]
    fn test_materialize_round_trips_values() {
        let v = view();
        let m = InMemoryView::materialize(&v).unwrap();
        assert_eq!(m.schema(), v.schema());
        let mut c = m.cursor(&ActiveColumns::all(2)).unwrap();
        c.move_next().unwrap();
        assert_eq!(c.vector(1).unwrap().to_dense(), vec![1.0, 2.0]);
    }
}
