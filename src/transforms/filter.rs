//! Missing-label filter.

use std::sync::Arc;

use crate::data::{
    ActiveColumns, BoxedCursor, CursorState, DataView, RowCursor, RowId, Scalar, Schema, Value,
};
use crate::error::Result;

/// Drops rows whose label is missing: `NaN` floats, and `0` under a key type.
pub struct NaFilter {
    source: Arc<dyn DataView>,
    label: usize,
    is_key: bool,
}

impl NaFilter {
    pub fn new(source: Arc<dyn DataView>, label: &str) -> Result<Self> {
        let label = source.schema().require(label)?;
        let is_key = source
            .schema()
            .column_type(label)
            .is_some_and(|t| t.is_key());
        Ok(Self {
            source,
            label,
            is_key,
        })
    }

    fn wrap<'a>(&'a self, input: BoxedCursor<'a>) -> BoxedCursor<'a> {
        Box::new(FilterCursor {
            input,
            label: self.label,
            is_key: self.is_key,
            pos: -1,
        })
    }

    fn input_active(&self, active: &ActiveColumns) -> ActiveColumns {
        let mut input = active.restrict(self.source.schema().len());
        input.insert(self.label);
        input
    }
}

impl DataView for NaFilter {
    fn schema(&self) -> &Schema {
        self.source.schema()
    }

    fn row_count(&self) -> Option<usize> {
        None
    }

    fn cursor(&self, active: &ActiveColumns) -> Result<BoxedCursor<'_>> {
        let input = self.source.cursor(&self.input_active(active))?;
        Ok(self.wrap(input))
    }

    fn cursor_set(&self, active: &ActiveColumns, n: usize) -> Result<Vec<BoxedCursor<'_>>> {
        let inputs = self.source.cursor_set(&self.input_active(active), n)?;
        Ok(inputs.into_iter().map(|c| self.wrap(c)).collect())
    }
}

struct FilterCursor<'a> {
    input: BoxedCursor<'a>,
    label: usize,
    is_key: bool,
    pos: i64,
}

impl FilterCursor<'_> {
    fn is_missing(&self) -> Result<bool> {
        Ok(match self.input.scalar(self.label)? {
            Scalar::F32(v) => v.is_nan(),
            Scalar::U8(v) => self.is_key && v == 0,
            Scalar::U16(v) => self.is_key && v == 0,
            Scalar::U32(v) => self.is_key && v == 0,
            Scalar::U64(v) => self.is_key && v == 0,
            Scalar::I64(_) | Scalar::Bool(_) => false,
        })
    }
}

impl RowCursor for FilterCursor<'_> {
    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn state(&self) -> CursorState {
        self.input.state()
    }

    fn position(&self) -> i64 {
        self.pos
    }

    fn move_next(&mut self) -> Result<bool> {
        while self.input.move_next()? {
            if !self.is_missing()? {
                self.pos += 1;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn row_id(&self) -> Result<RowId> {
        self.input.row_id()
    }

    fn is_active(&self, col: usize) -> bool {
        self.input.is_active(col)
    }

    fn value(&self, col: usize) -> Result<Value> {
        self.input.value(col)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::data::{count_rows, InMemoryView, KeyRange};

    #[test]
    fn test_drops_nan_labels() {
        let view = InMemoryView::builder()
            .add_f32("Label", array![0.0, f32::NAN, 2.0, f32::NAN].view())
            .build()
            .unwrap();
        let filter = NaFilter::new(Arc::new(view), "Label").unwrap();
        assert_eq!(count_rows(&filter).unwrap(), 2);

        let mut cursor = filter.cursor(&ActiveColumns::all(1)).unwrap();
        assert!(cursor.move_next().unwrap());
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.row_id().unwrap(), 2);
        assert!(!cursor.move_next().unwrap());
        assert_eq!(cursor.state(), CursorState::Done);
    }

    #[test]
    fn test_drops_missing_keys_only() {
        let keyed = InMemoryView::builder()
            .add_key_u32("Label", vec![0, 1, 2], KeyRange::new(2))
            .build()
            .unwrap();
        let filter = NaFilter::new(Arc::new(keyed), "Label").unwrap();
        assert_eq!(count_rows(&filter).unwrap(), 2);

        let raw = InMemoryView::builder()
            .add_u32("Label", vec![0, 1, 2])
            .build()
            .unwrap();
        let filter = NaFilter::new(Arc::new(raw), "Label").unwrap();
        assert_eq!(count_rows(&filter).unwrap(), 3);
    }
}
