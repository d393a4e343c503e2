//! Glue transforms.
//!
//! Each transform is a lazy [`DataView`] over a source view. Nothing is
//! materialized: cursors pull from the source cursor row by row.
//!
//! - [`ConvertTransform`]: change the type of columns (see [`Conversion`])
//! - [`NaFilter`]: drop rows whose label is missing
//! - [`ConcatTransform`]: concatenate columns into one vector column
//! - [`GroupIdTransform`]: add a monotonically increasing group id
//! - [`ScoreTransform`]: apply a vector predictor to a feature column
//!
//! Transforms that add columns share [`DerivedView`]: output columns either pass
//! an input column through or are computed from the current input row. An
//! output column whose name already exists replaces it in place.

mod concat;
mod convert;
mod filter;
mod group;
mod score;

pub use concat::{ConcatColumns, ConcatTransform};
pub use convert::{Conversion, ConvertColumn, ConvertColumns, ConvertTransform};
pub use filter::NaFilter;
pub use group::{GroupIdColumn, GroupIdTransform};
pub use score::{ScoreColumn, ScoreTransform};

use std::fmt;
use std::sync::Arc;

use crate::data::{
    ActiveColumns, BoxedCursor, Column, CursorState, DataView, RowCursor, RowId, Schema, Value,
};
use crate::error::{DataError, Result};

/// Where an output column of a [`DerivedView`] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Input(usize),
    Derived(usize),
}

/// Computes the derived columns of a [`DerivedView`] from the input row.
pub trait ColumnDeriver: Send + Sync {
    /// Input columns read by derived column `k`.
    fn inputs(&self, k: usize) -> Vec<usize>;

    fn derive(&self, k: usize, input: &dyn RowCursor) -> Result<Value>;

    /// Whether derived values stay correct when the input is split into
    /// partition cursors.
    fn splittable(&self) -> bool {
        true
    }
}

/// A view adding computed columns to a source view.
pub struct DerivedView<D> {
    source: Arc<dyn DataView>,
    schema: Schema,
    origins: Vec<Origin>,
    deriver: D,
}

impl<D: fmt::Debug> fmt::Debug for DerivedView<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedView")
            .field("schema", &self.schema.describe())
            .field("origins", &self.origins)
            .field("deriver", &self.deriver)
            .finish()
    }
}

impl<D: ColumnDeriver> DerivedView<D> {
    /// View over `source` with `derived` columns placed by name.
    pub(crate) fn from_parts(source: Arc<dyn DataView>, derived: Vec<Column>, deriver: D) -> Self {
        let mut columns: Vec<Column> = source.schema().iter().cloned().collect();
        let mut origins: Vec<Origin> = (0..columns.len()).map(Origin::Input).collect();
        for (k, column) in derived.into_iter().enumerate() {
            match columns.iter().rposition(|c| c.name == column.name) {
                Some(i) => {
                    columns[i] = column;
                    origins[i] = Origin::Derived(k);
                }
                None => {
                    columns.push(column);
                    origins.push(Origin::Derived(k));
                }
            }
        }
        Self {
            source,
            schema: Schema::new(columns),
            origins,
            deriver,
        }
    }

    #[inline]
    pub fn source(&self) -> &Arc<dyn DataView> {
        &self.source
    }

    #[inline]
    pub fn deriver(&self) -> &D {
        &self.deriver
    }

    pub fn origin(&self, col: usize) -> Option<Origin> {
        self.origins.get(col).copied()
    }

    /// Source columns needed to serve `active`.
    fn input_active(&self, active: &ActiveColumns) -> ActiveColumns {
        let mut input = ActiveColumns::none(self.source.schema().len());
        for col in active.iter() {
            match self.origins.get(col) {
                Some(Origin::Input(i)) => input.insert(*i),
                Some(Origin::Derived(k)) => {
                    for i in self.deriver.inputs(*k) {
                        input.insert(i);
                    }
                }
                None => {}
            }
        }
        input
    }

    fn wrap<'a>(&'a self, input: BoxedCursor<'a>, active: &ActiveColumns) -> BoxedCursor<'a> {
        Box::new(DerivedCursor {
            view: self,
            input,
            active: active.restrict(self.schema.len()),
        })
    }
}

impl<D: ColumnDeriver> DataView for DerivedView<D> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> Option<usize> {
        self.source.row_count()
    }

    fn cursor(&self, active: &ActiveColumns) -> Result<BoxedCursor<'_>> {
        let input = self.source.cursor(&self.input_active(active))?;
        Ok(self.wrap(input, active))
    }

    fn cursor_set(&self, active: &ActiveColumns, n: usize) -> Result<Vec<BoxedCursor<'_>>> {
        if !self.deriver.splittable() {
            return Ok(vec![self.cursor(active)?]);
        }
        let inputs = self.source.cursor_set(&self.input_active(active), n)?;
        Ok(inputs
            .into_iter()
            .map(|input| self.wrap(input, active))
            .collect())
    }
}

struct DerivedCursor<'a, D> {
    view: &'a DerivedView<D>,
    input: BoxedCursor<'a>,
    active: ActiveColumns,
}

impl<D: ColumnDeriver> RowCursor for DerivedCursor<'_, D> {
    fn schema(&self) -> &Schema {
        &self.view.schema
    }

    fn state(&self) -> CursorState {
        self.input.state()
    }

    fn position(&self) -> i64 {
        self.input.position()
    }

    fn move_next(&mut self) -> Result<bool> {
        self.input.move_next()
    }

    fn row_id(&self) -> Result<RowId> {
        self.input.row_id()
    }

    fn is_active(&self, col: usize) -> bool {
        self.active.contains(col)
    }

    fn value(&self, col: usize) -> Result<Value> {
        let origin = self
            .view
            .origins
            .get(col)
            .ok_or(DataError::ColumnOutOfRange(col))?;
        if !self.active.contains(col) {
            return Err(DataError::InactiveColumn(col).into());
        }
        match *origin {
            Origin::Input(i) => self.input.value(i),
            Origin::Derived(k) => self.view.deriver.derive(k, self.input.as_ref()),
        }
    }
}
