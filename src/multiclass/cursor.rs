//! Row-multiplying cursor.

use std::sync::Arc;

use rand_xoshiro::Xoshiro256PlusPlus;

use super::config::LabelOutput;
use super::replication::{Replica, ReplicationPolicy};
use crate::data::{
    ActiveColumns, BoxedCursor, CursorState, LabelValue, RowCursor, RowId, Scalar, Schema,
    VBuffer, Value,
};
use crate::error::{DataError, Result};

/// Column positions and label handling shared by every cursor of a view.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CursorLayout {
    pub label: usize,
    /// Index of the derived label column, always the last one.
    pub derived: usize,
    pub label_output: LabelOutput,
    pub is_key: bool,
    /// Length of one-hot label vectors; unused for other outputs.
    pub label_len: usize,
}

/// Emits every base row once per replica of its plan.
///
/// Base rows whose label is missing, or whose plan is empty, produce nothing.
pub struct MultiplyingCursor<'a> {
    input: BoxedCursor<'a>,
    schema: &'a Schema,
    policy: Arc<ReplicationPolicy>,
    layout: CursorLayout,
    active: ActiveColumns,
    rng: Xoshiro256PlusPlus,
    plan: Vec<Replica>,
    current: usize,
    state: CursorState,
    pos: i64,
}

impl<'a> MultiplyingCursor<'a> {
    pub(crate) fn new(
        input: BoxedCursor<'a>,
        schema: &'a Schema,
        policy: Arc<ReplicationPolicy>,
        layout: CursorLayout,
        active: ActiveColumns,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        let capacity = policy.max_replica();
        Self {
            input,
            schema,
            policy,
            layout,
            active,
            rng,
            plan: Vec::with_capacity(capacity),
            current: 0,
            state: CursorState::NotStarted,
            pos: -1,
        }
    }

    /// Replica the cursor is positioned on.
    pub fn replica(&self) -> Option<&Replica> {
        match self.state {
            CursorState::Good => self.plan.get(self.current),
            _ => None,
        }
    }

    fn label_value(&self, label: LabelValue) -> Result<Value> {
        match self.layout.label_output {
            LabelOutput::Native => Ok(Scalar::from(label).into()),
            LabelOutput::Float => {
                let v = label.as_f32();
                if v < 0.0 {
                    return Err(DataError::NegativeLabel(label.class_index()).into());
                }
                Ok(Scalar::F32(v).into())
            }
            LabelOutput::OneHot => {
                let index = label.class_index();
                if index < 0 {
                    return Err(DataError::NegativeLabel(index).into());
                }
                Ok(VBuffer::one_hot(self.layout.label_len, index as usize)?.into())
            }
        }
    }

    /// Advance the base cursor to the next row with a non-empty plan.
    fn next_base(&mut self) -> Result<bool> {
        while self.input.move_next()? {
            let label = self.input.label(self.layout.label)?;
            if label.is_missing(self.layout.is_key) {
                continue;
            }
            self.policy.plan(label, &mut self.rng, &mut self.plan)?;
            if !self.plan.is_empty() {
                self.current = 0;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl RowCursor for MultiplyingCursor<'_> {
    fn schema(&self) -> &Schema {
        self.schema
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn position(&self) -> i64 {
        self.pos
    }

    fn move_next(&mut self) -> Result<bool> {
        match self.state {
            CursorState::Done => return Ok(false),
            CursorState::Good if self.current + 1 < self.plan.len() => {
                self.current += 1;
            }
            _ => {
                if !self.next_base()? {
                    self.state = CursorState::Done;
                    self.plan.clear();
                    return Ok(false);
                }
            }
        }
        self.state = CursorState::Good;
        self.pos += 1;
        Ok(true)
    }

    fn row_id(&self) -> Result<RowId> {
        if self.state != CursorState::Good {
            return Err(DataError::NoCurrentRow.into());
        }
        Ok(self.policy.row_id(self.input.row_id()?, self.current))
    }

    fn is_active(&self, col: usize) -> bool {
        self.active.contains(col)
    }

    fn value(&self, col: usize) -> Result<Value> {
        if col >= self.schema.len() {
            return Err(DataError::ColumnOutOfRange(col).into());
        }
        if !self.active.contains(col) {
            return Err(DataError::InactiveColumn(col).into());
        }
        let replica = self.replica().ok_or(DataError::NoCurrentRow)?;
        if col == self.layout.derived {
            Ok(replica.derived.to_scalar().into())
        } else if col == self.layout.label {
            self.label_value(replica.label)
        } else {
            self.input.value(col)
        }
    }
}
