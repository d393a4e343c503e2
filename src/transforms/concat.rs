//! Column concatenation.

use std::sync::Arc;

use super::{ColumnDeriver, DerivedView};
use crate::data::{Column, ColumnType, DataView, RowCursor, VBuffer, Value};
use crate::error::{ConfigError, DataError, Result};

/// Inputs of a [`ConcatTransform`].
#[derive(Debug, Clone)]
pub struct ConcatColumns {
    inputs: Vec<usize>,
    /// Declared slot count per input, `0` when variable.
    widths: Vec<usize>,
}

impl ColumnDeriver for ConcatColumns {
    fn inputs(&self, _k: usize) -> Vec<usize> {
        self.inputs.clone()
    }

    fn derive(&self, _k: usize, input: &dyn RowCursor) -> Result<Value> {
        let parts = self
            .inputs
            .iter()
            .map(|&col| input.vector(col))
            .collect::<Result<Vec<_>>>()?;
        for (part, &width) in parts.iter().zip(&self.widths) {
            if width != 0 && part.len() != width {
                return Err(DataError::VectorLength {
                    expected: width,
                    actual: part.len(),
                }
                .into());
            }
        }
        Ok(concat(&parts)?.into())
    }
}

/// Concatenate vectors; the result is dense only when every part is.
fn concat(parts: &[VBuffer]) -> Result<VBuffer> {
    if parts.iter().all(VBuffer::is_dense) {
        let values = parts.iter().flat_map(|p| p.values().iter().copied()).collect();
        return Ok(VBuffer::dense(values));
    }
    let mut indices = Vec::new();
    let mut values = Vec::new();
    let mut offset = 0;
    for part in parts {
        if part.indices().is_none() && !part.is_dense() {
            return Err(DataError::SparseWithoutIndices.into());
        }
        for (i, v) in part.iter_stored() {
            indices.push(offset + i);
            values.push(v);
        }
        offset += part.len();
    }
    Ok(VBuffer::sparse(offset, indices, values)?)
}

/// Concatenates scalar and vector columns into one vector column.
pub type ConcatTransform = DerivedView<ConcatColumns>;

impl DerivedView<ConcatColumns> {
    pub fn new(source: Arc<dyn DataView>, name: &str, inputs: &[&str]) -> Result<Self> {
        if name.is_empty() {
            return Err(ConfigError::EmptyColumnName.into());
        }
        let schema = source.schema();
        let mut cols = Vec::with_capacity(inputs.len());
        let mut widths = Vec::with_capacity(inputs.len());
        for input in inputs {
            let col = schema.require(input)?;
            let ty = schema.column_type(col).ok_or(DataError::ColumnOutOfRange(col))?;
            cols.push(col);
            widths.push(ty.value_count());
        }
        let len = if widths.contains(&0) {
            0
        } else {
            widths.iter().sum()
        };
        Ok(Self::from_parts(
            source,
            vec![Column::new(name, ColumnType::vector(len))],
            ConcatColumns {
                inputs: cols,
                widths,
            },
        ))
    }
}
