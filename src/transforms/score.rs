//! Scoring a vector predictor as a view.

use std::sync::Arc;

use super::{ColumnDeriver, DerivedView};
use crate::data::{Column, ColumnType, DataView, RowCursor, VBuffer, Value};
use crate::error::{ConfigError, Result};
use crate::learner::VectorPredictor;

/// Applies a [`VectorPredictor`] to a feature column.
#[derive(Debug, Clone)]
pub struct ScoreColumn {
    features: usize,
    predictor: Arc<dyn VectorPredictor>,
}

impl ScoreColumn {
    pub fn predictor(&self) -> &Arc<dyn VectorPredictor> {
        &self.predictor
    }
}

impl ColumnDeriver for ScoreColumn {
    fn inputs(&self, _k: usize) -> Vec<usize> {
        vec![self.features]
    }

    fn derive(&self, _k: usize, input: &dyn RowCursor) -> Result<Value> {
        let features = input.vector(self.features)?;
        let mut out = VBuffer::default();
        self.predictor.map(&features, &mut out)?;
        Ok(out.into())
    }
}

/// Adds the predictor's output vector as a new column.
pub type ScoreTransform = DerivedView<ScoreColumn>;

impl DerivedView<ScoreColumn> {
    pub fn new(
        source: Arc<dyn DataView>,
        features: &str,
        name: &str,
        predictor: Arc<dyn VectorPredictor>,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(ConfigError::EmptyColumnName.into());
        }
        let features = source.schema().require(features)?;
        let ty = ColumnType::vector(predictor.output_len());
        Ok(Self::from_parts(
            source,
            vec![Column::new(name, ty)],
            ScoreColumn {
                features,
                predictor,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::data::{ActiveColumns, InMemoryView};
    use crate::learner::SoftmaxModel;

    #[test]
    fn test_score_column() {
        let view = InMemoryView::builder()
            .add_dense("Features", array![[1.0], [-1.0]].view())
            .build()
            .unwrap();
        let model = SoftmaxModel::new(array![[2.0, -2.0], [0.0, 0.0]]);
        let view =
            ScoreTransform::new(Arc::new(view), "Features", "Score", Arc::new(model)).unwrap();
        assert_eq!(view.schema().column_type(1), Some(ColumnType::vector(2)));

        let mut cursor = view.cursor(&ActiveColumns::from_indices(2, [1])).unwrap();
        cursor.move_next().unwrap();
        let first = cursor.vector(1).unwrap().to_dense();
        assert!(first[0] > first[1]);
        cursor.move_next().unwrap();
        let second = cursor.vector(1).unwrap().to_dense();
        assert!(second[1] > second[0]);
    }
}
