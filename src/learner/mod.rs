//! Inner learners.
//!
//! The reduction trains exactly one binary (or ranking) model and one optional
//! multi-class model on top of it. Both are injected as trait objects:
//!
//! - [`ScalarTrainer`] → [`ScalarPredictor`]: one score per feature vector
//! - [`VectorTrainer`] → [`VectorPredictor`]: one vector per feature vector
//!
//! Small reference learners are provided so the orchestration can be exercised
//! end to end: [`LogisticTrainer`], [`RankRegressionTrainer`] and
//! [`SoftmaxTrainer`].

mod linear;
mod softmax;

pub use linear::{LinearScorer, LogisticTrainer, RankRegressionTrainer};
pub use softmax::{SoftmaxModel, SoftmaxTrainer};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{ActiveColumns, DataView, Schema, VBuffer};
use crate::error::Result;
use crate::persist::{PersistError, SaveModel};

// =============================================================================
// PredictionKind
// =============================================================================

/// What a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionKind {
    BinaryClassification,
    Ranking,
    MulticlassClassification,
}

impl PredictionKind {
    /// Stable byte tag used in model streams.
    pub fn to_byte(self) -> u8 {
        match self {
            PredictionKind::BinaryClassification => 1,
            PredictionKind::MulticlassClassification => 2,
            PredictionKind::Ranking => 4,
        }
    }

    pub fn from_byte(tag: u8) -> std::result::Result<Self, PersistError> {
        match tag {
            1 => Ok(PredictionKind::BinaryClassification),
            2 => Ok(PredictionKind::MulticlassClassification),
            4 => Ok(PredictionKind::Ranking),
            other => Err(PersistError::CorruptPayload(format!(
                "unknown prediction kind tag {other}"
            ))),
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredictionKind::BinaryClassification => "binary classification",
            PredictionKind::Ranking => "ranking",
            PredictionKind::MulticlassClassification => "multiclass classification",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Predictor and trainer traits
// =============================================================================

/// A trained model producing one score per feature vector.
pub trait ScalarPredictor: SaveModel + Send + Sync + fmt::Debug {
    fn kind(&self) -> PredictionKind;

    /// Expected feature vector length.
    fn input_len(&self) -> usize;

    fn score(&self, features: &VBuffer) -> Result<f32>;
}

/// A trained model mapping a feature vector to an output vector.
pub trait VectorPredictor: SaveModel + Send + Sync + fmt::Debug {
    fn kind(&self) -> PredictionKind;

    /// Expected feature vector length.
    fn input_len(&self) -> usize;

    fn output_len(&self) -> usize;

    /// Write the prediction for `features` into `out`.
    fn map(&self, features: &VBuffer, out: &mut VBuffer) -> Result<()>;
}

/// Trains a [`ScalarPredictor`].
pub trait ScalarTrainer: Send + Sync {
    /// Kind of model this trainer produces.
    fn kind(&self) -> PredictionKind;

    fn train(&self, data: &RoleMappedData) -> Result<Box<dyn ScalarPredictor>>;
}

/// Trains a [`VectorPredictor`].
pub trait VectorTrainer: Send + Sync {
    fn train(&self, data: &RoleMappedData) -> Result<Box<dyn VectorPredictor>>;
}

// =============================================================================
// RoleMappedData
// =============================================================================

/// A view together with the columns playing each training role.
#[derive(Clone)]
pub struct RoleMappedData {
    pub view: Arc<dyn DataView>,
    pub features: usize,
    pub label: usize,
    pub weight: Option<usize>,
    pub group: Option<usize>,
}

impl fmt::Debug for RoleMappedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleMappedData")
            .field("schema", &self.view.schema().describe())
            .field("features", &self.features)
            .field("label", &self.label)
            .field("weight", &self.weight)
            .field("group", &self.group)
            .finish()
    }
}

impl RoleMappedData {
    /// Map the feature and label roles by column name.
    pub fn new(view: Arc<dyn DataView>, features: &str, label: &str) -> Result<Self> {
        let features = view.schema().require(features)?;
        let label = view.schema().require(label)?;
        Ok(Self {
            view,
            features,
            label,
            weight: None,
            group: None,
        })
    }

    pub fn with_weight(mut self, name: &str) -> Result<Self> {
        self.weight = Some(self.view.schema().require(name)?);
        Ok(self)
    }

    pub fn with_group(mut self, name: &str) -> Result<Self> {
        self.group = Some(self.view.schema().require(name)?);
        Ok(self)
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        self.view.schema()
    }

    pub fn column_name(&self, col: usize) -> &str {
        self.schema().column(col).map_or("", |c| c.name.as_str())
    }

    /// Length of the feature vectors; `0` when variable.
    pub fn feature_len(&self) -> usize {
        self.schema()
            .column_type(self.features)
            .map_or(0, |t| t.value_count())
    }

    fn active(&self) -> ActiveColumns {
        let mut cols = vec![self.features, self.label];
        cols.extend(self.weight);
        cols.extend(self.group);
        ActiveColumns::from_indices(self.schema().len(), cols)
    }

    /// Read every row into memory.
    pub fn collect(&self) -> Result<TrainingRows> {
        let mut rows = TrainingRows::default();
        let mut cursor = self.view.cursor(&self.active())?;
        while cursor.move_next()? {
            rows.features.push(cursor.vector(self.features)?);
            rows.labels.push(cursor.scalar(self.label)?.as_f32());
            rows.weights.push(cursor.weight(self.weight)?);
            if let Some(group) = self.group {
                let g = cursor.scalar(group)?;
                rows.groups.push(g.as_u64().unwrap_or(g.as_f32() as u64));
            }
        }
        Ok(rows)
    }
}

/// Rows read by [`RoleMappedData::collect`].
#[derive(Debug, Clone, Default)]
pub struct TrainingRows {
    pub features: Vec<VBuffer>,
    pub labels: Vec<f32>,
    pub weights: Vec<f32>,
    /// Group ids; empty without a group role.
    pub groups: Vec<u64>,
}

impl TrainingRows {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sum of the non-NaN weights.
    pub fn total_weight(&self) -> f32 {
        self.weights.iter().filter(|w| !w.is_nan()).sum()
    }

    /// Largest feature vector length seen.
    pub fn max_feature_len(&self) -> usize {
        self.features.iter().map(VBuffer::len).max().unwrap_or(0)
    }
}
