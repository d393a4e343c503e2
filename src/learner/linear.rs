//! Linear scorers and their trainers.
//!
//! Both trainers run full-batch gradient descent with L2 shrinkage on a
//! weighted loss:
//!
//! - [`LogisticTrainer`]: logistic loss, gradient `σ(pred) - y`
//! - [`RankRegressionTrainer`]: squared loss on the rank value, gradient `pred - y`
//!
//! The result is a [`LinearScorer`]: `score(x) = w · x + b`.

use bon::Builder;
use ndarray::{Array1, ArrayView1};

use super::{PredictionKind, RoleMappedData, ScalarPredictor, ScalarTrainer, TrainingRows};
use crate::data::VBuffer;
use crate::error::{ConfigError, DataError, Result};
use crate::persist::{ComponentCatalog, ModelLoadContext, ModelSaveContext, SaveModel, VersionInfo};

// =============================================================================
// LinearScorer
// =============================================================================

const VERSION_INFO: VersionInfo = VersionInfo::new(*b"LINSCORE", 0x0001_0001, 0x0001_0001);

/// Linear model: weights plus bias.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScorer {
    weights: Array1<f32>,
    bias: f32,
    kind: PredictionKind,
}

impl LinearScorer {
    pub const LOADER_SIGNATURE: &'static str = "LinearScorer";

    pub fn new(weights: Array1<f32>, bias: f32, kind: PredictionKind) -> Self {
        Self {
            weights,
            bias,
            kind,
        }
    }

    #[inline]
    pub fn weights(&self) -> ArrayView1<'_, f32> {
        self.weights.view()
    }

    #[inline]
    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn load(
        ctx: &mut ModelLoadContext<'_>,
        _catalog: &ComponentCatalog,
    ) -> Result<Box<dyn ScalarPredictor>> {
        ctx.check_version_info(&VERSION_INFO)?;
        let kind = PredictionKind::from_byte(ctx.read_u8()?)?;
        let weights = ctx.read_f32_array()?;
        let bias = ctx.read_f32()?;
        Ok(Box::new(Self::new(Array1::from(weights), bias, kind)))
    }
}

impl SaveModel for LinearScorer {
    fn loader_signature(&self) -> &'static str {
        Self::LOADER_SIGNATURE
    }

    fn save(&self, ctx: &mut ModelSaveContext<'_>) -> Result<()> {
        ctx.set_version_info(&VERSION_INFO);
        ctx.write_u8(self.kind.to_byte());
        ctx.write_f32_array(&self.weights.to_vec());
        ctx.write_f32(self.bias);
        Ok(())
    }
}

impl ScalarPredictor for LinearScorer {
    fn kind(&self) -> PredictionKind {
        self.kind
    }

    fn input_len(&self) -> usize {
        self.weights.len()
    }

    fn score(&self, features: &VBuffer) -> Result<f32> {
        if features.len() != self.weights.len() {
            return Err(DataError::VectorLength {
                expected: self.weights.len(),
                actual: features.len(),
            }
            .into());
        }
        Ok(features.dot(self.weights.view()) + self.bias)
    }
}

// =============================================================================
// Gradient descent
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum LinearLoss {
    Logistic,
    Squared,
}

impl LinearLoss {
    #[inline]
    fn gradient(self, pred: f32, target: f32) -> f32 {
        match self {
            LinearLoss::Logistic => sigmoid(pred) - target,
            LinearLoss::Squared => pred - target,
        }
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

struct DescentParams {
    n_epochs: usize,
    learning_rate: f32,
    lambda: f32,
}

fn fit_linear(
    rows: &TrainingRows,
    n_features: usize,
    loss: LinearLoss,
    params: &DescentParams,
) -> Result<(Array1<f32>, f32)> {
    let total = rows.total_weight();
    if rows.is_empty() || total <= 0.0 {
        return Err(DataError::EmptyView.into());
    }

    let mut weights = Array1::<f32>::zeros(n_features);
    let mut bias = 0.0f32;
    let mut grad = Array1::<f32>::zeros(n_features);

    for _ in 0..params.n_epochs {
        grad.fill(0.0);
        let mut grad_bias = 0.0f32;
        for ((x, &y), &w) in rows.features.iter().zip(&rows.labels).zip(&rows.weights) {
            if w.is_nan() || w == 0.0 {
                continue;
            }
            let pred = x.dot(weights.view()) + bias;
            let g = w * loss.gradient(pred, y);
            for (i, v) in x.iter_stored() {
                if i < n_features {
                    grad[i] += g * v;
                }
            }
            grad_bias += g;
        }
        weights.zip_mut_with(&grad, |wt, &g| {
            *wt -= params.learning_rate * (g / total + params.lambda * *wt);
        });
        bias -= params.learning_rate * grad_bias / total;
    }
    Ok((weights, bias))
}

// =============================================================================
// LogisticTrainer
// =============================================================================

/// Binary logistic regression.
///
/// Labels are read as `f32`; `true`/`1.0` is the positive class.
#[derive(Debug, Clone, Builder)]
pub struct LogisticTrainer {
    /// Passes over the data. Default: 100.
    #[builder(default = 100)]
    pub n_epochs: usize,

    /// Step size. Default: 0.5.
    #[builder(default = 0.5)]
    pub learning_rate: f32,

    /// L2 regularization. Default: 1e-4.
    #[builder(default = 1e-4)]
    pub lambda: f32,
}

impl Default for LogisticTrainer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScalarTrainer for LogisticTrainer {
    fn kind(&self) -> PredictionKind {
        PredictionKind::BinaryClassification
    }

    fn train(&self, data: &RoleMappedData) -> Result<Box<dyn ScalarPredictor>> {
        validate_descent(self.n_epochs, self.learning_rate)?;
        let rows = data.collect()?;
        let n_features = data.feature_len().max(rows.max_feature_len());
        let params = DescentParams {
            n_epochs: self.n_epochs,
            learning_rate: self.learning_rate,
            lambda: self.lambda,
        };
        let (weights, bias) = fit_linear(&rows, n_features, LinearLoss::Logistic, &params)?;
        tracing::debug!(rows = rows.len(), n_features, "trained logistic scorer");
        Ok(Box::new(LinearScorer::new(
            weights,
            bias,
            PredictionKind::BinaryClassification,
        )))
    }
}

// =============================================================================
// RankRegressionTrainer
// =============================================================================

/// Pointwise ranker: least squares on the relevance value.
///
/// Requires a group column; groups only delimit queries and do not change the
/// pointwise loss.
#[derive(Debug, Clone, Builder)]
pub struct RankRegressionTrainer {
    #[builder(default = 100)]
    pub n_epochs: usize,

    #[builder(default = 0.05)]
    pub learning_rate: f32,

    #[builder(default = 1e-4)]
    pub lambda: f32,
}

impl Default for RankRegressionTrainer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScalarTrainer for RankRegressionTrainer {
    fn kind(&self) -> PredictionKind {
        PredictionKind::Ranking
    }

    fn train(&self, data: &RoleMappedData) -> Result<Box<dyn ScalarPredictor>> {
        if data.group.is_none() {
            return Err(ConfigError::MissingRole {
                trainer: "RankRegressionTrainer",
                role: "group",
            }
            .into());
        }
        validate_descent(self.n_epochs, self.learning_rate)?;
        let rows = data.collect()?;
        let n_features = data.feature_len().max(rows.max_feature_len());
        let params = DescentParams {
            n_epochs: self.n_epochs,
            learning_rate: self.learning_rate,
            lambda: self.lambda,
        };
        let (weights, bias) = fit_linear(&rows, n_features, LinearLoss::Squared, &params)?;
        let n_groups = rows.groups.windows(2).filter(|w| w[0] != w[1]).count() + 1;
        tracing::debug!(rows = rows.len(), n_groups, "trained rank regression scorer");
        Ok(Box::new(LinearScorer::new(weights, bias, PredictionKind::Ranking)))
    }
}

fn validate_descent(n_epochs: usize, learning_rate: f32) -> Result<()> {
    if n_epochs == 0 {
        return Err(ConfigError::InvalidParameter {
            field: "n_epochs",
            reason: "must be at least 1".into(),
        }
        .into());
    }
    if !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(ConfigError::InvalidParameter {
            field: "learning_rate",
            reason: format!("must be positive, got {learning_rate}"),
        }
        .into());
    }
    Ok(())
}
