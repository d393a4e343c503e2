//! Multinomial logistic regression.
//!
//! Used as the reclassification model: it maps the per-class score vector of
//! the binary model to class probabilities.

use bon::Builder;
use ndarray::{Array2, ArrayView2};

use super::{PredictionKind, RoleMappedData, VectorPredictor, VectorTrainer};
use crate::data::VBuffer;
use crate::error::{ConfigError, DataError, Result};
use crate::persist::{
    ComponentCatalog, ModelLoadContext, ModelSaveContext, PersistError, SaveModel, VersionInfo,
};

const VERSION_INFO: VersionInfo = VersionInfo::new(*b"SOFTMAXM", 0x0001_0001, 0x0001_0001);

/// Softmax over `n_classes` linear outputs.
///
/// Weights are laid out `[n_features + 1, n_classes]`, feature-major with the
/// bias in the last row.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxModel {
    weights: Array2<f32>,
}

impl SoftmaxModel {
    pub const LOADER_SIGNATURE: &'static str = "SoftmaxModel";

    /// Model from a `[n_features + 1, n_classes]` weight matrix.
    pub fn new(weights: Array2<f32>) -> Self {
        Self { weights }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.weights.nrows().saturating_sub(1)
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.weights.view()
    }

    /// Raw per-class logits.
    fn logits(&self, features: &VBuffer, out: &mut [f32]) {
        let n_features = self.n_features();
        for (o, &b) in out.iter_mut().zip(self.weights.row(n_features)) {
            *o = b;
        }
        for (i, v) in features.iter_stored() {
            if i >= n_features {
                continue;
            }
            for (c, o) in out.iter_mut().enumerate() {
                *o += v * self.weights[[i, c]];
            }
        }
    }

    pub fn load_boxed(
        ctx: &mut ModelLoadContext<'_>,
        _catalog: &ComponentCatalog,
    ) -> Result<Box<dyn VectorPredictor>> {
        ctx.check_version_info(&VERSION_INFO)?;
        let rows = ctx.read_u32()? as usize;
        let cols = ctx.read_u32()? as usize;
        let flat = ctx.read_f32_array()?;
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
        Ok(Box::new(Self::new(weights)))
    }
}

/// Numerically stable in-place softmax.
pub(crate) fn softmax_inplace(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
}

impl SaveModel for SoftmaxModel {
    fn loader_signature(&self) -> &'static str {
        Self::LOADER_SIGNATURE
    }

    fn save(&self, ctx: &mut ModelSaveContext<'_>) -> Result<()> {
        ctx.set_version_info(&VERSION_INFO);
        ctx.write_u32(self.weights.nrows() as u32);
        ctx.write_u32(self.weights.ncols() as u32);
        let flat: Vec<f32> = self.weights.iter().copied().collect();
        ctx.write_f32_array(&flat);
        Ok(())
    }
}

impl VectorPredictor for SoftmaxModel {
    fn kind(&self) -> PredictionKind {
        PredictionKind::MulticlassClassification
    }

    fn input_len(&self) -> usize {
        self.n_features()
    }

    fn output_len(&self) -> usize {
        self.n_classes()
    }

    fn map(&self, features: &VBuffer, out: &mut VBuffer) -> Result<()> {
        out.reset_dense(self.n_classes());
        self.logits(features, out.values_mut());
        softmax_inplace(out.values_mut());
        Ok(())
    }
}

// =============================================================================
// SoftmaxTrainer
// =============================================================================

/// Multinomial logistic regression trained by full-batch gradient descent.
///
/// Labels are class indices stored as floats; the number of classes is the
/// largest label plus one.
#[derive(Debug, Clone, Builder)]
pub struct SoftmaxTrainer {
    #[builder(default = 200)]
    pub n_epochs: usize,

    #[builder(default = 0.5)]
    pub learning_rate: f32,

    #[builder(default = 1e-4)]
    pub lambda: f32,
}

impl Default for SoftmaxTrainer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl VectorTrainer for SoftmaxTrainer {
    fn train(&self, data: &RoleMappedData) -> Result<Box<dyn VectorPredictor>> {
        if self.n_epochs == 0 {
            return Err(ConfigError::InvalidParameter {
                field: "n_epochs",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        let rows = data.collect()?;
        let total = rows.total_weight();
        if rows.is_empty() || total <= 0.0 {
            return Err(DataError::EmptyView.into());
        }

        let mut targets = Vec::with_capacity(rows.len());
        for &label in &rows.labels {
            if label < 0.0 || label.is_nan() {
                return Err(DataError::NegativeLabel(label as i64).into());
            }
            targets.push(label as usize);
        }
        let n_classes = targets.iter().copied().max().unwrap_or(0) + 1;
        let n_features = data.feature_len().max(rows.max_feature_len());

        let mut model = SoftmaxModel::new(Array2::zeros((n_features + 1, n_classes)));
        let mut grad = Array2::<f32>::zeros((n_features + 1, n_classes));
        let mut probs = vec![0.0f32; n_classes];

        for _ in 0..self.n_epochs {
            grad.fill(0.0);
            for ((x, &target), &w) in rows.features.iter().zip(&targets).zip(&rows.weights) {
                if w.is_nan() || w == 0.0 {
                    continue;
                }
                model.logits(x, &mut probs);
                softmax_inplace(&mut probs);
                for (c, &p) in probs.iter().enumerate() {
                    let y = if c == target { 1.0 } else { 0.0 };
                    let g = w * (p - y);
                    for (i, v) in x.iter_stored() {
                        if i < n_features {
                            grad[[i, c]] += g * v;
                        }
                    }
                    grad[[n_features, c]] += g;
                }
            }
            let (lr, lambda) = (self.learning_rate, self.lambda);
            for ((i, c), wt) in model.weights.indexed_iter_mut() {
                let shrink = if i < n_features { lambda * *wt } else { 0.0 };
                *wt -= lr * (grad[[i, c]] / total + shrink);
            }
        }

        tracing::debug!(rows = rows.len(), n_features, n_classes, "trained softmax model");
        Ok(Box::new(model))
    }
}
