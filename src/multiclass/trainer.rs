//! Training a multi-class predictor through one binary or ranking model.

use std::sync::Arc;

use super::config::{LabelOutput, MultiplicationAlgorithm, ReductionConfig, Verbosity};
use super::predictor::MultiToBinaryPredictor;
use super::transform::{MultiToBinaryTransform, TransformArgs};
use crate::data::{ColumnType, DataKind, DataView, LabelValue, Schema};
use crate::error::{ConfigError, DataError, Result};
use crate::learner::{PredictionKind, RoleMappedData, ScalarPredictor, ScalarTrainer, VectorTrainer};
use crate::transforms::{
    ConcatTransform, ConvertColumn, ConvertTransform, GroupIdTransform, NaFilter, ScoreTransform,
};

/// Reduces a multi-class problem to a single binary (or ranking) problem.
///
/// Training chains lazy views over the input:
///
/// 1. drop rows with a missing label (when `drop_na_label`)
/// 2. convert a non-float label to `f32`, keys becoming 0-based class indices
/// 3. for `Ranking`, number the base rows to form one query group per row
/// 4. multiply every row once per candidate class
/// 5. append the class to the features, as one slot or as a one-hot block
///
/// The inner trainer runs once on the result. An optional reclassification
/// trainer then learns to map the per-class score vector back to the label.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use multiclass_reduce::data::InMemoryView;
/// use multiclass_reduce::learner::{LogisticTrainer, RoleMappedData};
/// use multiclass_reduce::multiclass::{MultiToBinaryTrainer, ReductionConfig};
/// use ndarray::array;
///
/// let view = InMemoryView::builder()
///     .add_dense("Features", array![[0.0], [1.0], [2.0], [0.1], [1.1], [2.1]].view())
///     .add_f32("Label", array![0.0, 1.0, 2.0, 0.0, 1.0, 2.0].view())
///     .build()
///     .unwrap();
/// let data = RoleMappedData::new(Arc::new(view), "Features", "Label").unwrap();
///
/// let trainer = MultiToBinaryTrainer::new(
///     ReductionConfig::default(),
///     Arc::new(LogisticTrainer::default()),
/// )
/// .unwrap();
/// let model = trainer.train(&data).unwrap();
/// assert_eq!(model.n_classes(), 3);
/// ```
pub struct MultiToBinaryTrainer {
    config: ReductionConfig,
    trainer: Arc<dyn ScalarTrainer>,
    reclassification: Option<Arc<dyn VectorTrainer>>,
}

impl MultiToBinaryTrainer {
    /// # Errors
    ///
    /// - invalid configuration
    /// - `trainer` is not a ranking trainer under `Ranking`, or not a binary
    ///   classifier otherwise
    pub fn new(config: ReductionConfig, trainer: Arc<dyn ScalarTrainer>) -> Result<Self> {
        config.validate()?;
        let expected = match config.algorithm {
            MultiplicationAlgorithm::Ranking => PredictionKind::Ranking,
            _ => PredictionKind::BinaryClassification,
        };
        if trainer.kind() != expected {
            return Err(ConfigError::InvalidParameter {
                field: "trainer",
                reason: format!(
                    "{:?} requires a {expected} trainer, got {}",
                    config.algorithm,
                    trainer.kind()
                ),
            }
            .into());
        }
        Ok(Self {
            config,
            trainer,
            reclassification: None,
        })
    }

    /// Train a model mapping the class scores to the label after the inner
    /// model is trained.
    pub fn with_reclassification(mut self, trainer: Arc<dyn VectorTrainer>) -> Self {
        self.reclassification = Some(trainer);
        self
    }

    #[inline]
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn train(&self, data: &RoleMappedData) -> Result<MultiToBinaryPredictor> {
        let config = &self.config;
        let label_name = data.column_name(data.label).to_string();
        let features_name = data.column_name(data.features).to_string();
        let weight_name = data.weight.map(|w| data.column_name(w).to_string());

        let label_ty = data
            .schema()
            .column_type(data.label)
            .ok_or(DataError::ColumnOutOfRange(data.label))?;
        let label_kind = match label_ty.kind() {
            Some(kind) if kind.is_label_kind() => kind,
            _ => {
                return Err(ConfigError::UnsupportedLabelType {
                    column: label_name,
                    ty: label_ty,
                }
                .into())
            }
        };
        let label_key = label_ty.is_key();

        let mut view = Arc::clone(&data.view);
        if config.drop_na_label {
            view = Arc::new(NaFilter::new(view, &label_name)?);
        }
        if label_kind != DataKind::F32 {
            view = Arc::new(ConvertTransform::new(
                view,
                vec![ConvertColumn::in_place(label_name.as_str(), ColumnType::f32())],
            )?);
        }
        let base = Arc::clone(&view);

        let group_name = if config.algorithm == MultiplicationAlgorithm::Ranking {
            let name = temp_name(view.schema(), "GroupId");
            view = Arc::new(GroupIdTransform::new(view, &name)?);
            Some(name)
        } else {
            None
        };

        let label_output = if config.single_column {
            LabelOutput::Float
        } else {
            LabelOutput::OneHot
        };
        let mut args =
            TransformArgs::new(label_name.as_str(), config.clone()).with_label_output(label_output);
        if let Some(w) = &weight_name {
            args = args.with_weight(w.as_str());
        }
        let multiplied = Arc::new(MultiToBinaryTransform::new(view, args)?);
        let policy = multiplied.policy()?;
        if config.verbosity >= Verbosity::Info {
            tracing::info!(
                classes = policy.classes().len(),
                rows = policy.histogram().n_rows(),
                max_replica = policy.max_replica(),
                "multiplying training rows"
            );
        }
        if policy.classes().len() < 2 && config.verbosity >= Verbosity::Warning {
            tracing::warn!("training data holds a single class");
        }

        let features_tmp = temp_name(multiplied.schema(), "Features");
        let concat = ConcatTransform::new(
            Arc::clone(&multiplied) as Arc<dyn DataView>,
            &features_tmp,
            &[features_name.as_str(), label_name.as_str()],
        )?;
        let mut roles = RoleMappedData::new(Arc::new(concat), &features_tmp, &config.new_column)?;
        if let Some(w) = &weight_name {
            roles = roles.with_weight(w)?;
        }
        if let Some(g) = &group_name {
            roles = roles.with_group(g)?;
        }

        if config.verbosity >= Verbosity::Info {
            tracing::info!(kind = %self.trainer.kind(), "training inner model");
        }
        let inner: Arc<dyn ScalarPredictor> = Arc::from(self.trainer.train(&roles)?);

        let offset = if label_key { 1.0 } else { 0.0 };
        let classes = policy
            .classes()
            .iter()
            .map(|c| {
                LabelValue::from_f32(label_kind, c.as_f32() + offset)
                    .ok_or_else(|| DataError::UnknownLabel(c.to_string()).into())
            })
            .collect::<Result<Vec<_>>>()?;
        let mut predictor =
            MultiToBinaryPredictor::new(inner, classes, config.single_column, label_key)?;

        if let Some(trainer) = &self.reclassification {
            // Missing labels are still present here unless dropped upstream.
            let base: Arc<dyn DataView> = if config.drop_na_label {
                base
            } else {
                Arc::new(NaFilter::new(base, &label_name)?)
            };
            let score_name = temp_name(base.schema(), "Score");
            let scored = ScoreTransform::new(
                base,
                &features_name,
                &score_name,
                Arc::new(predictor.clone()),
            )?;
            let mut roles = RoleMappedData::new(Arc::new(scored), &score_name, &label_name)?;
            if let Some(w) = &weight_name {
                roles = roles.with_weight(w)?;
            }
            if config.verbosity >= Verbosity::Info {
                tracing::info!("training reclassification model");
            }
            predictor = predictor.with_reclassification(Arc::from(trainer.train(&roles)?))?;
        }

        if config.verbosity >= Verbosity::Info {
            tracing::info!(classes = %predictor.class_string(","), "training done");
        }
        Ok(predictor)
    }
}

/// A column name of the form `__{stem}_{i}` absent from `schema`.
fn temp_name(schema: &Schema, stem: &str) -> String {
    (0..)
        .map(|i| format!("__{stem}_{i}"))
        .find(|name| schema.index_of(name).is_none())
        .unwrap_or_else(|| format!("__{stem}"))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::data::{InMemoryView, KeyRange, VBuffer};
    use crate::learner::{LogisticTrainer, RankRegressionTrainer, SoftmaxTrainer};

    fn separable() -> RoleMappedData {
        let view = InMemoryView::builder()
            .add_dense(
                "Features",
                array![
                    [1.0, 0.0, 0.0],
                    [0.0, 1.0, 0.0],
                    [0.0, 0.0, 1.0],
                    [0.9, 0.1, 0.0],
                    [0.1, 0.9, 0.0],
                    [0.0, 0.1, 0.9],
                ]
                .view(),
            )
            .add_key_u32("Label", vec![1, 2, 3, 1, 2, 3], KeyRange::new(3))
            .build()
            .unwrap();
        RoleMappedData::new(Arc::new(view), "Features", "Label").unwrap()
    }

    #[test]
    fn test_rejects_mismatched_trainer() {
        let config = ReductionConfig::builder()
            .algorithm(MultiplicationAlgorithm::Ranking)
            .build()
            .unwrap();
        let err = MultiToBinaryTrainer::new(config, Arc::new(LogisticTrainer::default()))
            .err()
            .unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_key_labels_round_trip_to_classes() {
        let trainer = MultiToBinaryTrainer::new(
            ReductionConfig::default(),
            Arc::new(LogisticTrainer::default()),
        )
        .unwrap();
        let model = trainer.train(&separable()).unwrap();
        assert_eq!(
            model.classes(),
            &[LabelValue::U32(1), LabelValue::U32(2), LabelValue::U32(3)]
        );
        assert!(model.label_key());
        assert_eq!(model.output_len(), 3);
        assert_eq!(model.inner().input_len(), 4);
    }

    #[test]
    fn test_one_hot_layout() {
        let config = ReductionConfig::builder().single_column(false).build().unwrap();
        let trainer =
            MultiToBinaryTrainer::new(config, Arc::new(LogisticTrainer::default())).unwrap();
        let model = trainer.train(&separable()).unwrap();
        // three features followed by markers 0..=2
        assert_eq!(model.inner().input_len(), 6);

        let mut out = VBuffer::default();
        model
            .mapper()
            .map(&VBuffer::dense(vec![0.0, 0.0, 1.0]), &mut out)
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_ranking() {
        let config = ReductionConfig::builder()
            .algorithm(MultiplicationAlgorithm::Ranking)
            .build()
            .unwrap();
        let trainer =
            MultiToBinaryTrainer::new(config, Arc::new(RankRegressionTrainer::default())).unwrap();
        let model = trainer.train(&separable()).unwrap();
        assert_eq!(model.inner().kind(), PredictionKind::Ranking);
        assert_eq!(model.n_classes(), 3);
    }

    #[test]
    fn test_reclassification() {
        let trainer = MultiToBinaryTrainer::new(
            ReductionConfig::default(),
            Arc::new(LogisticTrainer::default()),
        )
        .unwrap()
        .with_reclassification(Arc::new(SoftmaxTrainer::default()));
        let model = trainer.train(&separable()).unwrap();
        let reclass = model.reclassification().unwrap();
        assert_eq!(reclass.input_len(), 3);
        assert_eq!(model.output_len(), 3);
    }

    #[test]
    fn test_reclassification_with_missing_labels_kept() {
        let view = InMemoryView::builder()
            .add_dense("Features", array![[1.0, 0.0], [0.0, 1.0], [0.5, 0.5], [0.9, 0.1]].view())
            .add_key_u32("Label", vec![1, 2, 0, 1], KeyRange::new(2))
            .build()
            .unwrap();
        let data = RoleMappedData::new(Arc::new(view), "Features", "Label").unwrap();
        let config = ReductionConfig::builder().drop_na_label(false).build().unwrap();
        let trainer = MultiToBinaryTrainer::new(config, Arc::new(LogisticTrainer::default()))
            .unwrap()
            .with_reclassification(Arc::new(SoftmaxTrainer::default()));

        let model = trainer.train(&data).unwrap();
        assert_eq!(model.classes(), &[LabelValue::U32(1), LabelValue::U32(2)]);
        assert!(model.reclassification().is_some());

        let mut out = VBuffer::default();
        model
            .mapper()
            .map(&VBuffer::dense(vec![0.2, 0.8]), &mut out)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.values().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_all_labels_missing() {
        let view = InMemoryView::builder()
            .add_dense("Features", array![[1.0], [2.0]].view())
            .add_f32("Label", array![f32::NAN, f32::NAN].view())
            .build()
            .unwrap();
        let data = RoleMappedData::new(Arc::new(view), "Features", "Label").unwrap();
        let trainer = MultiToBinaryTrainer::new(
            ReductionConfig::default(),
            Arc::new(LogisticTrainer::default()),
        )
        .unwrap();
        let err = trainer.train(&data).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn test_temp_name_skips_taken() {
        let schema = Schema::new(vec![crate::data::Column::new("__Score_0", ColumnType::f32())]);
        assert_eq!(temp_name(&schema, "Score"), "__Score_1");
    }
}
