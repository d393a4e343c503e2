//! Multi-class predictor over a single binary or ranking model.
//!
//! The inner model scores `(features, class marker)` pairs. To predict, the
//! input vector is extended once with the marker slot(s), then the marker is
//! rewritten for each class in turn and the inner model scores the result.
//!
//! # Output layout
//!
//! - float labels: a vector of length `max_class_index + 1`, score of class `c`
//!   at index `c`, other positions zero
//! - other labels: one score per class, in sorted class order
//!
//! A reclassification model, when present, maps that score vector to the final
//! output.

use std::fmt;
use std::sync::Arc;

use crate::data::{DataKind, LabelValue, VBuffer};
use crate::error::{ConfigError, DataError, Result};
use crate::learner::{PredictionKind, ScalarPredictor, VectorPredictor};
use crate::persist::{
    ComponentCatalog, ModelLoadContext, ModelSaveContext, PersistError, SaveModel, VersionInfo,
};

const VERSION_INFO: VersionInfo = VersionInfo::new(*b"MULTI2BN", 0x0001_0001, 0x0001_0001);

/// Trailing check byte of a saved predictor.
const SENTINEL: u8 = 213;

const RECLASSIFICATION: &str = "Reclassification";

fn sub_model_name(i: usize) -> String {
    format!("M2B{i}")
}

fn kind_tag(kind: DataKind) -> Option<u8> {
    match kind {
        DataKind::F32 => Some(1),
        DataKind::U8 => Some(2),
        DataKind::U16 => Some(3),
        DataKind::U32 => Some(4),
        DataKind::Bool => Some(5),
        _ => None,
    }
}

fn kind_from_tag(tag: u8) -> std::result::Result<DataKind, PersistError> {
    match tag {
        1 => Ok(DataKind::F32),
        2 => Ok(DataKind::U8),
        3 => Ok(DataKind::U16),
        4 => Ok(DataKind::U32),
        5 => Ok(DataKind::Bool),
        _ => Err(PersistError::CorruptPayload(format!(
            "unknown label type tag {tag}"
        ))),
    }
}

/// Multi-class predictor wrapping one binary or ranking model.
#[derive(Clone)]
pub struct MultiToBinaryPredictor {
    predictor: Arc<dyn ScalarPredictor>,
    classes: Vec<LabelValue>,
    single_column: bool,
    /// Classes were key-encoded at training time; markers are shifted by one.
    label_key: bool,
    reclassification: Option<Arc<dyn VectorPredictor>>,
    markers: Vec<f32>,
    /// Width of the one-hot marker block.
    marker_len: usize,
}

impl fmt::Debug for MultiToBinaryPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiToBinaryPredictor")
            .field("classes", &self.class_string(","))
            .field("single_column", &self.single_column)
            .field("label_key", &self.label_key)
            .field("predictor", &self.predictor)
            .field("reclassification", &self.reclassification)
            .finish()
    }
}

impl MultiToBinaryPredictor {
    pub const LOADER_SIGNATURE: &'static str = "MultiToBinaryPredictor";

    /// Wrap `predictor`, trained on rows extended with the class marker.
    ///
    /// Classes are sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// - no class
    /// - classes of different kinds, or a missing value among them
    /// - a negative float class or one-hot marker
    pub fn new(
        predictor: Arc<dyn ScalarPredictor>,
        mut classes: Vec<LabelValue>,
        single_column: bool,
        label_key: bool,
    ) -> Result<Self> {
        classes.sort();
        classes.dedup();
        let first = *classes.first().ok_or(ConfigError::InvalidParameter {
            field: "classes",
            reason: "at least one class is required".into(),
        })?;
        let kind = first.kind();
        for class in &classes {
            if class.kind() != kind {
                return Err(DataError::MixedLabelKinds {
                    first: kind,
                    second: class.kind(),
                }
                .into());
            }
            if class.is_missing(label_key) {
                return Err(ConfigError::InvalidParameter {
                    field: "classes",
                    reason: format!("missing value {class} used as a class"),
                }
                .into());
            }
            if kind == DataKind::F32 && class.as_f32() < 0.0 {
                return Err(DataError::NegativeLabel(class.class_index()).into());
            }
        }

        let offset = if label_key { 1.0 } else { 0.0 };
        let markers: Vec<f32> = classes.iter().map(|c| c.as_f32() - offset).collect();
        let marker_len = if single_column {
            1
        } else {
            let mut max = 0usize;
            for (&m, class) in markers.iter().zip(&classes) {
                if m < 0.0 {
                    return Err(DataError::NegativeLabel(class.class_index()).into());
                }
                max = max.max(m as usize);
            }
            max + 1
        };

        Ok(Self {
            predictor,
            classes,
            single_column,
            label_key,
            reclassification: None,
            markers,
            marker_len,
        })
    }

    /// Post-process scores with a model mapping the score vector to the
    /// final output.
    pub fn with_reclassification(mut self, model: Arc<dyn VectorPredictor>) -> Result<Self> {
        let expected = self.score_len();
        if model.input_len() != expected {
            return Err(ConfigError::InvalidParameter {
                field: "reclassification",
                reason: format!(
                    "model reads {} inputs, scores have {expected}",
                    model.input_len()
                ),
            }
            .into());
        }
        self.reclassification = Some(model);
        Ok(self)
    }

    /// Mapper owning the scratch buffers of one inference thread.
    pub fn mapper(&self) -> ClassScoreMapper<'_> {
        ClassScoreMapper {
            predictor: self,
            scratch: VBuffer::default(),
            scores: VBuffer::default(),
        }
    }

    #[inline]
    pub fn classes(&self) -> &[LabelValue] {
        &self.classes
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Classes joined by `sep`, in class order.
    pub fn class_string(&self, sep: &str) -> String {
        self.classes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Largest class value as an index.
    pub fn max_class_index(&self) -> usize {
        self.classes
            .iter()
            .map(|c| c.class_index().max(0) as usize)
            .max()
            .unwrap_or(0)
    }

    #[inline]
    pub fn single_column(&self) -> bool {
        self.single_column
    }

    #[inline]
    pub fn label_key(&self) -> bool {
        self.label_key
    }

    #[inline]
    pub fn inner(&self) -> &Arc<dyn ScalarPredictor> {
        &self.predictor
    }

    #[inline]
    pub fn reclassification(&self) -> Option<&Arc<dyn VectorPredictor>> {
        self.reclassification.as_ref()
    }

    #[inline]
    pub fn prediction_kind(&self) -> PredictionKind {
        PredictionKind::MulticlassClassification
    }

    fn is_float(&self) -> bool {
        self.classes
            .first()
            .is_some_and(|c| c.kind() == DataKind::F32)
    }

    /// Length of the raw score vector.
    fn score_len(&self) -> usize {
        if self.is_float() {
            self.max_class_index() + 1
        } else {
            self.classes.len()
        }
    }

    /// Length of the vectors produced by [`ClassScoreMapper::map`].
    pub fn output_len(&self) -> usize {
        match &self.reclassification {
            Some(model) => model.output_len(),
            None => self.score_len(),
        }
    }

    /// Clamp negative scores to zero and rescale the rest to sum to one.
    ///
    /// Scores that are all non-positive are left at zero.
    pub fn normalize_scores(scores: &mut [f32]) {
        let mut sum = 0.0f64;
        for s in scores.iter_mut() {
            if *s >= 0.0 {
                sum += f64::from(*s);
            } else {
                *s = 0.0;
            }
        }
        if sum > 0.0 {
            for s in scores.iter_mut() {
                *s = (f64::from(*s) / sum) as f32;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    pub fn load(ctx: &mut ModelLoadContext<'_>, catalog: &ComponentCatalog) -> Result<Self> {
        ctx.check_version_info(&VERSION_INFO)?;
        let inner_kind = PredictionKind::from_byte(ctx.read_u8()?)?;
        let kind = kind_from_tag(ctx.read_u8()?)?;

        let indices = ctx.read_i32_array()?;
        let classes: Vec<LabelValue> = match kind {
            DataKind::F32 => {
                let values = ctx.read_f32_array()?;
                if values.len() != indices.len() {
                    return Err(PersistError::CorruptPayload(format!(
                        "{} class values for {} indices",
                        values.len(),
                        indices.len()
                    ))
                    .into());
                }
                values.into_iter().map(LabelValue::Float).collect()
            }
            _ => ctx
                .read_u32_array()?
                .into_iter()
                .map(|v| {
                    LabelValue::from_f32(kind, v as f32).ok_or_else(|| {
                        PersistError::CorruptPayload(format!("class {v} does not fit {kind}"))
                    })
                })
                .collect::<std::result::Result<_, _>>()?,
        };

        let single_column = ctx.read_bool_i32()?;
        let label_key = ctx.read_bool_i32()?;
        let n_predictors = ctx.read_i32()?;
        if n_predictors != 1 {
            return Err(PersistError::CorruptPayload(format!(
                "expected one inner model, found {n_predictors}"
            ))
            .into());
        }
        let predictor: Arc<dyn ScalarPredictor> =
            Arc::from(catalog.load_scalar(ctx, &sub_model_name(0))?);
        if predictor.kind() != inner_kind {
            return Err(PersistError::CorruptPayload(format!(
                "inner model is {}, header says {inner_kind}",
                predictor.kind()
            ))
            .into());
        }
        let has_reclassification = ctx.read_u8()? != 0;
        let reclassification = if has_reclassification {
            Some(Arc::from(catalog.load_vector(ctx, RECLASSIFICATION)?))
        } else {
            None
        };
        let found = ctx.read_u8()?;
        if found != SENTINEL {
            return Err(PersistError::BadSentinel { found }.into());
        }

        let mut model = Self::new(predictor, classes, single_column, label_key)?;
        if let Some(r) = reclassification {
            model = model.with_reclassification(r)?;
        }
        tracing::debug!(classes = model.n_classes(), "loaded multi-class predictor");
        Ok(model)
    }

    pub fn load_boxed(
        ctx: &mut ModelLoadContext<'_>,
        catalog: &ComponentCatalog,
    ) -> Result<Box<dyn VectorPredictor>> {
        Ok(Box::new(Self::load(ctx, catalog)?))
    }
}

impl SaveModel for MultiToBinaryPredictor {
    fn loader_signature(&self) -> &'static str {
        Self::LOADER_SIGNATURE
    }

    fn save(&self, ctx: &mut ModelSaveContext<'_>) -> Result<()> {
        let kind = self
            .classes
            .first()
            .map(LabelValue::kind)
            .unwrap_or(DataKind::F32);
        let tag = kind_tag(kind).ok_or_else(|| {
            PersistError::CorruptPayload(format!("{kind} is not a label type"))
        })?;

        ctx.set_version_info(&VERSION_INFO);
        ctx.write_u8(self.predictor.kind().to_byte());
        ctx.write_u8(tag);
        if kind == DataKind::F32 {
            let indices: Vec<i32> = self.classes.iter().map(|c| c.class_index() as i32).collect();
            let values: Vec<f32> = self.classes.iter().map(LabelValue::as_f32).collect();
            ctx.write_i32_array(&indices);
            ctx.write_f32_array(&values);
        } else {
            let values: Vec<u32> = self.classes.iter().map(|c| c.class_index() as u32).collect();
            ctx.write_i32_array(&[]);
            ctx.write_u32_array(&values);
        }
        ctx.write_bool_i32(self.single_column);
        ctx.write_bool_i32(self.label_key);
        ctx.write_i32(1);
        ctx.save_model(&*self.predictor, &sub_model_name(0))?;
        match &self.reclassification {
            Some(model) => {
                ctx.write_u8(1);
                ctx.save_model(&**model, RECLASSIFICATION)?;
            }
            None => ctx.write_u8(0),
        }
        ctx.write_u8(SENTINEL);
        Ok(())
    }
}

impl VectorPredictor for MultiToBinaryPredictor {
    fn kind(&self) -> PredictionKind {
        self.prediction_kind()
    }

    /// Declared input length of the inner model minus the marker block;
    /// `0` when the inner model does not fix its input length.
    fn input_len(&self) -> usize {
        self.predictor.input_len().saturating_sub(self.marker_len)
    }

    fn output_len(&self) -> usize {
        MultiToBinaryPredictor::output_len(self)
    }

    fn map(&self, features: &VBuffer, out: &mut VBuffer) -> Result<()> {
        self.mapper().map(features, out)
    }
}

// =============================================================================
// ClassScoreMapper
// =============================================================================

/// Scores every class of a [`MultiToBinaryPredictor`] for one input at a time.
///
/// The mapper owns its scratch buffers, so one mapper per thread reuses its
/// allocations across calls.
pub struct ClassScoreMapper<'a> {
    predictor: &'a MultiToBinaryPredictor,
    scratch: VBuffer,
    scores: VBuffer,
}

impl ClassScoreMapper<'_> {
    /// Score every class for `src` and write the output into `dst`.
    pub fn map(&mut self, src: &VBuffer, dst: &mut VBuffer) -> Result<()> {
        let model = self.predictor;
        self.scores.reset_dense(model.score_len());

        let consistent = src.is_dense() || src.indices().is_some();
        if !consistent && src.count() > 0 {
            return Err(DataError::SparseWithoutIndices.into());
        }
        if consistent {
            self.score_classes(src)?;
        }

        match &model.reclassification {
            Some(reclass) => reclass.map(&self.scores, dst),
            None => {
                dst.assign_dense_extended(self.scores.values(), 0);
                Ok(())
            }
        }
    }

    fn score_classes(&mut self, src: &VBuffer) -> Result<()> {
        let model = self.predictor;
        let base = src.len();
        let extra = model.marker_len;
        match src.indices() {
            None => self.scratch.assign_dense_extended(src.values(), extra),
            Some(indices) => {
                self.scratch
                    .assign_sparse_extended(indices, src.values(), base + extra, base)
            }
        }

        let float = model.is_float();
        for (i, (&marker, class)) in model.markers.iter().zip(&model.classes).enumerate() {
            let slot = if model.single_column {
                base
            } else {
                base + marker as usize
            };
            let value = if model.single_column { marker } else { 1.0 };
            self.set_marker(slot, value);
            let score = model.predictor.score(&self.scratch)?;
            if !model.single_column {
                self.set_marker(slot, 0.0);
            }
            let at = if float { class.class_index() as usize } else { i };
            self.scores.values_mut()[at] = score;
        }
        Ok(())
    }

    /// Write `value` at marker position `slot` of the scratch vector.
    fn set_marker(&mut self, slot: usize, value: f32) {
        if self.scratch.indices().is_some() {
            if let Some(index) = self.scratch.last_index_mut() {
                *index = slot;
            }
            if let Some(v) = self.scratch.values_mut().last_mut() {
                *v = value;
            }
        } else if let Some(v) = self.scratch.values_mut().get_mut(slot) {
            *v = value;
        }
    }
}
