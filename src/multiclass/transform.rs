//! The multiplied view.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::config::{LabelOutput, ReductionConfig};
use super::cursor::{CursorLayout, MultiplyingCursor};
use super::histogram::LabelHistogram;
use super::replication::{partition_rng, DerivedLabel, ReplicationPolicy};
use crate::data::{ActiveColumns, BoxedCursor, Column, ColumnType, DataView, LabelValue, Schema};
use crate::error::{ConfigError, DataError, Result};
use crate::persist::{ModelLoadContext, ModelSaveContext, PersistError, SaveModel, VersionInfo};

const VERSION_INFO: VersionInfo = VersionInfo::new(*b"MULTBINT", 0x0001_0001, 0x0001_0001);

/// Arguments of a [`MultiToBinaryTransform`], persisted with the transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformArgs {
    /// Label column name.
    pub label: String,
    /// Optional weight column name.
    pub weight: Option<String>,
    pub label_output: LabelOutput,
    pub config: ReductionConfig,
}

impl TransformArgs {
    pub fn new(label: impl Into<String>, config: ReductionConfig) -> Self {
        Self {
            label: label.into(),
            weight: None,
            label_output: LabelOutput::Native,
            config,
        }
    }

    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    pub fn with_label_output(mut self, label_output: LabelOutput) -> Self {
        self.label_output = label_output;
        self
    }
}

/// A view emitting each row of its source once per class copy.
///
/// Every output row carries one candidate class in the label column and a
/// derived label saying whether that class is the true one (or its rank
/// relevance) in an appended column named by `config.new_column`.
///
/// The class histogram is built by a full scan the first time a cursor is
/// requested, and reused afterwards.
pub struct MultiToBinaryTransform {
    source: Arc<dyn DataView>,
    args: TransformArgs,
    label: usize,
    weight: Option<usize>,
    is_key: bool,
    schema: Schema,
    policy: Mutex<Option<Arc<ReplicationPolicy>>>,
}

impl MultiToBinaryTransform {
    pub fn new(source: Arc<dyn DataView>, args: TransformArgs) -> Result<Self> {
        args.config.validate()?;
        let src = source.schema();
        let label = src.require(&args.label)?;
        let label_ty = src
            .column_type(label)
            .ok_or(DataError::ColumnOutOfRange(label))?;
        if !label_ty.kind().is_some_and(|k| k.is_label_kind()) {
            return Err(ConfigError::UnsupportedLabelType {
                column: args.label.clone(),
                ty: label_ty,
            }
            .into());
        }
        let weight = args
            .weight
            .as_deref()
            .map(|w| src.require(w))
            .transpose()?;
        if src.index_of(&args.config.new_column).is_some() {
            return Err(ConfigError::DuplicateColumn(args.config.new_column.clone()).into());
        }

        let out_label_ty = match args.label_output {
            LabelOutput::Native => label_ty,
            LabelOutput::Float => ColumnType::f32(),
            // Length is only known once the histogram is built.
            LabelOutput::OneHot => ColumnType::vector(0),
        };
        let schema = src
            .with_replaced(label, Column::new(args.label.clone(), out_label_ty))
            .with_column(Column::new(
                args.config.new_column.clone(),
                DerivedLabel::column_type(args.config.algorithm),
            ));

        Ok(Self {
            is_key: label_ty.is_key(),
            source,
            args,
            label,
            weight,
            schema,
            policy: Mutex::new(None),
        })
    }

    #[inline]
    pub fn args(&self) -> &TransformArgs {
        &self.args
    }

    #[inline]
    pub fn source(&self) -> &Arc<dyn DataView> {
        &self.source
    }

    /// Index of the derived label column.
    #[inline]
    pub fn derived_column(&self) -> usize {
        self.schema.len() - 1
    }

    /// Whether the histogram has been built.
    pub fn is_built(&self) -> bool {
        self.policy.lock().is_some()
    }

    /// Replication policy, scanning the source on first use.
    pub fn policy(&self) -> Result<Arc<ReplicationPolicy>> {
        let mut slot = self.policy.lock();
        if let Some(policy) = slot.as_ref() {
            return Ok(Arc::clone(policy));
        }
        let histogram = LabelHistogram::build(
            &*self.source,
            self.label,
            self.weight,
            self.args.config.n_threads,
        )?;
        let policy = Arc::new(self.finalize(histogram)?);
        *slot = Some(Arc::clone(&policy));
        Ok(policy)
    }

    /// Sorted class set.
    pub fn classes(&self) -> Result<Vec<LabelValue>> {
        Ok(self.policy()?.classes().to_vec())
    }

    fn finalize(&self, histogram: LabelHistogram) -> Result<ReplicationPolicy> {
        ReplicationPolicy::finalize(
            histogram,
            self.args.config.max_multi,
            self.args.config.algorithm,
        )
    }

    fn layout(&self, policy: &ReplicationPolicy) -> Result<CursorLayout> {
        let label_len = match self.args.label_output {
            LabelOutput::OneHot => policy.label_vector_len()?,
            _ => 0,
        };
        Ok(CursorLayout {
            label: self.label,
            derived: self.derived_column(),
            label_output: self.args.label_output,
            is_key: self.is_key,
            label_len,
        })
    }

    fn input_active(&self, active: &ActiveColumns) -> ActiveColumns {
        let mut input = active.restrict(self.source.schema().len());
        input.insert(self.label);
        if let Some(w) = self.weight {
            input.insert(w);
        }
        input
    }

    fn wrap<'a>(
        &'a self,
        input: BoxedCursor<'a>,
        policy: &Arc<ReplicationPolicy>,
        layout: CursorLayout,
        active: &ActiveColumns,
        partition: usize,
    ) -> BoxedCursor<'a> {
        Box::new(MultiplyingCursor::new(
            input,
            &self.schema,
            Arc::clone(policy),
            layout,
            active.restrict(self.schema.len()),
            partition_rng(self.args.config.seed, partition),
        ))
    }

    /// Restore a saved transform over `source`.
    pub fn load(ctx: &mut ModelLoadContext<'_>, source: Arc<dyn DataView>) -> Result<Self> {
        ctx.check_version_info(&VERSION_INFO)?;
        let args: TransformArgs = postcard::from_bytes(ctx.read_bytes()?)
            .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
        let transform = Self::new(source, args)?;
        if ctx.read_bool_i32()? {
            let histogram: LabelHistogram = postcard::from_bytes(ctx.read_bytes()?)
                .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
            let policy = transform.finalize(histogram)?;
            *transform.policy.lock() = Some(Arc::new(policy));
        }
        Ok(transform)
    }
}

impl SaveModel for MultiToBinaryTransform {
    fn loader_signature(&self) -> &'static str {
        "MultiToBinaryTransform"
    }

    fn save(&self, ctx: &mut ModelSaveContext<'_>) -> Result<()> {
        ctx.set_version_info(&VERSION_INFO);
        let args = postcard::to_allocvec(&self.args)
            .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
        ctx.write_bytes(&args);
        let policy = self.policy.lock().clone();
        match policy {
            Some(policy) => {
                ctx.write_bool_i32(true);
                let histogram = postcard::to_allocvec(policy.histogram())
                    .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
                ctx.write_bytes(&histogram);
            }
            None => ctx.write_bool_i32(false),
        }
        Ok(())
    }
}

impl DataView for MultiToBinaryTransform {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> Option<usize> {
        None
    }

    fn cursor(&self, active: &ActiveColumns) -> Result<BoxedCursor<'_>> {
        let policy = self.policy()?;
        let layout = self.layout(&policy)?;
        let input = self.source.cursor(&self.input_active(active))?;
        Ok(self.wrap(input, &policy, layout, active, 0))
    }

    fn cursor_set(&self, active: &ActiveColumns, n: usize) -> Result<Vec<BoxedCursor<'_>>> {
        let policy = self.policy()?;
        let layout = self.layout(&policy)?;
        let inputs = self.source.cursor_set(&self.input_active(active), n)?;
        Ok(inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| self.wrap(input, &policy, layout, active, i))
            .collect())
    }
}
