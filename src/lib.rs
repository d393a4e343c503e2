//! multiclass-reduce: multi-class classification through a single binary or
//! ranking model.
//!
//! Rows are multiplied once per candidate class and relabeled "is this the
//! true class", so that any binary (or ranking) learner can be trained once on
//! the result. The trained model is then wrapped into a multi-class predictor
//! that scores every class of a new row.
//!
//! # Key Types
//!
//! - [`MultiToBinaryTrainer`] / [`ReductionConfig`] - training pipeline and its configuration
//! - [`MultiToBinaryPredictor`] - the resulting multi-class model
//! - [`MultiToBinaryTransform`] - the multiplied view, usable on its own
//! - [`data::InMemoryView`] - columnar data for training and scoring
//!
//! # Training
//!
//! Build a [`ReductionConfig`] with `ReductionConfig::builder()`, pick an inner
//! [`learner::ScalarTrainer`], then call [`MultiToBinaryTrainer::train`].
//! See the [`multiclass`] module for details.
//!
//! # Persistence
//!
//! Models are saved into a [`persist::ModelRepository`] and loaded back through
//! a [`persist::ComponentCatalog`]. See the [`persist`] module.

pub mod data;
pub mod error;
pub mod learner;
pub mod multiclass;
pub mod persist;
pub mod transforms;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use error::{ConfigError, DataError, Error, Result};

pub use multiclass::{
    LabelOutput, MultiToBinaryPredictor, MultiToBinaryTrainer, MultiToBinaryTransform,
    MultiplicationAlgorithm, ReductionConfig, Verbosity,
};

pub use data::{DataView, InMemoryView, LabelValue, RowCursor, VBuffer};

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
