//! Multi-class to binary reduction.
//!
//! # Overview
//!
//! A multi-class problem with classes `c_1..c_n` becomes a binary problem by
//! copying each row once per candidate class. A copy carries the candidate in
//! its label column and a derived label saying whether the candidate is the
//! true class. A single binary model trained on `features ‖ candidate` then
//! scores every class of a new row; the class with the highest score wins.
//!
//! # Components
//!
//! - [`LabelHistogram`]: weight per class, from a sequential or partitioned scan
//! - [`ReplicationPolicy`]: which copies each row gets, per algorithm
//! - [`MultiplyingCursor`] / [`MultiToBinaryTransform`]: the multiplied view
//! - [`MultiToBinaryPredictor`] / [`ClassScoreMapper`]: per-class scoring
//! - [`MultiToBinaryTrainer`]: the training pipeline
//!
//! # Algorithms
//!
//! | Algorithm | Copies per row | Derived label |
//! |-----------|----------------|---------------|
//! | `Default` | every class, or `max_replica` random ones | `bool` |
//! | `Reweight` | more for rare classes, none for very frequent ones | `bool` |
//! | `Ranking` | as `Default` | `u32` relevance, 4 or 0 |

mod config;
mod cursor;
mod histogram;
mod predictor;
mod replication;
mod trainer;
mod transform;

pub use config::{
    LabelOutput, MultiplicationAlgorithm, ReductionConfig, ReductionConfigBuilder, Verbosity,
    DEFAULT_NEW_COLUMN,
};
pub use cursor::MultiplyingCursor;
pub use histogram::LabelHistogram;
pub use predictor::{ClassScoreMapper, MultiToBinaryPredictor};
pub use replication::{
    DerivedLabel, Replica, ReplicationPolicy, MAX_REPLICA_LIMIT, RANK_RELEVANT,
};
pub use trainer::MultiToBinaryTrainer;
pub use transform::{MultiToBinaryTransform, TransformArgs};
