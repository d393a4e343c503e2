//! Model persistence.
//!
//! - [`ModelRepository`]: named byte entries, stored behind a checksummed header
//! - [`ModelSaveContext`] / [`ModelLoadContext`]: primitive read/write plus
//!   nested sub-models saved by name
//! - [`ComponentCatalog`]: loaders keyed by the signature each model writes
//!
//! # Example
//!
//! ```
//! use multiclass_reduce::learner::{LinearScorer, PredictionKind};
//! use multiclass_reduce::persist::{ComponentCatalog, ModelRepository, ModelSaveContext};
//! use ndarray::array;
//!
//! let scorer = LinearScorer::new(array![0.5, -1.0], 0.25, PredictionKind::BinaryClassification);
//! let mut repo = ModelRepository::new();
//! ModelSaveContext::save_root(&mut repo, "Model", &scorer).unwrap();
//!
//! let bytes = repo.to_bytes().unwrap();
//! let repo = ModelRepository::from_bytes(&bytes).unwrap();
//! let loaded = ComponentCatalog::with_defaults().load_root_scalar(&repo, "Model").unwrap();
//! assert_eq!(loaded.input_len(), 2);
//! ```

mod catalog;
mod context;
mod repository;

pub use catalog::{ComponentCatalog, ScalarLoader, VectorLoader};
pub use context::{ModelLoadContext, ModelSaveContext, SaveModel, VersionInfo};
pub use repository::{ModelRepository, RepositoryHeader, HEADER_SIZE, MAGIC};

use thiserror::Error;

/// Errors raised while reading or writing models.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Input is not a model repository (wrong magic).
    #[error("not a model repository")]
    NotAModel,

    #[error("unsupported format version {found} (reader supports up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Trailing check byte did not match; the stream was not written by a
    /// matching writer or was cut short.
    #[error("check code is wrong ({found}); serialization failed")]
    BadSentinel { found: u8 },

    #[error("missing entry '{0}'")]
    MissingEntry(String),

    #[error("no loader registered for '{0}'")]
    UnknownLoader(String),

    #[error("model signature mismatch: expected '{expected}', found '{found}'")]
    SignatureMismatch { expected: String, found: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
