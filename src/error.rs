//! Error types.
//!
//! Every failure in this crate is local and synchronous: configuration problems
//! are reported at construction time, data problems at the row where they are
//! detected, and corruption problems when a model is loaded. Nothing is retried.

use crate::data::{ColumnType, DataKind};
use crate::persist::PersistError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors detected while validating configuration or wiring columns together.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to find column '{name}' in schema ({available})")]
    UnknownColumn { name: String, available: String },

    #[error("column '{column}' has unsupported label type {ty}")]
    UnsupportedLabelType { column: String, ty: ColumnType },

    #[error("column '{column}' has type {actual}, expected {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: String,
        actual: ColumnType,
    },

    #[error("max_multi must be finite and at least 1, got {0}")]
    InvalidMaxMulti(f32),

    #[error("max_multi must not exceed {limit}, got {value}")]
    MaxMultiTooLarge { value: f32, limit: usize },

    #[error("no conversion from {from} to {to}")]
    UnsupportedConversion { from: ColumnType, to: ColumnType },

    #[error("new column name must not be empty")]
    EmptyColumnName,

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("{trainer} requires a {role} column")]
    MissingRole {
        trainer: &'static str,
        role: &'static str,
    },

    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

// =============================================================================
// DataError
// =============================================================================

/// Errors detected while scanning rows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("view is empty")]
    EmptyView,

    #[error("negative label {0} cannot be used as a class index")]
    NegativeLabel(i64),

    #[error("inconsistent input vector: sparse vector with values but no indices")]
    SparseWithoutIndices,

    #[error("column {0} is not active on this cursor")]
    InactiveColumn(usize),

    #[error("column {0} is out of range")]
    ColumnOutOfRange(usize),

    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    #[error("column {column} holds {actual}, expected {expected}")]
    TypeMismatch {
        column: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("label {0} was not seen when the class histogram was built")]
    UnknownLabel(String),

    #[error("labels mix representations: {first} and {second}")]
    MixedLabelKinds { first: DataKind, second: DataKind },

    #[error("vector has length {actual}, expected {expected}")]
    VectorLength { expected: usize, actual: usize },

    #[error("invalid sparse vector: {0}")]
    InvalidSparse(String),

    #[error("column lengths differ: {name} has {actual} rows, expected {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("value of kind {actual} where {expected} was declared")]
    UnexpectedKind { expected: DataKind, actual: DataKind },
}

// =============================================================================
// Error
// =============================================================================

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// A value does not fit its destination type. Raised per value, at the
    /// row where it is read.
    #[error("value {value} is out of range for {target}")]
    Overflow { value: String, target: ColumnType },

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Returns true for errors raised by configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Returns true for errors raised while reading rows.
    pub fn is_data(&self) -> bool {
        matches!(self, Error::Data(_) | Error::Overflow { .. })
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(e.to_string())
    }
}
