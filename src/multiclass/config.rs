//! Reduction configuration.
//!
//! [`ReductionConfig`] gathers every knob of the reduction. It is built with
//! a `bon` builder whose `build()` validates the values.
//!
//! # Example
//!
//! ```
//! use multiclass_reduce::multiclass::{MultiplicationAlgorithm, ReductionConfig};
//!
//! // All defaults
//! let config = ReductionConfig::builder().build().unwrap();
//! assert_eq!(config.max_multi, 5.0);
//!
//! let config = ReductionConfig::builder()
//!     .algorithm(MultiplicationAlgorithm::Reweight)
//!     .max_multi(3.0)
//!     .seed(7)
//!     .n_threads(2)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.n_threads, Some(2));
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::replication::MAX_REPLICA_LIMIT;
use crate::error::ConfigError;

/// Default name of the column holding the derived binary or rank label.
pub const DEFAULT_NEW_COLUMN: &str = "binaryLabel";

/// How base rows are multiplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultiplicationAlgorithm {
    /// Every class when there are few of them, otherwise a random sample.
    /// Derived label: "is this the true class".
    #[default]
    Default,
    /// Rare classes are replicated more than frequent ones.
    Reweight,
    /// Like `Default`, with relevance 4 for the true class and 0 otherwise.
    Ranking,
}

/// Representation of the label column on multiplied rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LabelOutput {
    /// The label in its own representation.
    #[default]
    Native,
    /// The label as a non-negative float class index.
    Float,
    /// A sparse one-hot vector with a single `1` at the class index.
    OneHot,
}

/// How much the trainer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Verbosity {
    Silent,
    #[default]
    Warning,
    Info,
    Debug,
}

/// Configuration of the multi-class reduction.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ReductionConfig {
    /// Row multiplication strategy. Default: `Default`.
    #[builder(default)]
    pub algorithm: MultiplicationAlgorithm,

    /// Upper bound on the number of copies of one row. Default: 5.
    #[builder(default = 5.0)]
    pub max_multi: f32,

    /// Seed of every cursor's random generator. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Threads of the histogram scan. `None` or `0` uses the rayon pool size.
    pub n_threads: Option<usize>,

    /// Append the class as one feature slot (`true`) or as a one-hot block.
    #[builder(default = true)]
    pub single_column: bool,

    /// Drop rows with a missing label before training. Default: true.
    #[builder(default = true)]
    pub drop_na_label: bool,

    /// Name of the derived label column. Default: `"binaryLabel"`.
    #[builder(into, default = DEFAULT_NEW_COLUMN.to_string())]
    pub new_column: String,

    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: reduction_config_builder::IsComplete> ReductionConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `max_multi` not finite or below 1
    /// - `max_multi` above 1000
    /// - empty `new_column`
    pub fn build(self) -> Result<ReductionConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ReductionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_max_multi(self.max_multi)?;
        if self.new_column.is_empty() {
            return Err(ConfigError::EmptyColumnName);
        }
        Ok(())
    }
}

pub(crate) fn validate_max_multi(max_multi: f32) -> Result<(), ConfigError> {
    if !max_multi.is_finite() || max_multi < 1.0 {
        return Err(ConfigError::InvalidMaxMulti(max_multi));
    }
    if max_multi > MAX_REPLICA_LIMIT as f32 {
        return Err(ConfigError::MaxMultiTooLarge {
            value: max_multi,
            limit: MAX_REPLICA_LIMIT,
        });
    }
    Ok(())
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            algorithm: MultiplicationAlgorithm::default(),
            max_multi: 5.0,
            seed: 42,
            n_threads: None,
            single_column: true,
            drop_na_label: true,
            new_column: DEFAULT_NEW_COLUMN.to_string(),
            verbosity: Verbosity::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_defaults_match_builder() {
        let built = ReductionConfig::builder().build().unwrap();
        assert_eq!(built, ReductionConfig::default());
        assert_eq!(built.new_column, "binaryLabel");
        assert_eq!(built.verbosity, Verbosity::Warning);
    }

    #[rstest]
    #[case(0.5)]
    #[case(f32::NAN)]
    #[case(f32::INFINITY)]
    fn test_invalid_max_multi(#[case] value: f32) {
        let result = ReductionConfig::builder().max_multi(value).build();
        assert!(matches!(result, Err(ConfigError::InvalidMaxMulti(_))));
    }

    #[test]
    fn test_max_multi_limit() {
        assert!(ReductionConfig::builder().max_multi(1000.0).build().is_ok());
        assert!(matches!(
            ReductionConfig::builder().max_multi(1000.5).build(),
            Err(ConfigError::MaxMultiTooLarge { limit: 1000, .. })
        ));
    }

    #[test]
    fn test_empty_new_column() {
        let result = ReductionConfig::builder().new_column("").build();
        assert_eq!(result, Err(ConfigError::EmptyColumnName));
    }

    #[test]
    fn test_verbosity_order() {
        assert!(Verbosity::Debug > Verbosity::Info);
        assert!(Verbosity::Warning > Verbosity::Silent);
    }

    #[test]
    fn test_postcard_round_trip() {
        let config = ReductionConfig::builder()
            .algorithm(MultiplicationAlgorithm::Ranking)
            .seed(3)
            .build()
            .unwrap();
        let bytes = postcard::to_allocvec(&config).unwrap();
        let back: ReductionConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, config);
    }
}
