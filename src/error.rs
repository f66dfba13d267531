//! Error types for proximity analysis.
//!
//! Configuration and ordering violations are returned to the caller as
//! [`AnalysisError`]. Conditions that still allow a well-defined result
//! (no individuals, nobody overlapping) are reported as [`AnalysisWarning`]
//! inside the result metadata instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Fatal errors raised by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A configuration value is out of range. Raised before any work starts.
    #[error("invalid configuration: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A track is not sorted by ascending timestamp.
    #[error("track '{individual_id}' is not time-ordered at point {index}")]
    DataOrder { individual_id: String, index: usize },

    /// Two input tracks carry the same individual id.
    #[error("individual '{individual_id}' appears in more than one track")]
    DuplicateIndividual { individual_id: String },

    #[error("failed to serialize analysis result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalysisError {
    pub(crate) fn invalid_config(field: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidConfig { field, value, reason }
    }
}

/// Non-fatal conditions recorded in [`crate::RunMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// No tracks (or only empty tracks) were supplied.
    NoIndividuals,
    /// Only one individual has data, so there is nothing to pair.
    SingleIndividual { individual_id: String },
    /// Pairs exist but none of them overlap in time and space.
    NoOverlappingPairs,
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoIndividuals => write!(f, "no individuals with data"),
            Self::SingleIndividual { individual_id } => {
                write!(f, "only one individual with data ('{}')", individual_id)
            }
            Self::NoOverlappingPairs => write!(f, "no pair of individuals overlaps in time and space"),
        }
    }
}
