//! Error taxonomy for the impact engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while computing or comparing footprints.
#[derive(Error, Debug)]
pub enum ImpactError {
    /// A required backing table has no rows at all.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Input failed validation (negative quantities, empty candidate lists, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A table source exists but could not be read as CSV.
    #[error("Table error in {table}: {detail}")]
    Table { table: String, detail: String },
}

impl ImpactError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn unknown(message: impl Into<String>) -> Self {
        Self::UnknownResource(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ImpactError>;

/// A candidate whose calculation failed inside a batch operation.
///
/// Skipped candidates are excluded from rankings; the batch still succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    /// Candidate identifier (region code, model id or instance type).
    pub candidate: String,
    /// Rendered error that caused the skip.
    pub reason: String,
}

impl SkippedCandidate {
    pub(crate) fn new(candidate: impl Into<String>, error: &ImpactError) -> Self {
        Self {
            candidate: candidate.into(),
            reason: error.to_string(),
        }
    }
}
