// Copyright 2025 Cowboy AI, LLC.

//! Error types for hierarchy derivation

use thiserror::Error;

use crate::attribute_table::ComponentId;

/// Errors that can occur while deriving a concept hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    /// Input table cannot be turned into an attribute table
    #[error("Malformed input: {reason}")]
    MalformedInput {
        /// Why the input was rejected
        reason: String,
    },

    /// Component carries a higher-rank attribute without its lower ranks
    #[error("Invalid component {component}: missing attribute of rank {missing_rank}")]
    InvalidComponent {
        /// Offending component
        component: ComponentId,
        /// First rank that is absent below a present one
        missing_rank: usize,
    },

    /// Internal invariant violation (canonicalization or closure bug)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for hierarchy operations
pub type LatticeResult<T> = Result<T, LatticeError>;

impl From<serde_json::Error> for LatticeError {
    fn from(err: serde_json::Error) -> Self {
        LatticeError::Serialization(err.to_string())
    }
}

impl LatticeError {
    /// Create a malformed input error
    pub fn malformed(reason: impl Into<String>) -> Self {
        LatticeError::MalformedInput {
            reason: reason.into(),
        }
    }

    /// Check if this error was caused by the input data
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            LatticeError::MalformedInput { .. } | LatticeError::InvalidComponent { .. }
        )
    }

    /// Check if this error signals a bug in lattice construction
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, LatticeError::InvariantViolation(_))
    }
}
