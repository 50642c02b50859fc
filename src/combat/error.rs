//! Combat errors
//!
//! Every rejected operation maps onto one of four kinds:
//! - Validation: malformed input, rejected before any mutation
//! - NotFound: unknown session, participant, condition or effect
//! - IllegalState: the request is well-formed but not allowed right now
//! - Computation: an internal invariant was violated

use thiserror::Error;

use super::dice::DiceError;

/// Errors returned by the combat engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("computation error: {0}")]
    Computation(String),
}

impl CombatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CombatError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CombatError::NotFound(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        CombatError::IllegalState(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        CombatError::Computation(msg.into())
    }

    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            CombatError::Validation(_) => "validation_error",
            CombatError::NotFound(_) => "not_found",
            CombatError::IllegalState(_) => "illegal_state",
            CombatError::Computation(_) => "computation_error",
        }
    }

    /// The human-readable reason without the kind prefix
    pub fn reason(&self) -> &str {
        match self {
            CombatError::Validation(m)
            | CombatError::NotFound(m)
            | CombatError::IllegalState(m)
            | CombatError::Computation(m) => m,
        }
    }
}

impl From<DiceError> for CombatError {
    fn from(err: DiceError) -> Self {
        CombatError::Validation(err.to_string())
    }
}

/// Result alias for combat operations
pub type CombatResult<T> = Result<T, CombatError>;
