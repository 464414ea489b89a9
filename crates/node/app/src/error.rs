//! Error types and response codes for the consensus surface.

use thiserror::Error;
use urna_state::StateError;

/// Error type for driver operations.
///
/// Every variant maps to a stable non-zero response code; code 0 is
/// success. Validation failures are returned to consensus and leave
/// state untouched; storage failures never become codes, the driver
/// aborts instead so no replica advances with divergent state.
#[derive(Debug, Error)]
pub enum AppError {
    /// The transaction payload kind is unknown or absent.
    #[error("unsupported transaction")]
    UnsupportedTx,

    /// The envelope or payload failed to decode.
    #[error("malformed transaction: {0}")]
    Malformed(String),

    /// Signature missing, malformed, or not matching the payload.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The recovered signer is not allowed to submit this transaction.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The process exists but is not accepting this operation now
    /// (wrong status or outside its block window).
    #[error("process not active: {0}")]
    ProcessNotActive(String),

    /// A key operation referenced the wrong slot index.
    #[error("invalid key index")]
    InvalidKeyIndex,

    /// A query failed (unknown method, malformed request, not found).
    #[error("query error: {0}")]
    Query(String),

    /// A commit listener demanded a consensus halt; no further blocks
    /// are accepted.
    #[error("engine halted: {0}")]
    Halted(String),

    /// Validation error bubbled up from the state layer.
    #[error(transparent)]
    State(#[from] StateError),
}

impl AppError {
    /// The numeric response code reported to consensus.
    pub fn code(&self) -> u32 {
        match self {
            Self::UnsupportedTx => 1,
            Self::Malformed(_) => 2,
            Self::InvalidSignature(_) => 3,
            Self::Unauthorized(_) => 4,
            Self::ProcessNotActive(_) => 5,
            Self::InvalidKeyIndex => 6,
            Self::Query(_) => 7,
            Self::Halted(_) => 8,
            Self::State(e) => match e {
                StateError::ProcessNotFound => 10,
                StateError::ProcessAlreadyExists => 11,
                StateError::DuplicateVote => 12,
                StateError::VoteNotFound => 13,
                StateError::InvalidStatusTransition { .. } => 14,
                StateError::KeyIndexOutOfRange => 6,
                StateError::CensusKeyNotFound => 15,
                StateError::CensusKeyAlreadyRegistered => 22,
                StateError::RegistrationClosed => 16,
                StateError::RegistrationNotSupported => 17,
                StateError::InvalidCensusKey(_) => 18,
                StateError::ResultsRejected(_) => 19,
                StateError::ProcessNotEnded => 20,
                StateError::InvalidProcessId(_) | StateError::InvalidNullifier(_) => 2,
                StateError::Malformed(_) | StateError::Decode(_) => 2,
                StateError::OracleNotFound | StateError::ValidatorNotFound => 21,
                _ => 100,
            },
        }
    }

    /// Whether this error may be returned as a response code; engine
    /// failures must abort the replica instead.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Halted(_) => false,
            Self::State(e) => e.is_validation(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_nonzero() {
        assert_eq!(AppError::UnsupportedTx.code(), 1);
        assert_eq!(AppError::State(StateError::DuplicateVote).code(), 12);
        assert_eq!(AppError::State(StateError::ProcessNotFound).code(), 10);
        assert_ne!(AppError::Halted("x".into()).code(), 0);
    }

    #[test]
    fn storage_errors_are_not_validation() {
        assert!(AppError::State(StateError::DuplicateVote).is_validation());
        assert!(!AppError::Halted("stop".into()).is_validation());
    }
}
