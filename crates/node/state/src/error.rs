//! Error types for application-state operations.

use thiserror::Error;
use urna_proto::ProcessStatus;
use urna_statedb::StateDbError;

/// Error type for application-state operations.
///
/// Validation errors are local to the transaction that caused them and
/// never taint state; [`StateDb`](StateError::StateDb) errors other than
/// key misses are fatal, and [`Halt`](StateError::Halt) must be surfaced
/// to consensus verbatim.
#[derive(Debug, Error)]
pub enum StateError {
    /// The referenced process does not exist.
    #[error("process not found")]
    ProcessNotFound,

    /// A process with this identifier already exists.
    #[error("process already exists")]
    ProcessAlreadyExists,

    /// The referenced vote envelope does not exist.
    #[error("vote does not exist")]
    VoteNotFound,

    /// A vote with this nullifier is already registered for the process.
    #[error("duplicate vote")]
    DuplicateVote,

    /// The referenced oracle is not registered.
    #[error("oracle not found")]
    OracleNotFound,

    /// The referenced validator is not registered.
    #[error("validator not found")]
    ValidatorNotFound,

    /// The requested status change is not allowed by the lifecycle DAG.
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition {
        /// Current status.
        from: ProcessStatus,
        /// Requested status.
        to: ProcessStatus,
    },

    /// A key reveal was requested with no unrevealed keys left, or an
    /// out-of-range slot index was used.
    #[error("key index out of range")]
    KeyIndexOutOfRange,

    /// Results can only be set on an ended process.
    #[error("process has not ended")]
    ProcessNotEnded,

    /// A results listener rejected the submitted results.
    #[error("results rejected: {0}")]
    ResultsRejected(String),

    /// Malformed process identifier.
    #[error("wrong process id size {0}")]
    InvalidProcessId(usize),

    /// Malformed nullifier.
    #[error("wrong nullifier size {0}")]
    InvalidNullifier(usize),

    /// Malformed record field (lengths, roots, required sub-messages).
    #[error("malformed record: {0}")]
    Malformed(String),

    /// A census key is not a 32-byte field-valid value.
    #[error("invalid census key: {0}")]
    InvalidCensusKey(String),

    /// The census key was never registered for the process.
    #[error("census key not found")]
    CensusKeyNotFound,

    /// The census key is already registered for the process.
    #[error("census key already registered")]
    CensusKeyAlreadyRegistered,

    /// Rolling-census registration is closed for the process.
    #[error("rolling census registration closed")]
    RegistrationClosed,

    /// The process does not take rolling-census registrations.
    #[error("process does not accept key registration")]
    RegistrationNotSupported,

    /// No write context is open; the block driver must begin a block
    /// first.
    #[error("no open write transaction")]
    NoOpenTransaction,

    /// A commit listener demanded a consensus halt.
    #[error("halting consensus: {0}")]
    Halt(String),

    /// A stored record failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Forest error; key misses are mapped to domain errors before this.
    #[error(transparent)]
    StateDb(#[from] StateDbError),
}

impl StateError {
    /// Whether the error is a per-transaction validation failure rather
    /// than an engine failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Halt(_) | Self::StateDb(_) | Self::NoOpenTransaction)
    }
}
