//! Protocol-buffer data model for the state engine.
//!
//! Everything that crosses a replica boundary or lands in the Merkleized
//! state is a prost message: stored records (processes, vote envelopes,
//! the chain header), the signed transaction envelope with its payload
//! kinds, and the reply payloads of the query surface. Prost writes
//! fields in tag order, so encoding the same message always yields the
//! same bytes, which is what lets these encodings live under a Merkle
//! root that consensus compares across replicas.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod models;
pub use models::{
    EnvelopeType, Header, Process, ProcessMode, ProcessResult, ProcessStatus, QuestionResult,
    StateDbProcess, StateDbVote, Validator, Vote,
};

mod query;
pub use query::{CountReply, EnvelopeListReply, ProcessKeysReply};

mod tx;
pub use tx::{
    AdminTx, NewProcessTx, RegisterKeyTx, SetProcessTx, SignedTx, Tx, TxPayload, TxType, VoteTx,
};

pub use prost::Message;
