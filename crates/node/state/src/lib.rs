//! Application state for the anonymous-voting chain.
//!
//! Wraps the authenticated forest with typed accessors for the domain
//! sub-trees: oracles, validators and processes under the main tree, and
//! per-process votes and census trees embedded in process leaves. The
//! [`State`] handle owns the single write context driven by the block
//! lifecycle and publishes a committed view for queries; registered
//! [`EventListener`]s observe every mutation and commit.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod census;

mod error;
pub use error::StateError;

mod listener;
pub use listener::{EventListener, ListenerError};

mod process;

mod state;
pub use state::State;

mod trees;
pub use trees::{
    census_cfg, census_poseidon_cfg, oracles_cfg, processes_cfg, validators_cfg, votes_cfg,
    CensusRootCodec, VotesRootCodec, HEADER_KEY, NULLIFIER_LEN, PROCESS_ID_LEN,
};

mod vote;
pub use vote::vote_id;
