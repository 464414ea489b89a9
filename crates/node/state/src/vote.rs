//! Vote envelope accessors and the checked-vote cache.

use alloy_primitives::keccak256;
use prost::Message;
use sha2::{Digest, Sha256};
use tracing::debug;
use urna_proto::{StateDbVote, Vote};
use urna_statedb::StateDbError;
use urna_tree::TreeError;

use crate::{
    state::{State, SubTreeReader as _},
    trees::{processes_cfg, votes_cfg, NULLIFIER_LEN, PROCESS_ID_LEN},
    StateError,
};

/// The identifier a vote is stored under:
/// `sha256(process_id || nullifier)`.
///
/// Hashing (rather than concatenating) keeps the key inside the votes
/// tree's key budget and uniformly distributed.
pub fn vote_id(process_id: &[u8], nullifier: &[u8]) -> Result<[u8; 32], StateError> {
    if process_id.len() != PROCESS_ID_LEN {
        return Err(StateError::InvalidProcessId(process_id.len()));
    }
    if nullifier.len() != NULLIFIER_LEN {
        return Err(StateError::InvalidNullifier(nullifier.len()));
    }
    let mut hasher = Sha256::new();
    hasher.update(process_id);
    hasher.update(nullifier);
    Ok(hasher.finalize().into())
}

impl State {
    /// Register a vote envelope under its process.
    ///
    /// Stamps the current block height, stores the compact record and
    /// fires `on_vote`. Fails with [`StateError::DuplicateVote`] if the
    /// nullifier was already used in this process. Uniqueness is checked
    /// by the tree itself, this method performs no separate lookup.
    pub fn add_vote(&self, vote: &Vote) -> Result<(), StateError> {
        let vid = vote_id(&vote.process_id, &vote.nullifier)?;

        let mut stamped = vote.clone();
        stamped.height = self.height();

        let record = StateDbVote {
            vote_hash: keccak256(stamped.encode_to_vec()).to_vec(),
            process_id: stamped.process_id.clone(),
            nullifier: stamped.nullifier.clone(),
            height: stamped.height,
        };
        let bytes = record.encode_to_vec();

        let path = [
            processes_cfg().singleton_ref(),
            votes_cfg().with_key(stamped.process_id.clone()),
        ];
        self.with_tx(|tx| match tx.deep_add(&path, &vid, &bytes) {
            Ok(()) => Ok(()),
            Err(StateDbError::Tree(TreeError::KeyAlreadyExists)) => {
                Err(StateError::DuplicateVote)
            }
            Err(StateDbError::SubTreeNotFound(_)) => Err(StateError::ProcessNotFound),
            Err(e) => Err(e.into()),
        })?;
        debug!(height = stamped.height, "vote envelope stored");

        for listener in self.listeners() {
            listener.on_vote(&stamped, self.tx_counter());
        }
        Ok(())
    }

    /// Fetch the stored envelope record for `(process_id, nullifier)`.
    pub fn envelope(
        &self,
        process_id: &[u8],
        nullifier: &[u8],
        committed: bool,
    ) -> Result<StateDbVote, StateError> {
        let vid = vote_id(process_id, nullifier)?;
        let path =
            vec![processes_cfg().singleton_ref(), votes_cfg().with_key(process_id.to_vec())];
        let bytes = self.with_subtree(committed, path, |votes| match votes.get(&vid) {
            Ok(bytes) => Ok(bytes),
            Err(StateDbError::Tree(TreeError::KeyNotFound)) => Err(StateError::VoteNotFound),
            Err(e) => Err(e.into()),
        });
        let bytes = match bytes {
            Err(StateError::StateDb(StateDbError::SubTreeNotFound(_))) => {
                return Err(StateError::ProcessNotFound);
            }
            other => other?,
        };
        Ok(StateDbVote::decode(bytes.as_slice())?)
    }

    /// Whether an envelope exists for `(process_id, nullifier)`.
    pub fn envelope_exists(
        &self,
        process_id: &[u8],
        nullifier: &[u8],
        committed: bool,
    ) -> Result<bool, StateError> {
        match self.envelope(process_id, nullifier, committed) {
            Ok(_) => Ok(true),
            Err(StateError::VoteNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn iterate_votes(
        &self,
        process_id: &[u8],
        committed: bool,
        f: &mut dyn FnMut(&[u8], StateDbVote) -> bool,
    ) -> Result<(), StateError> {
        let path =
            vec![processes_cfg().singleton_ref(), votes_cfg().with_key(process_id.to_vec())];
        let result = self.with_subtree(committed, path, |votes| {
            let mut decode_err = None;
            votes.iterate(&mut |key, value| match StateDbVote::decode(value) {
                Ok(record) => f(key, record),
                Err(e) => {
                    decode_err = Some(e);
                    true
                }
            })?;
            if let Some(e) = decode_err {
                return Err(e.into());
            }
            Ok(())
        });
        match result {
            Err(StateError::StateDb(StateDbError::SubTreeNotFound(_))) => {
                Err(StateError::ProcessNotFound)
            }
            other => other,
        }
    }

    /// Number of envelopes registered for a process.
    pub fn count_votes(&self, process_id: &[u8], committed: bool) -> Result<u32, StateError> {
        let mut count = 0u32;
        self.iterate_votes(process_id, committed, &mut |_, _| {
            count += 1;
            false
        })?;
        Ok(count)
    }

    /// A page of envelope nullifiers for a process, in the deterministic
    /// iteration order of the votes tree.
    pub fn envelope_list(
        &self,
        process_id: &[u8],
        from: usize,
        list_size: usize,
        committed: bool,
    ) -> Result<Vec<Vec<u8>>, StateError> {
        let mut nullifiers = Vec::new();
        let mut index = 0usize;
        self.iterate_votes(process_id, committed, &mut |_, record| {
            if index >= from + list_size {
                return true;
            }
            if index >= from {
                nullifiers.push(record.nullifier);
            }
            index += 1;
            false
        })?;
        Ok(nullifiers)
    }

    // --- Checked-vote cache ---

    /// Remember a fully checked vote so delivery can skip re-validation.
    pub fn vote_cache_add(&self, vid: [u8; 32], vote: Vote) {
        self.vote_cache.lock().unwrap().put(vid, vote);
    }

    /// Look up a previously checked vote.
    pub fn vote_cache_get(&self, vid: &[u8; 32]) -> Option<Vote> {
        self.vote_cache.lock().unwrap().get(vid).cloned()
    }

    /// Drop a cache entry (after delivery).
    pub fn vote_cache_del(&self, vid: &[u8; 32]) {
        self.vote_cache.lock().unwrap().pop(vid);
    }

    /// Number of cached checked votes.
    pub fn vote_cache_size(&self) -> usize {
        self.vote_cache.lock().unwrap().len()
    }
}
