//! Rolling census: pre-registration of voter keys before a process
//! starts.

use alloy_primitives::hex;
use tracing::debug;
use urna_proto::Process;
use urna_tree::HASH_LEN;

use crate::{
    state::State,
    trees::{census_cfg, census_poseidon_cfg, processes_cfg},
    StateError,
};

const NEXT_INDEX_PREFIX: &[u8] = b"rollingcensus/next/";
const KEY_INDEX_PREFIX: &[u8] = b"rollingcensus/key/";
const WEIGHT_PREFIX: &[u8] = b"rollingcensus/weight/";

fn next_index_key(process_id: &[u8]) -> Vec<u8> {
    [NEXT_INDEX_PREFIX, process_id].concat()
}

fn key_index_key(process_id: &[u8], census_key: &[u8]) -> Vec<u8> {
    [KEY_INDEX_PREFIX, process_id, census_key].concat()
}

fn weight_key(process_id: &[u8], census_key: &[u8]) -> Vec<u8> {
    [WEIGHT_PREFIX, process_id, census_key].concat()
}

fn check_census_key(process: &Process, census_key: &[u8]) -> Result<(), StateError> {
    if census_key.len() != HASH_LEN {
        return Err(StateError::InvalidCensusKey(format!(
            "{} bytes, expected {HASH_LEN}",
            census_key.len()
        )));
    }
    let anonymous = process.envelope_type.as_ref().is_some_and(|e| e.anonymous);
    // Poseidon operates over the BN254 field; a zero high byte keeps the
    // little-endian interpretation below the modulus.
    if anonymous && census_key[HASH_LEN - 1] != 0 {
        return Err(StateError::InvalidCensusKey("high byte must be zero".into()));
    }
    Ok(())
}

impl State {
    /// Append a voter key to the process's rolling census at the next
    /// dense index.
    ///
    /// Only processes in pre-register mode accept keys, and only before
    /// their start block. Anonymous processes use the Poseidon census
    /// sub-tree, others the SHA-256 one. The reverse `key → index`
    /// mapping and the optional weight are kept in the plain keyspace of
    /// the same transaction.
    pub fn add_to_rolling_census(
        &self,
        process_id: &[u8],
        census_key: &[u8],
        weight: Option<u64>,
    ) -> Result<(), StateError> {
        let process = self.process(process_id, false)?;
        if !process.mode.as_ref().is_some_and(|m| m.pre_register) {
            return Err(StateError::RegistrationNotSupported);
        }
        if self.height() >= process.start_block {
            return Err(StateError::RegistrationClosed);
        }
        check_census_key(&process, census_key)?;

        let anonymous = process.envelope_type.as_ref().is_some_and(|e| e.anonymous);
        let census = if anonymous { census_poseidon_cfg() } else { census_cfg() };
        let path = [processes_cfg().singleton_ref(), census.with_key(process_id.to_vec())];

        self.with_tx(|tx| {
            if tx.no_state().get(&key_index_key(process_id, census_key))?.is_some() {
                return Err(StateError::CensusKeyAlreadyRegistered);
            }
            let index = match tx.no_state().get(&next_index_key(process_id))? {
                Some(bytes) => decode_u64(&bytes)?,
                None => 0,
            };
            let index_bytes = index.to_le_bytes();

            tx.deep_add(&path, &index_bytes, census_key)?;

            let mut no_state = tx.no_state();
            no_state.put(&key_index_key(process_id, census_key), &index_bytes)?;
            no_state.put(&next_index_key(process_id), &(index + 1).to_le_bytes())?;
            if let Some(weight) = weight {
                no_state.put(&weight_key(process_id, census_key), &weight.to_le_bytes())?;
            }
            debug!(
                process = %hex::encode(process_id),
                index,
                anonymous,
                "rolling census key registered"
            );
            Ok(())
        })
    }

    /// Reverse lookup: the little-endian index a census key was
    /// registered at.
    pub fn key_to_index(
        &self,
        process_id: &[u8],
        census_key: &[u8],
        committed: bool,
    ) -> Result<[u8; 8], StateError> {
        let lookup = key_index_key(process_id, census_key);
        let bytes = if committed {
            self.committed_view().no_state().get(&lookup)?
        } else {
            self.with_tx(|tx| Ok(tx.no_state().get(&lookup)?))?
        };
        let bytes = bytes.ok_or(StateError::CensusKeyNotFound)?;
        let mut out = [0u8; 8];
        if bytes.len() != 8 {
            return Err(StateError::Malformed("corrupt census index".into()));
        }
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Number of keys registered in the process's rolling census.
    pub fn rolling_census_size(
        &self,
        process_id: &[u8],
        committed: bool,
    ) -> Result<u64, StateError> {
        let key = next_index_key(process_id);
        let bytes = if committed {
            self.committed_view().no_state().get(&key)?
        } else {
            self.with_tx(|tx| Ok(tx.no_state().get(&key)?))?
        };
        match bytes {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    /// The registered weight of a census key, if any was supplied.
    pub fn census_key_weight(
        &self,
        process_id: &[u8],
        census_key: &[u8],
        committed: bool,
    ) -> Result<Option<u64>, StateError> {
        let key = weight_key(process_id, census_key);
        let bytes = if committed {
            self.committed_view().no_state().get(&key)?
        } else {
            self.with_tx(|tx| Ok(tx.no_state().get(&key)?))?
        };
        bytes.map(|b| decode_u64(&b)).transpose()
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64, StateError> {
    if bytes.len() != 8 {
        return Err(StateError::Malformed("corrupt census counter".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}
