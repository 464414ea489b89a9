//! Process accessors: creation, status lifecycle, keys and results.

use alloy_primitives::hex;
use prost::Message;
use tracing::debug;
use urna_proto::{AdminTx, Process, ProcessResult, ProcessStatus, StateDbProcess};
use urna_statedb::StateDbError;
use urna_tree::{TreeError, HASH_LEN};

use crate::{
    state::{State, SubTreeReader as _},
    trees::{processes_cfg, PROCESS_ID_LEN},
    StateError,
};

/// Whether `from → to` is an allowed lifecycle transition.
///
/// `Ready ↔ Paused → Ended → Results`, with `Canceled` terminal from any
/// pre-`Ended` status.
fn validate_status_transition(from: ProcessStatus, to: ProcessStatus) -> Result<(), StateError> {
    use ProcessStatus::*;
    let allowed = matches!(
        (from, to),
        (Ready, Paused)
            | (Paused, Ready)
            | (Ready, Ended)
            | (Paused, Ended)
            | (Ended, Results)
            | (Ready, Canceled)
            | (Paused, Canceled)
    );
    if allowed {
        Ok(())
    } else {
        Err(StateError::InvalidStatusTransition { from, to })
    }
}

fn ensure_slot(slots: &mut Vec<String>, index: usize) {
    if slots.len() <= index {
        slots.resize(index + 1, String::new());
    }
}

impl State {
    /// Create a new process. Fails if the identifier is already used.
    pub fn add_process(&self, process: &Process) -> Result<(), StateError> {
        if process.process_id.len() != PROCESS_ID_LEN {
            return Err(StateError::InvalidProcessId(process.process_id.len()));
        }
        let status = process.status();
        if !matches!(status, ProcessStatus::Ready | ProcessStatus::Paused) {
            return Err(StateError::InvalidStatusTransition {
                from: ProcessStatus::Unknown,
                to: status,
            });
        }

        let mut stored = process.clone();
        let anonymous = stored.envelope_type.as_ref().is_some_and(|e| e.anonymous);
        let pre_register = stored.mode.as_ref().is_some_and(|m| m.pre_register);
        if pre_register {
            // The on-chain rolling census starts empty; the submitted
            // root (if any) is replaced by the embedded sub-tree root.
            stored.census_root = vec![0u8; HASH_LEN];
        } else if stored.census_root.len() != HASH_LEN {
            return Err(StateError::Malformed(format!(
                "census root is {} bytes, expected {HASH_LEN}",
                stored.census_root.len()
            )));
        }

        let record =
            StateDbProcess { process: Some(stored.clone()), votes_root: vec![0u8; HASH_LEN] };
        let bytes = record.encode_to_vec();
        self.with_tx(|tx| {
            let mut processes = tx.sub_tree(processes_cfg().singleton_ref())?;
            match processes.add(&stored.process_id, &bytes) {
                Ok(()) => Ok(()),
                Err(StateDbError::Tree(TreeError::KeyAlreadyExists)) => {
                    Err(StateError::ProcessAlreadyExists)
                }
                Err(e) => Err(e.into()),
            }
        })?;
        debug!(
            process = %hex::encode(&stored.process_id),
            anonymous,
            pre_register,
            "process created"
        );

        let census_root = hex::encode(&stored.census_root);
        let census_uri = stored.census_uri.clone().unwrap_or_default();
        for listener in self.listeners() {
            listener.on_process(
                &stored.process_id,
                &stored.entity_id,
                &census_root,
                &census_uri,
                self.tx_counter(),
            );
        }
        Ok(())
    }

    /// Fetch a process record.
    pub fn process(&self, process_id: &[u8], committed: bool) -> Result<Process, StateError> {
        let record = self.process_record(process_id, committed)?;
        record.process.ok_or_else(|| StateError::Malformed("process record is empty".into()))
    }

    pub(crate) fn process_record(
        &self,
        process_id: &[u8],
        committed: bool,
    ) -> Result<StateDbProcess, StateError> {
        if process_id.len() != PROCESS_ID_LEN {
            return Err(StateError::InvalidProcessId(process_id.len()));
        }
        let bytes = self.with_subtree(
            committed,
            vec![processes_cfg().singleton_ref()],
            |processes| match processes.get(process_id) {
                Ok(bytes) => Ok(bytes),
                Err(StateDbError::Tree(TreeError::KeyNotFound)) => {
                    Err(StateError::ProcessNotFound)
                }
                Err(e) => Err(e.into()),
            },
        )?;
        Ok(StateDbProcess::decode(bytes.as_slice())?)
    }

    /// Read-modify-write a process leaf, preserving the embedded votes
    /// and census roots unless `f` touches them.
    fn update_process_record(
        &self,
        process_id: &[u8],
        f: impl FnOnce(&mut Process) -> Result<(), StateError>,
    ) -> Result<(), StateError> {
        self.with_tx(|tx| {
            let mut processes = tx.sub_tree(processes_cfg().singleton_ref())?;
            let bytes = match processes.get(process_id) {
                Ok(bytes) => bytes,
                Err(StateDbError::Tree(TreeError::KeyNotFound)) => {
                    return Err(StateError::ProcessNotFound);
                }
                Err(e) => return Err(e.into()),
            };
            let mut record = StateDbProcess::decode(bytes.as_slice())?;
            let process = record
                .process
                .as_mut()
                .ok_or_else(|| StateError::Malformed("process record is empty".into()))?;
            f(process)?;
            processes.set(process_id, &record.encode_to_vec())?;
            Ok(())
        })
    }

    /// Read-only lifecycle validation, for mempool admission checks.
    pub fn check_process_status_change(
        &self,
        process_id: &[u8],
        to: ProcessStatus,
        committed: bool,
    ) -> Result<(), StateError> {
        let from = self.process(process_id, committed)?.status();
        validate_status_transition(from, to)
    }

    /// Move a process along its lifecycle DAG.
    pub fn set_process_status(
        &self,
        process_id: &[u8],
        status: ProcessStatus,
    ) -> Result<(), StateError> {
        let current = self.process(process_id, false)?.status();
        validate_status_transition(current, status)?;
        self.update_process_record(process_id, |process| {
            process.set_status(status);
            Ok(())
        })?;

        for listener in self.listeners() {
            if status == ProcessStatus::Canceled {
                listener.on_cancel(process_id, self.tx_counter());
            } else {
                listener.on_process_status_change(process_id, status, self.tx_counter());
            }
        }
        Ok(())
    }

    /// Publish oracle-submitted results on an ended process.
    ///
    /// Listeners are consulted *before* the mutation: the state layer
    /// does not judge result contents, and a rejected result must leave
    /// the shared write context untouched.
    pub fn set_process_results(
        &self,
        process_id: &[u8],
        results: &ProcessResult,
    ) -> Result<(), StateError> {
        let process = self.process(process_id, false)?;
        if process.status() != ProcessStatus::Ended {
            return Err(StateError::ProcessNotEnded);
        }

        for listener in self.listeners() {
            listener
                .on_process_results(process_id, results, self.tx_counter())
                .map_err(|e| StateError::ResultsRejected(e.to_string()))?;
        }

        self.update_process_record(process_id, |process| {
            process.results = Some(results.clone());
            process.set_status(ProcessStatus::Results);
            Ok(())
        })
    }

    /// Store a commitment and/or encryption public key at the given slot
    /// and increment the key index.
    pub fn add_process_keys(&self, tx: &AdminTx) -> Result<(), StateError> {
        let process_id =
            tx.process_id.as_deref().ok_or(StateError::InvalidProcessId(0))?.to_vec();
        let index = tx.key_index.ok_or(StateError::KeyIndexOutOfRange)? as usize;

        let commitment = tx.commitment_key.as_deref().map(hex::encode).unwrap_or_default();
        let encryption_pub =
            tx.encryption_public_key.as_deref().map(hex::encode).unwrap_or_default();

        self.update_process_record(&process_id, |process| {
            if !commitment.is_empty() {
                ensure_slot(&mut process.commitment_keys, index);
                process.commitment_keys[index] = commitment.clone();
            }
            if !encryption_pub.is_empty() {
                ensure_slot(&mut process.encryption_public_keys, index);
                process.encryption_public_keys[index] = encryption_pub.clone();
            }
            process.key_index = Some(process.key_index.unwrap_or(0) + 1);
            Ok(())
        })?;
        debug!(process = %hex::encode(&process_id), index, "process keys added");

        for listener in self.listeners() {
            listener.on_process_keys(&process_id, &encryption_pub, &commitment, self.tx_counter());
        }
        Ok(())
    }

    /// Store the reveal/private keys matching a previously added slot and
    /// decrement the key index. The index never goes below zero.
    pub fn reveal_process_keys(&self, tx: &AdminTx) -> Result<(), StateError> {
        let process_id =
            tx.process_id.as_deref().ok_or(StateError::InvalidProcessId(0))?.to_vec();
        let index = tx.key_index.ok_or(StateError::KeyIndexOutOfRange)? as usize;

        let reveal = tx.reveal_key.as_deref().map(hex::encode).unwrap_or_default();
        let encryption_priv =
            tx.encryption_private_key.as_deref().map(hex::encode).unwrap_or_default();

        self.update_process_record(&process_id, |process| {
            let key_index = process.key_index.unwrap_or(0);
            if key_index < 1 {
                return Err(StateError::KeyIndexOutOfRange);
            }
            if !reveal.is_empty() {
                ensure_slot(&mut process.reveal_keys, index);
                process.reveal_keys[index] = reveal.clone();
            }
            if !encryption_priv.is_empty() {
                ensure_slot(&mut process.encryption_private_keys, index);
                process.encryption_private_keys[index] = encryption_priv.clone();
            }
            process.key_index = Some(key_index - 1);
            Ok(())
        })?;
        debug!(process = %hex::encode(&process_id), index, "process keys revealed");

        for listener in self.listeners() {
            listener.on_reveal_keys(&process_id, &encryption_priv, &reveal, self.tx_counter());
        }
        Ok(())
    }
}
