//! Transaction admission and application.
//!
//! `CheckTx` calls run with `deliver = false` and validate against the
//! last committed view only; `DeliverTx` calls validate against the live
//! write context and then mutate it. Signature recovery and oracle
//! authorization happen here so the state layer stays mechanical.

use alloy_primitives::{hex, keccak256, Address};
use prost::Message;
use tracing::debug;
use urna_proto::{
    AdminTx, NewProcessTx, ProcessStatus, RegisterKeyTx, SetProcessTx, SignedTx, Tx, TxPayload,
    TxType, Validator, VoteTx,
};
use urna_state::{vote_id, State, StateError, PROCESS_ID_LEN};

use crate::AppError;

pub(crate) struct ParsedTx {
    pub payload: TxPayload,
    pub tx_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Decode the wire envelope and its payload.
pub(crate) fn unmarshal(bytes: &[u8]) -> Result<ParsedTx, AppError> {
    let envelope =
        SignedTx::decode(bytes).map_err(|e| AppError::Malformed(format!("envelope: {e}")))?;
    let tx = Tx::decode(envelope.tx.as_slice())
        .map_err(|e| AppError::Malformed(format!("payload: {e}")))?;
    let payload = tx.payload.ok_or(AppError::UnsupportedTx)?;
    Ok(ParsedTx { payload, tx_bytes: envelope.tx, signature: envelope.signature })
}

/// Validate (and on `deliver`, apply) a raw transaction.
pub(crate) fn add_tx(state: &State, bytes: &[u8], deliver: bool) -> Result<(), AppError> {
    let parsed = unmarshal(bytes)?;
    match parsed.payload.clone() {
        TxPayload::Vote(tx) => handle_vote(state, &parsed, &tx, deliver),
        TxPayload::NewProcess(tx) => handle_new_process(state, &parsed, &tx, deliver),
        TxPayload::SetProcess(tx) => handle_set_process(state, &parsed, &tx, deliver),
        TxPayload::Admin(tx) => handle_admin(state, &parsed, &tx, deliver),
        TxPayload::RegisterKey(tx) => handle_register_key(state, &parsed, &tx, deliver),
    }
}

fn recover_signer(parsed: &ParsedTx) -> Result<Address, AppError> {
    urna_crypto::recover_address(&parsed.tx_bytes, &parsed.signature)
        .map_err(|e| AppError::InvalidSignature(e.to_string()))
}

/// Recover the signer and require it to be a registered oracle.
fn require_oracle(
    state: &State,
    parsed: &ParsedTx,
    committed: bool,
) -> Result<Address, AppError> {
    let signer = recover_signer(parsed)?;
    if !state.is_oracle(signer, committed)? {
        return Err(AppError::Unauthorized(format!("{signer} is not an oracle")));
    }
    Ok(signer)
}

fn handle_vote(
    state: &State,
    parsed: &ParsedTx,
    tx: &VoteTx,
    deliver: bool,
) -> Result<(), AppError> {
    let committed = !deliver;
    let vote = tx.vote.as_ref().ok_or_else(|| AppError::Malformed("vote missing".into()))?;
    let vid = vote_id(&vote.process_id, &vote.nullifier)?;

    let process = state.process(&vote.process_id, committed)?;
    if process.status() != ProcessStatus::Ready {
        return Err(AppError::ProcessNotActive(format!("status {:?}", process.status())));
    }
    let height = state.height();
    if height < process.start_block || height > process.start_block + process.block_count {
        return Err(AppError::ProcessNotActive(format!(
            "height {height} outside [{}, {}]",
            process.start_block,
            process.start_block + process.block_count
        )));
    }

    let anonymous = process.envelope_type.as_ref().is_some_and(|e| e.anonymous);
    // A vote that already passed CheckTx skips the expensive part of
    // re-validation on delivery; the cached envelope must match exactly.
    let cached = deliver
        && state
            .vote_cache_get(&vid)
            .is_some_and(|checked| {
                checked.vote_package == vote.vote_package && checked.proof == vote.proof
            });
    if !cached {
        if anonymous {
            // The ZK proof itself is verified by an external collaborator;
            // here it only has to be present.
            if vote.proof.is_empty() {
                return Err(AppError::Malformed("missing census proof".into()));
            }
        } else {
            recover_signer(parsed)?;
        }
    }

    if state.envelope_exists(&vote.process_id, &vote.nullifier, committed)? {
        return Err(StateError::DuplicateVote.into());
    }

    if deliver {
        state.add_vote(vote)?;
        state.vote_cache_del(&vid);
    } else {
        state.vote_cache_add(vid, vote.clone());
    }
    Ok(())
}

fn handle_new_process(
    state: &State,
    parsed: &ParsedTx,
    tx: &NewProcessTx,
    deliver: bool,
) -> Result<(), AppError> {
    let committed = !deliver;
    let signer = require_oracle(state, parsed, committed)?;
    let process =
        tx.process.as_ref().ok_or_else(|| AppError::Malformed("process missing".into()))?;
    if process.process_id.len() != PROCESS_ID_LEN {
        return Err(StateError::InvalidProcessId(process.process_id.len()).into());
    }
    if process.block_count == 0 {
        return Err(AppError::Malformed("block count must be positive".into()));
    }
    if process.start_block < state.height() {
        return Err(AppError::ProcessNotActive(format!(
            "start block {} already passed",
            process.start_block
        )));
    }
    match state.process(&process.process_id, committed) {
        Ok(_) => return Err(StateError::ProcessAlreadyExists.into()),
        Err(StateError::ProcessNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    if deliver {
        debug!(process = %hex::encode(&process.process_id), oracle = %signer, "new process");
        state.add_process(process)?;
    }
    Ok(())
}

fn handle_set_process(
    state: &State,
    parsed: &ParsedTx,
    tx: &SetProcessTx,
    deliver: bool,
) -> Result<(), AppError> {
    let committed = !deliver;
    require_oracle(state, parsed, committed)?;

    match TxType::try_from(tx.tx_type).unwrap_or(TxType::Unknown) {
        TxType::SetProcessStatus => {
            let status = tx
                .status
                .and_then(|s| ProcessStatus::try_from(s).ok())
                .ok_or_else(|| AppError::Malformed("status missing".into()))?;
            if deliver {
                state.set_process_status(&tx.process_id, status)?;
            } else {
                state.check_process_status_change(&tx.process_id, status, committed)?;
            }
            Ok(())
        }
        TxType::SetProcessResults => {
            let results = tx
                .results
                .as_ref()
                .ok_or_else(|| AppError::Malformed("results missing".into()))?;
            if deliver {
                state.set_process_results(&tx.process_id, results)?;
            } else {
                let process = state.process(&tx.process_id, committed)?;
                if process.status() != ProcessStatus::Ended {
                    return Err(StateError::ProcessNotEnded.into());
                }
            }
            Ok(())
        }
        _ => Err(AppError::UnsupportedTx),
    }
}

fn handle_admin(
    state: &State,
    parsed: &ParsedTx,
    tx: &AdminTx,
    deliver: bool,
) -> Result<(), AppError> {
    let committed = !deliver;
    require_oracle(state, parsed, committed)?;

    match TxType::try_from(tx.tx_type).unwrap_or(TxType::Unknown) {
        TxType::AddOracle => {
            let address = admin_address(tx)?;
            if deliver {
                state.add_oracle(address)?;
            }
            Ok(())
        }
        TxType::RemoveOracle => {
            let address = admin_address(tx)?;
            if !state.is_oracle(address, committed)? {
                return Err(StateError::OracleNotFound.into());
            }
            if deliver {
                state.remove_oracle(address)?;
            }
            Ok(())
        }
        TxType::AddValidator => {
            let pub_key = tx
                .public_key
                .as_ref()
                .ok_or_else(|| AppError::Malformed("validator pubkey missing".into()))?;
            let power =
                tx.power.ok_or_else(|| AppError::Malformed("validator power missing".into()))?;
            let validator = Validator {
                address: validator_address(pub_key).to_vec(),
                pub_key: pub_key.clone(),
                power,
                name: tx.name.clone().unwrap_or_default(),
            };
            if deliver {
                state.add_validator(&validator)?;
            }
            Ok(())
        }
        TxType::RemoveValidator => {
            let address = admin_address(tx)?;
            let known = state
                .validators(committed)?
                .iter()
                .any(|v| v.address == address.as_slice());
            if !known {
                return Err(StateError::ValidatorNotFound.into());
            }
            if deliver {
                state.remove_validator(address.as_slice())?;
            }
            Ok(())
        }
        TxType::AddProcessKeys => {
            let (process, index) = admin_key_target(state, tx, committed)?;
            if !matches!(process.status(), ProcessStatus::Ready | ProcessStatus::Paused) {
                return Err(AppError::ProcessNotActive(format!(
                    "status {:?}",
                    process.status()
                )));
            }
            if tx.commitment_key.is_none() && tx.encryption_public_key.is_none() {
                return Err(AppError::Malformed("no key material".into()));
            }
            // Keys are append-only: the next slot is the current index.
            if index != process.key_index.unwrap_or(0) {
                return Err(AppError::InvalidKeyIndex);
            }
            if deliver {
                state.add_process_keys(tx)?;
            }
            Ok(())
        }
        TxType::RevealProcessKeys => {
            let (process, index) = admin_key_target(state, tx, committed)?;
            if !matches!(process.status(), ProcessStatus::Ended | ProcessStatus::Canceled) {
                return Err(AppError::ProcessNotActive(
                    "keys are revealed only after the process finishes".into(),
                ));
            }
            let key_index = process.key_index.unwrap_or(0);
            // Reveals unwind the adds in reverse order.
            if key_index == 0 || index != key_index - 1 {
                return Err(AppError::InvalidKeyIndex);
            }
            if deliver {
                state.reveal_process_keys(tx)?;
            }
            Ok(())
        }
        _ => Err(AppError::UnsupportedTx),
    }
}

fn handle_register_key(
    state: &State,
    parsed: &ParsedTx,
    tx: &RegisterKeyTx,
    deliver: bool,
) -> Result<(), AppError> {
    let committed = !deliver;
    recover_signer(parsed)?;

    let process = state.process(&tx.process_id, committed)?;
    if !process.mode.as_ref().is_some_and(|m| m.pre_register) {
        return Err(StateError::RegistrationNotSupported.into());
    }
    if state.height() >= process.start_block {
        return Err(StateError::RegistrationClosed.into());
    }
    if tx.new_key.len() != 32 {
        return Err(StateError::InvalidCensusKey(format!("{} bytes", tx.new_key.len())).into());
    }
    match state.key_to_index(&tx.process_id, &tx.new_key, committed) {
        Ok(_) => return Err(StateError::CensusKeyAlreadyRegistered.into()),
        Err(StateError::CensusKeyNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    if deliver {
        state.add_to_rolling_census(&tx.process_id, &tx.new_key, tx.weight)?;
    }
    Ok(())
}

fn admin_address(tx: &AdminTx) -> Result<Address, AppError> {
    let bytes =
        tx.address.as_ref().ok_or_else(|| AppError::Malformed("address missing".into()))?;
    if bytes.len() != Address::len_bytes() {
        return Err(AppError::Malformed(format!("address is {} bytes", bytes.len())));
    }
    Ok(Address::from_slice(bytes))
}

fn admin_key_target(
    state: &State,
    tx: &AdminTx,
    committed: bool,
) -> Result<(urna_proto::Process, u32), AppError> {
    let process_id = tx
        .process_id
        .as_ref()
        .ok_or_else(|| AppError::Malformed("process id missing".into()))?;
    let index = tx.key_index.ok_or(AppError::InvalidKeyIndex)?;
    let process = state.process(process_id, committed)?;
    Ok((process, index))
}

/// A validator's address is the low 20 bytes of the keccak-256 hash of
/// its public key.
pub(crate) fn validator_address(pub_key: &[u8]) -> Address {
    Address::from_slice(&keccak256(pub_key)[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarshal_rejects_garbage_and_empty_payloads() {
        assert!(matches!(unmarshal(&[0xFF, 0xFF, 0xFF]), Err(AppError::Malformed(_))));

        let empty = SignedTx { tx: Vec::new(), signature: vec![0u8; 65] };
        assert!(matches!(
            unmarshal(&empty.encode_to_vec()),
            Err(AppError::UnsupportedTx)
        ));
    }

    #[test]
    fn validator_address_is_pubkey_hash() {
        let pub_key = [0x02u8; 33];
        let address = validator_address(&pub_key);
        assert_eq!(address.as_slice(), &keccak256(pub_key)[12..]);
    }
}
