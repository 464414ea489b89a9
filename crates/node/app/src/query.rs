//! Read-only query surface.

use prost::Message;
use serde::{Deserialize, Serialize};
use urna_proto::{CountReply, EnvelopeListReply, ProcessKeysReply};
use urna_state::{State, StateError};

use crate::{
    abci::{RequestQuery, ResponseQuery},
    genesis::parse_hex,
    AppError,
};

/// A JSON query request; `method` selects the operation, the remaining
/// fields parameterize it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    /// One of the supported query methods.
    pub method: String,
    /// Hex process identifier.
    #[serde(default)]
    pub process_id: String,
    /// Hex nullifier.
    #[serde(default)]
    pub nullifier: String,
    /// Page start for list queries.
    #[serde(default)]
    pub from: usize,
    /// Page size for list queries.
    #[serde(default)]
    pub list_size: usize,
}

pub(crate) fn dispatch(state: &State, request: &RequestQuery) -> ResponseQuery {
    match run(state, &request.data) {
        Ok(value) => ResponseQuery { code: 0, info: "ok".into(), value },
        Err(e) => ResponseQuery { code: e.code(), info: e.to_string(), value: Vec::new() },
    }
}

fn run(state: &State, data: &[u8]) -> Result<Vec<u8>, AppError> {
    let query: QueryData = serde_json::from_slice(data)
        .map_err(|e| AppError::Query(format!("cannot unmarshal request: {e}")))?;

    match query.method.as_str() {
        "getEnvelopeStatus" => {
            let (pid, nullifier) = envelope_params(&query)?;
            if state.envelope_exists(&pid, &nullifier, true)? {
                Ok(Vec::new())
            } else {
                Err(StateError::VoteNotFound.into())
            }
        }
        "getEnvelope" => {
            let (pid, nullifier) = envelope_params(&query)?;
            let envelope = state.envelope(&pid, &nullifier, true)?;
            Ok(envelope.encode_to_vec())
        }
        "getEnvelopeHeight" => {
            let pid = parse_hex(&query.process_id)?;
            let count = state.count_votes(&pid, true)?;
            Ok(CountReply { count: count as u64 }.encode_to_vec())
        }
        "getBlockHeight" => {
            // An unreadable header is an engine defect, not an empty
            // result.
            let header = state.header(true)?;
            Ok(header.encode_to_vec())
        }
        "getEnvelopeList" => {
            let pid = parse_hex(&query.process_id)?;
            let nullifiers = state.envelope_list(&pid, query.from, query.list_size, true)?;
            Ok(EnvelopeListReply { nullifiers }.encode_to_vec())
        }
        "getProcessKeys" => {
            let pid = parse_hex(&query.process_id)?;
            let process = state.process(&pid, true)?;
            Ok(ProcessKeysReply {
                encryption_public_keys: process.encryption_public_keys,
                commitment_keys: process.commitment_keys,
                encryption_private_keys: process.encryption_private_keys,
                reveal_keys: process.reveal_keys,
            }
            .encode_to_vec())
        }
        other => Err(AppError::Query(format!("undefined query method {other}"))),
    }
}

fn envelope_params(query: &QueryData) -> Result<(Vec<u8>, Vec<u8>), AppError> {
    Ok((parse_hex(&query.process_id)?, parse_hex(&query.nullifier)?))
}
