//! Genesis application state.

use alloy_primitives::{hex, Address};
use serde::{Deserialize, Serialize};

use crate::AppError;

/// One validator entry of the genesis blob.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisValidator {
    /// 20-byte address, hex encoded.
    pub address: String,
    /// Consensus public key, hex encoded.
    pub pub_key: String,
    /// Voting power as a decimal string.
    pub power: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
}

/// The JSON application state applied once at chain initialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisAppState {
    /// Initial validator set.
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    /// Initial oracle addresses, hex encoded.
    #[serde(default)]
    pub oracles: Vec<String>,
}

impl GenesisAppState {
    /// Parse the genesis blob.
    pub fn from_json(bytes: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::Malformed(format!("genesis app state: {e}")))
    }
}

/// Decode a hex address, tolerating a `0x` prefix.
pub(crate) fn parse_address(s: &str) -> Result<Address, AppError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed)
        .map_err(|e| AppError::Malformed(format!("address {s}: {e}")))?;
    if bytes.len() != Address::len_bytes() {
        return Err(AppError::Malformed(format!("address {s}: wrong length")));
    }
    Ok(Address::from_slice(&bytes))
}

/// Decode a hex byte string, tolerating a `0x` prefix.
pub(crate) fn parse_hex(s: &str) -> Result<Vec<u8>, AppError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|e| AppError::Malformed(format!("hex field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_genesis() {
        let blob = br#"{
            "validators": [
                {
                    "address": "0x1111111111111111111111111111111111111111",
                    "pub_key": "02aabbccddeeff00112233445566778899aabbccddeeff00112233445566778899",
                    "power": "10",
                    "name": "validator-0"
                }
            ],
            "oracles": [
                "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"
            ]
        }"#;
        let genesis = GenesisAppState::from_json(blob).unwrap();
        assert_eq!(genesis.validators.len(), 1);
        assert_eq!(genesis.validators[0].power, "10");
        assert_eq!(genesis.oracles.len(), 2);
        assert_eq!(
            parse_address(&genesis.oracles[0]).unwrap(),
            Address::repeat_byte(0xAA)
        );
    }

    #[test]
    fn empty_genesis_defaults() {
        let genesis = GenesisAppState::from_json(b"{}").unwrap();
        assert!(genesis.validators.is_empty());
        assert!(genesis.oracles.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(GenesisAppState::from_json(b"not-json").is_err());
        assert!(parse_address("0x1234").is_err());
    }
}
