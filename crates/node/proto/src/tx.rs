//! Transaction envelope and payload kinds.

use crate::{Process, ProcessResult, ProcessStatus, Vote};

/// Discriminates the operation a [`SetProcessTx`] or [`AdminTx`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TxType {
    /// Zero value; rejected.
    Unknown = 0,
    /// Change a process status along the lifecycle DAG.
    SetProcessStatus = 1,
    /// Publish results on an ended process.
    SetProcessResults = 2,
    /// Register an oracle address.
    AddOracle = 3,
    /// Tombstone an oracle address.
    RemoveOracle = 4,
    /// Register a consensus validator.
    AddValidator = 5,
    /// Tombstone a consensus validator.
    RemoveValidator = 6,
    /// Store a commitment/encryption key at the next key index.
    AddProcessKeys = 7,
    /// Reveal the matching private/reveal key.
    RevealProcessKeys = 8,
}

/// A ballot submission.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VoteTx {
    /// Replay-protection nonce; covered by the signature.
    #[prost(bytes = "vec", tag = "1")]
    pub nonce: Vec<u8>,
    /// The vote envelope.
    #[prost(message, optional, tag = "2")]
    pub vote: Option<Vote>,
}

/// Creation of a new process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NewProcessTx {
    /// Replay-protection nonce.
    #[prost(bytes = "vec", tag = "1")]
    pub nonce: Vec<u8>,
    /// The process to create; its ID must be unused.
    #[prost(message, optional, tag = "2")]
    pub process: Option<Process>,
}

/// Status change or results publication for an existing process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetProcessTx {
    /// Either `SetProcessStatus` or `SetProcessResults`.
    #[prost(enumeration = "TxType", tag = "1")]
    pub tx_type: i32,
    /// Replay-protection nonce.
    #[prost(bytes = "vec", tag = "2")]
    pub nonce: Vec<u8>,
    /// Target process.
    #[prost(bytes = "vec", tag = "3")]
    pub process_id: Vec<u8>,
    /// New status, for `SetProcessStatus`.
    #[prost(enumeration = "ProcessStatus", optional, tag = "4")]
    pub status: Option<i32>,
    /// Results, for `SetProcessResults`.
    #[prost(message, optional, tag = "5")]
    pub results: Option<ProcessResult>,
}

/// Privileged operation; must be signed by a registered oracle.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AdminTx {
    /// The administrative operation.
    #[prost(enumeration = "TxType", tag = "1")]
    pub tx_type: i32,
    /// Replay-protection nonce.
    #[prost(bytes = "vec", tag = "2")]
    pub nonce: Vec<u8>,
    /// Oracle or validator address, for add/remove operations.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub address: Option<Vec<u8>>,
    /// Validator public key, for `AddValidator`.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub public_key: Option<Vec<u8>>,
    /// Validator power, for `AddValidator`.
    #[prost(uint64, optional, tag = "5")]
    pub power: Option<u64>,
    /// Validator name, for `AddValidator`.
    #[prost(string, optional, tag = "6")]
    pub name: Option<String>,
    /// Target process, for key operations.
    #[prost(bytes = "vec", optional, tag = "7")]
    pub process_id: Option<Vec<u8>>,
    /// Key slot index, for key operations.
    #[prost(uint32, optional, tag = "8")]
    pub key_index: Option<u32>,
    /// Commitment key, for `AddProcessKeys`.
    #[prost(bytes = "vec", optional, tag = "9")]
    pub commitment_key: Option<Vec<u8>>,
    /// Encryption public key, for `AddProcessKeys`.
    #[prost(bytes = "vec", optional, tag = "10")]
    pub encryption_public_key: Option<Vec<u8>>,
    /// Encryption private key, for `RevealProcessKeys`.
    #[prost(bytes = "vec", optional, tag = "11")]
    pub encryption_private_key: Option<Vec<u8>>,
    /// Commitment reveal key, for `RevealProcessKeys`.
    #[prost(bytes = "vec", optional, tag = "12")]
    pub reveal_key: Option<Vec<u8>>,
}

/// Rolling-census enrollment of a voter key before the process starts.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterKeyTx {
    /// Replay-protection nonce.
    #[prost(bytes = "vec", tag = "1")]
    pub nonce: Vec<u8>,
    /// Target process; must be anonymous with pre-register mode.
    #[prost(bytes = "vec", tag = "2")]
    pub process_id: Vec<u8>,
    /// 32-byte voter key; high byte must be zero (Poseidon field).
    #[prost(bytes = "vec", tag = "3")]
    pub new_key: Vec<u8>,
    /// Off-chain census membership proof, passed through opaquely.
    #[prost(bytes = "vec", tag = "4")]
    pub proof: Vec<u8>,
    /// Optional voting weight; defaults to 1.
    #[prost(uint64, optional, tag = "5")]
    pub weight: Option<u64>,
}

/// The payload kinds a transaction can carry.
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum TxPayload {
    /// A ballot submission.
    #[prost(message, tag = "1")]
    Vote(VoteTx),
    /// Process creation.
    #[prost(message, tag = "2")]
    NewProcess(NewProcessTx),
    /// Status change or results publication.
    #[prost(message, tag = "3")]
    SetProcess(SetProcessTx),
    /// Privileged oracle operation.
    #[prost(message, tag = "4")]
    Admin(AdminTx),
    /// Rolling-census enrollment.
    #[prost(message, tag = "5")]
    RegisterKey(RegisterKeyTx),
}

/// An unsigned transaction; the deterministic encoding of this message is
/// what the envelope signature covers.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tx {
    /// The payload; absent or unrecognized payloads are unsupported.
    #[prost(oneof = "TxPayload", tags = "1, 2, 3, 4, 5")]
    pub payload: Option<TxPayload>,
}

/// The wire envelope delivered by consensus.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedTx {
    /// Deterministic encoding of a [`Tx`].
    #[prost(bytes = "vec", tag = "1")]
    pub tx: Vec<u8>,
    /// 65-byte recoverable ECDSA signature over `tx`.
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn signed_tx_roundtrip() {
        let tx = Tx {
            payload: Some(TxPayload::Admin(AdminTx {
                tx_type: TxType::AddOracle as i32,
                nonce: vec![1, 2, 3],
                address: Some(vec![0xAA; 20]),
                ..Default::default()
            })),
        };
        let envelope = SignedTx { tx: tx.encode_to_vec(), signature: vec![0u8; 65] };
        let bytes = envelope.encode_to_vec();
        let decoded = SignedTx::decode(bytes.as_slice()).unwrap();
        assert_eq!(envelope, decoded);

        let inner = Tx::decode(decoded.tx.as_slice()).unwrap();
        assert_eq!(tx, inner);
    }

    #[test]
    fn tx_encoding_is_deterministic() {
        let tx = Tx {
            payload: Some(TxPayload::RegisterKey(RegisterKeyTx {
                nonce: vec![9],
                process_id: vec![0x01; 32],
                new_key: vec![0x02; 32],
                proof: Vec::new(),
                weight: Some(1),
            })),
        };
        assert_eq!(tx.encode_to_vec(), tx.clone().encode_to_vec());
    }

    #[test]
    fn empty_payload_decodes_as_none() {
        let tx = Tx::decode(&[][..]).unwrap();
        assert!(tx.payload.is_none());
    }
}
