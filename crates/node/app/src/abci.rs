//! Request/response types of the consensus interface.
//!
//! These mirror the subset of the ABCI surface the engine consumes. A
//! zero `code` means success; errors carry their code plus a log line.

use urna_proto::Header;

/// Handshake request: consensus asks where the application stands.
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    /// Consensus engine version, for logging only.
    pub version: String,
}

/// Handshake reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    /// Height of the last committed block; 0 at genesis.
    pub last_block_height: u32,
    /// Application hash after the last committed block; 32 zero bytes at
    /// genesis.
    pub last_block_app_hash: Vec<u8>,
}

/// One-time genesis request.
#[derive(Clone, Debug, Default)]
pub struct RequestInitChain {
    /// Chain identifier.
    pub chain_id: String,
    /// JSON genesis application state.
    pub app_state_bytes: Vec<u8>,
    /// Genesis time as a unix timestamp.
    pub time: i64,
}

/// Genesis reply; an empty validator set defers to the genesis file.
#[derive(Clone, Debug, Default)]
pub struct ResponseInitChain {}

/// Block start: the header of the block about to be delivered.
#[derive(Clone, Debug)]
pub struct RequestBeginBlock {
    /// The block header; its `app_hash` is the root this application
    /// returned at the previous commit.
    pub header: Header,
}

/// Block start reply.
#[derive(Clone, Debug, Default)]
pub struct ResponseBeginBlock {}

/// Mempool admission request.
#[derive(Clone, Debug)]
pub struct RequestCheckTx {
    /// The raw signed transaction.
    pub tx: Vec<u8>,
}

/// Mempool admission reply.
#[derive(Clone, Debug, Default)]
pub struct ResponseCheckTx {
    /// 0 on success.
    pub code: u32,
    /// Optional payload.
    pub data: Vec<u8>,
    /// Human-readable reason on failure.
    pub log: String,
}

/// In-block transaction delivery.
#[derive(Clone, Debug)]
pub struct RequestDeliverTx {
    /// The raw signed transaction.
    pub tx: Vec<u8>,
}

/// Delivery reply.
#[derive(Clone, Debug, Default)]
pub struct ResponseDeliverTx {
    /// 0 on success.
    pub code: u32,
    /// Optional payload.
    pub data: Vec<u8>,
    /// Human-readable reason on failure.
    pub log: String,
}

/// Block finalization request.
#[derive(Clone, Debug, Default)]
pub struct RequestCommit {}

/// Block finalization reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseCommit {
    /// The new main root (application hash).
    pub data: Vec<u8>,
}

/// Read-only query request.
#[derive(Clone, Debug)]
pub struct RequestQuery {
    /// JSON-encoded [`QueryData`](crate::QueryData).
    pub data: Vec<u8>,
}

/// Query reply.
#[derive(Clone, Debug, Default)]
pub struct ResponseQuery {
    /// 0 on success.
    pub code: u32,
    /// Human-readable detail.
    pub info: String,
    /// Deterministically encoded protobuf reply payload.
    pub value: Vec<u8>,
}
