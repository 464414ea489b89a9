//! Reply payloads for the query surface.
//!
//! Query replies are returned to the consensus engine as deterministic
//! protobuf bytes in the response value field.

/// A plain counter reply (vote counts, heights).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CountReply {
    /// The counted value.
    #[prost(uint64, tag = "1")]
    pub count: u64,
}

/// A page of envelope nullifiers for a process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvelopeListReply {
    /// Nullifiers in the deterministic iteration order of the votes tree.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub nullifiers: Vec<Vec<u8>>,
}

/// The published keys of a process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessKeysReply {
    /// Encryption public keys by key index (hex).
    #[prost(string, repeated, tag = "1")]
    pub encryption_public_keys: Vec<String>,
    /// Commitment keys by key index (hex).
    #[prost(string, repeated, tag = "2")]
    pub commitment_keys: Vec<String>,
    /// Revealed encryption private keys by key index (hex).
    #[prost(string, repeated, tag = "3")]
    pub encryption_private_keys: Vec<String>,
    /// Revealed commitment reveal keys by key index (hex).
    #[prost(string, repeated, tag = "4")]
    pub reveal_keys: Vec<String>,
}
