//! Stored state records.

/// Lifecycle status of a voting process.
///
/// Transitions form a DAG: `Ready` ↔ `Paused` → `Ended` → `Results`;
/// `Canceled` is terminal and reachable from any pre-`Ended` status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProcessStatus {
    /// Zero value; never stored.
    Unknown = 0,
    /// Accepting votes.
    Ready = 1,
    /// Voting period over.
    Ended = 2,
    /// Aborted before ending; terminal.
    Canceled = 3,
    /// Temporarily not accepting votes.
    Paused = 4,
    /// Results published; terminal.
    Results = 5,
}

/// Ballot envelope characteristics of a process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvelopeType {
    /// Ballots are cast one question at a time.
    #[prost(bool, tag = "1")]
    pub serial: bool,
    /// Ballots are anonymous (ZK-proof based, Poseidon census).
    #[prost(bool, tag = "2")]
    pub anonymous: bool,
    /// Ballots are encrypted until the process ends.
    #[prost(bool, tag = "3")]
    pub encrypted_votes: bool,
}

/// Administrative mode flags of a process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessMode {
    /// Voters enroll into a rolling census before the start block.
    #[prost(bool, tag = "1")]
    pub pre_register: bool,
    /// The census root may be updated while the process runs.
    #[prost(bool, tag = "2")]
    pub dynamic_census: bool,
}

/// Aggregated results for one ballot question.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QuestionResult {
    /// One tally per answer option, encoded as big-endian integers.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub question: Vec<Vec<u8>>,
}

/// Results of a finished process, as submitted by an oracle.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessResult {
    /// Per-question tallies.
    #[prost(message, repeated, tag = "1")]
    pub votes: Vec<QuestionResult>,
    /// Entity the results belong to.
    #[prost(bytes = "vec", tag = "2")]
    pub entity_id: Vec<u8>,
    /// Process the results belong to.
    #[prost(bytes = "vec", tag = "3")]
    pub process_id: Vec<u8>,
}

/// A voting process (campaign).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Process {
    /// 32-byte process identifier.
    #[prost(bytes = "vec", tag = "1")]
    pub process_id: Vec<u8>,
    /// Identifier of the entity that created the process.
    #[prost(bytes = "vec", tag = "2")]
    pub entity_id: Vec<u8>,
    /// Root of the process census tree; also the embedding slot for the
    /// on-chain census sub-tree of pre-register processes.
    #[prost(bytes = "vec", tag = "3")]
    pub census_root: Vec<u8>,
    /// Where the full census can be fetched from.
    #[prost(string, optional, tag = "4")]
    pub census_uri: Option<String>,
    /// Block height at which the process starts accepting votes.
    #[prost(uint32, tag = "5")]
    pub start_block: u32,
    /// Number of blocks the process lasts.
    #[prost(uint32, tag = "6")]
    pub block_count: u32,
    /// Current lifecycle status.
    #[prost(enumeration = "ProcessStatus", tag = "7")]
    pub status: i32,
    /// Envelope characteristics.
    #[prost(message, optional, tag = "8")]
    pub envelope_type: Option<EnvelopeType>,
    /// Mode flags.
    #[prost(message, optional, tag = "9")]
    pub mode: Option<ProcessMode>,
    /// Encryption public keys by key index (hex).
    #[prost(string, repeated, tag = "10")]
    pub encryption_public_keys: Vec<String>,
    /// Revealed encryption private keys by key index (hex).
    #[prost(string, repeated, tag = "11")]
    pub encryption_private_keys: Vec<String>,
    /// Commitment keys by key index (hex).
    #[prost(string, repeated, tag = "12")]
    pub commitment_keys: Vec<String>,
    /// Revealed commitment reveal keys by key index (hex).
    #[prost(string, repeated, tag = "13")]
    pub reveal_keys: Vec<String>,
    /// Number of added, not yet revealed key pairs.
    #[prost(uint32, optional, tag = "14")]
    pub key_index: Option<u32>,
    /// Oracle-submitted results; present only in status `Results`.
    #[prost(message, optional, tag = "15")]
    pub results: Option<ProcessResult>,
}

/// Wrapper stored as the process leaf: the process plus the root of its
/// votes sub-tree. The census root lives inside [`Process`] itself.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StateDbProcess {
    /// The process record.
    #[prost(message, optional, tag = "1")]
    pub process: Option<Process>,
    /// Root of the per-process votes sub-tree.
    #[prost(bytes = "vec", tag = "2")]
    pub votes_root: Vec<u8>,
}

/// A full vote envelope as carried by a vote transaction.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Vote {
    /// Process the vote belongs to.
    #[prost(bytes = "vec", tag = "1")]
    pub process_id: Vec<u8>,
    /// 32-byte nullifier; unique per process.
    #[prost(bytes = "vec", tag = "2")]
    pub nullifier: Vec<u8>,
    /// Height of the block that included the vote; stamped on delivery.
    #[prost(uint32, tag = "3")]
    pub height: u32,
    /// The ballot content (possibly encrypted).
    #[prost(bytes = "vec", tag = "4")]
    pub vote_package: Vec<u8>,
    /// Census membership proof, passed through opaquely.
    #[prost(bytes = "vec", tag = "5")]
    pub proof: Vec<u8>,
}

/// Compact vote record stored in the votes sub-tree.
///
/// The full envelope is hashed into `vote_hash` and not retained.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StateDbVote {
    /// Hash of the full encoded envelope.
    #[prost(bytes = "vec", tag = "1")]
    pub vote_hash: Vec<u8>,
    /// Process the vote belongs to.
    #[prost(bytes = "vec", tag = "2")]
    pub process_id: Vec<u8>,
    /// The vote's nullifier.
    #[prost(bytes = "vec", tag = "3")]
    pub nullifier: Vec<u8>,
    /// Height of the including block.
    #[prost(uint32, tag = "4")]
    pub height: u32,
}

/// A consensus validator.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Validator {
    /// 20-byte address, derived from the public key.
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    /// Consensus public key.
    #[prost(bytes = "vec", tag = "2")]
    pub pub_key: Vec<u8>,
    /// Voting power; zero power keeps the validator listed but inert.
    #[prost(uint64, tag = "3")]
    pub power: u64,
    /// Human-readable name.
    #[prost(string, tag = "4")]
    pub name: String,
}

/// Chain header, stored as a singleton under a reserved key and rewritten
/// at every block begin.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Block height; height 0 is genesis.
    #[prost(uint32, tag = "1")]
    pub height: u32,
    /// Application hash returned for the previous block.
    #[prost(bytes = "vec", tag = "2")]
    pub app_hash: Vec<u8>,
    /// Block time as a unix timestamp.
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    /// Chain identifier.
    #[prost(string, tag = "4")]
    pub chain_id: String,
}
