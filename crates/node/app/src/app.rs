//! The block driver.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use alloy_primitives::hex;
use tracing::{debug, error, info, warn};
use urna_config::EngineConfig;
use urna_kv::{RedbStore, Store};
use urna_proto::Header;
use urna_state::{EventListener, State, StateError};

use crate::{
    abci::{
        RequestBeginBlock, RequestCheckTx, RequestCommit, RequestDeliverTx, RequestInfo,
        RequestInitChain, RequestQuery, ResponseBeginBlock, ResponseCheckTx, ResponseCommit,
        ResponseDeliverTx, ResponseInfo, ResponseInitChain, ResponseQuery,
    },
    genesis::{parse_address, parse_hex, GenesisAppState},
    query, tx, AppError,
};

/// The application driven by the external consensus engine.
///
/// One block at a time: `begin_block`, any number of `deliver_tx`, then
/// `commit`. `check_tx` may be called concurrently from the mempool and
/// only ever reads the last committed view. A storage failure anywhere
/// in the block path aborts the process: continuing would let this
/// replica's root diverge silently.
pub struct App {
    state: State,
    halted: AtomicBool,
}

impl App {
    /// Open the application over the durable store configured in
    /// `config`.
    pub fn new(config: &EngineConfig) -> Result<Self, AppError> {
        let store =
            RedbStore::open(&config.data_dir).map_err(|e| StateError::StateDb(e.into()))?;
        Self::with_store(Arc::new(store), config.vote_cache_size)
    }

    /// Open the application over an arbitrary store (tests, ephemeral
    /// nodes).
    pub fn with_store(
        store: Arc<dyn Store>,
        vote_cache_size: usize,
    ) -> Result<Self, AppError> {
        Ok(Self { state: State::new(store, vote_cache_size)?, halted: AtomicBool::new(false) })
    }

    /// The application state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Register an event listener; must happen before the driver starts
    /// serving consensus requests.
    pub fn register_listener(&mut self, listener: Box<dyn EventListener>) {
        self.state.add_event_listener(listener);
    }

    /// Whether a listener halted the chain.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Handshake: report the last committed height and application hash.
    pub fn info(&self, request: &RequestInfo) -> ResponseInfo {
        if !request.version.is_empty() {
            debug!(version = %request.version, "consensus engine connected");
        }
        let header = match self.state.header(true) {
            Ok(header) => header,
            Err(e) => self.fatal(e.into()),
        };
        let last_block_app_hash = if header.app_hash.is_empty() {
            vec![0u8; 32]
        } else {
            header.app_hash
        };
        info!(
            height = header.height,
            app_hash = %hex::encode(&last_block_app_hash),
            "reporting application state"
        );
        ResponseInfo { last_block_height: header.height, last_block_app_hash }
    }

    /// Apply the genesis blob: initial oracles and validators, header at
    /// height 0 with a zero application hash.
    pub fn init_chain(&self, request: &RequestInitChain) -> Result<ResponseInitChain, AppError> {
        let genesis = GenesisAppState::from_json(&request.app_state_bytes)?;

        for oracle in &genesis.oracles {
            let address = parse_address(oracle)?;
            info!(oracle = %address, "adding genesis oracle");
            self.state.add_oracle(address)?;
        }
        for validator in &genesis.validators {
            let address = parse_address(&validator.address)?;
            let power = validator
                .power
                .parse::<u64>()
                .map_err(|e| AppError::Malformed(format!("validator power: {e}")))?;
            info!(validator = %address, power, "adding genesis validator");
            self.state.add_validator(&urna_proto::Validator {
                address: address.to_vec(),
                pub_key: parse_hex(&validator.pub_key)?,
                power,
                name: validator.name.clone(),
            })?;
        }

        self.state.set_header(&Header {
            height: 0,
            app_hash: vec![0u8; 32],
            timestamp: request.time,
            chain_id: request.chain_id.clone(),
        })?;
        match self.state.save() {
            Ok(_) => Ok(ResponseInitChain {}),
            Err(e) => self.fatal(e.into()),
        }
    }

    /// Start a block: throw away any in-flight work and store the new
    /// header.
    pub fn begin_block(
        &self,
        request: &RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, AppError> {
        if self.is_halted() {
            return Err(AppError::Halted("refusing block after halt".into()));
        }
        if let Err(e) = self.state.rollback() {
            self.fatal(e.into());
        }
        if let Err(e) = self.state.set_header(&request.header) {
            self.fatal(e.into());
        }
        debug!(height = request.header.height, "block started");
        Ok(ResponseBeginBlock {})
    }

    /// Mempool admission: stateless and read-only stateful validation
    /// against the last committed view. Never mutates.
    pub fn check_tx(&self, request: &RequestCheckTx) -> ResponseCheckTx {
        if self.is_halted() {
            let halted = AppError::Halted("engine halted".into());
            return ResponseCheckTx {
                code: halted.code(),
                data: Vec::new(),
                log: halted.to_string(),
            };
        }
        match tx::add_tx(&self.state, &request.tx, false) {
            Ok(()) => ResponseCheckTx::default(),
            Err(e) if e.is_validation() => {
                ResponseCheckTx { code: e.code(), data: Vec::new(), log: e.to_string() }
            }
            Err(e) => self.fatal(e),
        }
    }

    /// Apply one transaction of the current block.
    pub fn deliver_tx(&self, request: &RequestDeliverTx) -> ResponseDeliverTx {
        match tx::add_tx(&self.state, &request.tx, true) {
            Ok(()) => {
                self.state.notify_new_tx();
                self.state.tx_counter_add();
                ResponseDeliverTx::default()
            }
            Err(e) if e.is_validation() => {
                debug!(code = e.code(), reason = %e, "transaction rejected");
                ResponseDeliverTx { code: e.code(), data: Vec::new(), log: e.to_string() }
            }
            Err(e) => self.fatal(e),
        }
    }

    /// Finalize the block: persist the forest, publish the new view and
    /// return the new main root as the application hash.
    pub fn commit(&self, _request: &RequestCommit) -> Result<ResponseCommit, AppError> {
        match self.state.save() {
            Ok(root) => Ok(ResponseCommit { data: root.to_vec() }),
            Err(StateError::Halt(reason)) => {
                // The version is already persisted; only the chain stops.
                self.halted.store(true, Ordering::Release);
                warn!(reason, "consensus halt requested by listener");
                Err(AppError::Halted(reason))
            }
            Err(e) => self.fatal(e.into()),
        }
    }

    /// Serve a read-only query from the last committed view.
    pub fn query(&self, request: &RequestQuery) -> ResponseQuery {
        query::dispatch(&self.state, request)
    }

    /// Storage and engine failures must not produce response codes: a
    /// replica that keeps running after one diverges from the network.
    fn fatal(&self, e: AppError) -> ! {
        error!(error = %e, "fatal engine failure, aborting");
        panic!("fatal engine failure: {e}");
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::SigningKey;
    use prost::Message;
    use urna_kv::MemoryStore;
    use urna_proto::{
        AdminTx, EnvelopeType, NewProcessTx, Process, ProcessMode, ProcessStatus, SignedTx, Tx,
        TxPayload, TxType, Vote, VoteTx,
    };
    use urna_state::ListenerError;

    use super::*;

    fn new_app() -> App {
        App::with_store(Arc::new(MemoryStore::new()), 128).unwrap()
    }

    fn oracle_key() -> SigningKey {
        SigningKey::from_slice(&[0x11u8; 32]).unwrap()
    }

    fn oracle_address() -> alloy_primitives::Address {
        urna_crypto::address_from_key(oracle_key().verifying_key())
    }

    fn genesis_with_oracle(app: &App) {
        let genesis = format!(
            r#"{{"oracles": ["{}"], "validators": [
                {{"address": "0x2222222222222222222222222222222222222222",
                  "pub_key": "02aa", "power": "10", "name": "v0"}}
            ]}}"#,
            oracle_address(),
        );
        app.init_chain(&RequestInitChain {
            chain_id: "urna-test".into(),
            app_state_bytes: genesis.into_bytes(),
            time: 1_700_000_000,
        })
        .unwrap();
    }

    fn sign_tx(key: &SigningKey, payload: TxPayload) -> Vec<u8> {
        let tx_bytes = Tx { payload: Some(payload) }.encode_to_vec();
        let signature = urna_crypto::sign(key, &tx_bytes).unwrap();
        SignedTx { tx: tx_bytes, signature }.encode_to_vec()
    }

    fn header(height: u32) -> Header {
        Header {
            height,
            app_hash: vec![0u8; 32],
            timestamp: 1_700_000_000 + height as i64,
            chain_id: "urna-test".into(),
        }
    }

    fn test_process(pid: u8, start_block: u32) -> Process {
        Process {
            process_id: vec![pid; 32],
            entity_id: vec![0xEE; 32],
            census_root: vec![0xCC; 32],
            census_uri: Some("ipfs://census".into()),
            start_block,
            block_count: 10,
            status: ProcessStatus::Ready as i32,
            envelope_type: Some(EnvelopeType::default()),
            mode: Some(ProcessMode::default()),
            ..Default::default()
        }
    }

    fn new_process_tx(pid: u8, start_block: u32) -> Vec<u8> {
        sign_tx(
            &oracle_key(),
            TxPayload::NewProcess(NewProcessTx {
                nonce: vec![pid],
                process: Some(test_process(pid, start_block)),
            }),
        )
    }

    fn vote_tx(pid: u8, nullifier: u8) -> Vec<u8> {
        let voter = SigningKey::from_slice(&[0x77u8; 32]).unwrap();
        sign_tx(
            &voter,
            TxPayload::Vote(VoteTx {
                nonce: vec![nullifier],
                vote: Some(Vote {
                    process_id: vec![pid; 32],
                    nullifier: vec![nullifier; 32],
                    height: 0,
                    vote_package: vec![1, 2, 3],
                    proof: Vec::new(),
                }),
            }),
        )
    }

    #[test]
    fn genesis_then_info_reports_zero_height_and_zero_hash() {
        let app = new_app();
        genesis_with_oracle(&app);

        let info = app.info(&RequestInfo::default());
        assert_eq!(info.last_block_height, 0);
        assert_eq!(info.last_block_app_hash, vec![0u8; 32]);

        let oracles = app.state().oracles(true).unwrap();
        assert_eq!(oracles, vec![oracle_address()]);
        assert_eq!(app.state().validators(true).unwrap().len(), 1);
    }

    #[test]
    fn full_block_flow_creates_process_and_accepts_vote() {
        let app = new_app();
        genesis_with_oracle(&app);

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        let response = app.deliver_tx(&RequestDeliverTx { tx: new_process_tx(1, 1) });
        assert_eq!(response.code, 0, "{}", response.log);
        let commit = app.commit(&RequestCommit {}).unwrap();
        assert_eq!(commit.data.len(), 32);
        assert_ne!(commit.data, vec![0u8; 32]);

        app.begin_block(&RequestBeginBlock { header: header(2) }).unwrap();
        let response = app.deliver_tx(&RequestDeliverTx { tx: vote_tx(1, 0x01) });
        assert_eq!(response.code, 0, "{}", response.log);
        app.commit(&RequestCommit {}).unwrap();

        assert_eq!(app.state().count_votes(&[1u8; 32], true).unwrap(), 1);
    }

    #[test]
    fn duplicate_vote_in_one_block_is_rejected_without_root_change() {
        let app = new_app();
        genesis_with_oracle(&app);

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx: new_process_tx(1, 1) }).code, 0);
        app.commit(&RequestCommit {}).unwrap();

        app.begin_block(&RequestBeginBlock { header: header(2) }).unwrap();
        let tx = vote_tx(1, 0x01);
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx: tx.clone() }).code, 0);

        let root_after_first = app.state().working_hash().unwrap();
        let second = app.deliver_tx(&RequestDeliverTx { tx });
        assert_eq!(second.code, 12, "{}", second.log);
        assert_eq!(app.state().working_hash().unwrap(), root_after_first);
        assert_eq!(app.state().count_votes(&[1u8; 32], false).unwrap(), 1);
    }

    #[test]
    fn check_tx_never_mutates_state() {
        let app = new_app();
        genesis_with_oracle(&app);

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx: new_process_tx(1, 1) }).code, 0);
        app.commit(&RequestCommit {}).unwrap();

        let committed_root = app.state().app_hash().unwrap();
        let response = app.check_tx(&RequestCheckTx { tx: vote_tx(1, 0x02) });
        assert_eq!(response.code, 0, "{}", response.log);
        assert_eq!(app.state().app_hash().unwrap(), committed_root);
        assert_eq!(app.state().count_votes(&[1u8; 32], true).unwrap(), 0);
    }

    #[test]
    fn unauthorized_process_creation_is_rejected() {
        let app = new_app();
        genesis_with_oracle(&app);

        let interloper = SigningKey::from_slice(&[0x99u8; 32]).unwrap();
        let tx = sign_tx(
            &interloper,
            TxPayload::NewProcess(NewProcessTx {
                nonce: vec![1],
                process: Some(test_process(1, 1)),
            }),
        );
        let response = app.check_tx(&RequestCheckTx { tx });
        assert_eq!(response.code, AppError::Unauthorized(String::new()).code());
    }

    #[test]
    fn oracle_removal_keeps_tombstone_and_changes_root() {
        let app = new_app();
        genesis_with_oracle(&app);
        let extra = alloy_primitives::Address::repeat_byte(0xBB);
        app.state().add_oracle(extra).unwrap();
        app.state().save().unwrap();

        let root_before = app.state().app_hash().unwrap();
        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        let tx = sign_tx(
            &oracle_key(),
            TxPayload::Admin(AdminTx {
                tx_type: TxType::RemoveOracle as i32,
                nonce: vec![1],
                address: Some(extra.to_vec()),
                ..Default::default()
            }),
        );
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx }).code, 0);
        app.commit(&RequestCommit {}).unwrap();

        assert_eq!(app.state().oracles(true).unwrap(), vec![oracle_address()]);
        assert_ne!(app.state().app_hash().unwrap(), root_before);
        assert!(!app.state().is_oracle(extra, true).unwrap());
    }

    #[test]
    fn begin_block_is_idempotent_for_the_same_header() {
        let app = new_app();
        genesis_with_oracle(&app);

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx: new_process_tx(1, 1) }).code, 0);
        let root_discarded = app.state().working_hash().unwrap();

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        let root_fresh = app.state().working_hash().unwrap();
        assert_ne!(root_discarded, root_fresh);

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        assert_eq!(app.state().working_hash().unwrap(), root_fresh);
    }

    struct HaltAt {
        height: u32,
    }

    impl EventListener for HaltAt {
        fn commit(&self, height: u32) -> Result<(), ListenerError> {
            if height == self.height {
                return Err(ListenerError::Halt("planned halt".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn listener_halt_is_surfaced_and_blocks_further_blocks() {
        let mut app = new_app();
        app.register_listener(Box::new(HaltAt { height: 7 }));
        genesis_with_oracle(&app);

        for height in 1..7u32 {
            app.begin_block(&RequestBeginBlock { header: header(height) }).unwrap();
            app.commit(&RequestCommit {}).unwrap();
        }

        let version_before = app.state().app_hash().unwrap();
        app.begin_block(&RequestBeginBlock { header: header(7) }).unwrap();
        let result = app.commit(&RequestCommit {});
        assert!(matches!(result, Err(AppError::Halted(_))));
        assert!(app.is_halted());
        // The commit itself landed before the halt surfaced.
        assert_ne!(app.state().app_hash().unwrap(), version_before);
        assert_eq!(app.state().header(true).unwrap().height, 7);

        assert!(matches!(
            app.begin_block(&RequestBeginBlock { header: header(8) }),
            Err(AppError::Halted(_))
        ));
    }

    #[test]
    fn queries_serve_envelopes_and_heights() {
        let app = new_app();
        genesis_with_oracle(&app);

        app.begin_block(&RequestBeginBlock { header: header(1) }).unwrap();
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx: new_process_tx(1, 1) }).code, 0);
        assert_eq!(app.deliver_tx(&RequestDeliverTx { tx: vote_tx(1, 0x01) }).code, 0);
        app.commit(&RequestCommit {}).unwrap();

        let pid_hex = hex::encode([1u8; 32]);
        let nullifier_hex = hex::encode([0x01u8; 32]);

        let status = app.query(&RequestQuery {
            data: format!(
                r#"{{"method":"getEnvelopeStatus","processId":"{pid_hex}","nullifier":"{nullifier_hex}"}}"#
            )
            .into_bytes(),
        });
        assert_eq!(status.code, 0, "{}", status.info);

        let height = app.query(&RequestQuery {
            data: format!(r#"{{"method":"getEnvelopeHeight","processId":"{pid_hex}"}}"#)
                .into_bytes(),
        });
        assert_eq!(height.code, 0);
        let count = urna_proto::CountReply::decode(height.value.as_slice()).unwrap();
        assert_eq!(count.count, 1);

        let block_height = app.query(&RequestQuery {
            data: br#"{"method":"getBlockHeight"}"#.to_vec(),
        });
        assert_eq!(block_height.code, 0);
        let decoded = Header::decode(block_height.value.as_slice()).unwrap();
        assert_eq!(decoded.height, 1);

        let unknown = app.query(&RequestQuery {
            data: br#"{"method":"getSomethingElse"}"#.to_vec(),
        });
        assert_ne!(unknown.code, 0);
    }

    #[test]
    fn unsupported_and_malformed_txs_report_codes() {
        let app = new_app();
        genesis_with_oracle(&app);

        let garbage = app.check_tx(&RequestCheckTx { tx: vec![0xFF; 8] });
        assert_eq!(garbage.code, AppError::Malformed(String::new()).code());

        let empty = SignedTx { tx: Vec::new(), signature: vec![0u8; 65] };
        let unsupported = app.check_tx(&RequestCheckTx { tx: empty.encode_to_vec() });
        assert_eq!(unsupported.code, AppError::UnsupportedTx.code());
    }
}
