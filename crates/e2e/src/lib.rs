//! End-to-end testing harness for the voting state machine.
//!
//! Drives an [`App`] the way a consensus engine would: genesis, then
//! blocks of begin / deliver / commit, with helpers to build and sign
//! the transaction kinds. Tests compare committed roots across
//! independently driven instances, which is the property consensus
//! relies on.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::sync::Arc;

use k256::ecdsa::SigningKey;
use prost::Message;
use urna_app::{App, RequestBeginBlock, RequestCommit, RequestDeliverTx, RequestInitChain};
use urna_kv::{MemoryStore, Store};
use urna_proto::{Header, SignedTx, Tx, TxPayload};
use urna_state::EventListener;

#[cfg(test)]
mod tests;

/// A single-replica chain driven block by block.
pub struct TestChain {
    /// The application under test.
    pub app: App,
    height: u32,
}

impl TestChain {
    /// A chain over an in-memory store with one genesis oracle.
    pub fn new() -> Self {
        Self::with_setup(Arc::new(MemoryStore::new()), Vec::new())
    }

    /// A chain with listeners registered before genesis.
    pub fn with_setup(store: Arc<dyn Store>, listeners: Vec<Box<dyn EventListener>>) -> Self {
        let mut app = App::with_store(store, 1024).expect("open app");
        for listener in listeners {
            app.register_listener(listener);
        }
        let genesis = format!(
            r#"{{"oracles": ["{}"]}}"#,
            urna_crypto::address_from_key(Self::oracle_key().verifying_key()),
        );
        app.init_chain(&RequestInitChain {
            chain_id: "urna-e2e".into(),
            app_state_bytes: genesis.into_bytes(),
            time: 1_700_000_000,
        })
        .expect("init chain");
        Self { app, height: 0 }
    }

    /// The well-known genesis oracle key.
    pub fn oracle_key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).expect("static key")
    }

    /// Encode and sign a transaction payload.
    pub fn sign_tx(key: &SigningKey, payload: TxPayload) -> Vec<u8> {
        let tx_bytes = Tx { payload: Some(payload) }.encode_to_vec();
        let signature = urna_crypto::sign(key, &tx_bytes).expect("sign");
        SignedTx { tx: tx_bytes, signature }.encode_to_vec()
    }

    /// Start the next block.
    pub fn begin_block(&mut self) {
        self.height += 1;
        let app_hash = self.app.state().app_hash().expect("app hash").to_vec();
        self.app
            .begin_block(&RequestBeginBlock {
                header: Header {
                    height: self.height,
                    app_hash,
                    timestamp: 1_700_000_000 + self.height as i64,
                    chain_id: "urna-e2e".into(),
                },
            })
            .expect("begin block");
    }

    /// Deliver a raw transaction, returning the response code.
    pub fn deliver(&self, tx: Vec<u8>) -> u32 {
        self.app.deliver_tx(&RequestDeliverTx { tx }).code
    }

    /// Commit the current block, returning the new application hash.
    pub fn commit(&self) -> Vec<u8> {
        self.app.commit(&RequestCommit {}).expect("commit").data
    }

    /// Run one whole block over `txs` and return `(root, codes)`.
    pub fn run_block(&mut self, txs: Vec<Vec<u8>>) -> (Vec<u8>, Vec<u32>) {
        self.begin_block();
        let codes = txs.into_iter().map(|tx| self.deliver(tx)).collect();
        (self.commit(), codes)
    }
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}
