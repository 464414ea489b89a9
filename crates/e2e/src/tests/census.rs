//! Rolling census through the wire path.

use k256::ecdsa::SigningKey;
use urna_proto::{
    EnvelopeType, NewProcessTx, ProcessMode, RegisterKeyTx, TxPayload,
};

use super::test_process;
use crate::TestChain;

const NUM_KEYS: u64 = 16;

fn anonymous_process_tx(pid: u8, start_block: u32) -> Vec<u8> {
    let mut process = test_process(pid, start_block);
    process.envelope_type = Some(EnvelopeType { anonymous: true, ..Default::default() });
    process.mode = Some(ProcessMode { pre_register: true, dynamic_census: false });
    TestChain::sign_tx(
        &TestChain::oracle_key(),
        TxPayload::NewProcess(NewProcessTx { nonce: vec![pid], process: Some(process) }),
    )
}

fn census_key(i: u64) -> [u8; 32] {
    // Last byte zero keeps the key inside the Poseidon field.
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&(i + 1).to_le_bytes());
    key[8] = 0xA5;
    key
}

fn register_key_tx(pid: u8, i: u64) -> Vec<u8> {
    let mut seed = [0x60u8; 32];
    seed[0] = (i + 1) as u8;
    let voter = SigningKey::from_slice(&seed).expect("static key");
    TestChain::sign_tx(
        &voter,
        TxPayload::RegisterKey(RegisterKeyTx {
            nonce: i.to_le_bytes().to_vec(),
            process_id: vec![pid; 32],
            new_key: census_key(i).to_vec(),
            proof: vec![0x01],
            weight: Some(1),
        }),
    )
}

#[test]
fn rolling_census_fills_before_start_block_and_freezes() {
    let mut chain = TestChain::new();

    // Block 1: anonymous pre-register process starting at block 3.
    let (_, codes) = chain.run_block(vec![anonymous_process_tx(1, 3)]);
    assert_eq!(codes, vec![0]);

    // Block 2: enrollment window.
    let txs = (0..NUM_KEYS).map(|i| register_key_tx(1, i)).collect();
    let (_, codes) = chain.run_block(txs);
    assert!(codes.iter().all(|&code| code == 0), "codes: {codes:?}");

    let census_root_after_enrollment =
        chain.app.state().process(&[1u8; 32], true).unwrap().census_root;
    assert_ne!(census_root_after_enrollment, vec![0u8; 32]);

    // Block 3: the process has started; enrollment is closed and the
    // census root frozen.
    let late = register_key_tx(1, NUM_KEYS);
    let (_, codes) = chain.run_block(vec![late]);
    assert_ne!(codes[0], 0);

    let state = chain.app.state();
    let census_root_after_start = state.process(&[1u8; 32], true).unwrap().census_root;
    assert_eq!(census_root_after_enrollment, census_root_after_start);

    for i in 0..NUM_KEYS {
        let index = state.key_to_index(&[1u8; 32], &census_key(i), true).unwrap();
        assert_eq!(u64::from_le_bytes(index), i);
    }
    assert_eq!(state.rolling_census_size(&[1u8; 32], true).unwrap(), NUM_KEYS);
}

#[test]
fn duplicate_census_key_is_rejected() {
    let mut chain = TestChain::new();
    chain.run_block(vec![anonymous_process_tx(1, 5)]);

    let (_, codes) =
        chain.run_block(vec![register_key_tx(1, 0), register_key_tx(1, 0)]);
    assert_eq!(codes[0], 0);
    assert_ne!(codes[1], 0);
    assert_eq!(chain.app.state().rolling_census_size(&[1u8; 32], true).unwrap(), 1);
}

#[test]
fn census_replicas_agree_on_poseidon_roots() {
    let drive = || {
        let mut chain = TestChain::new();
        chain.run_block(vec![anonymous_process_tx(1, 4)]);
        let txs = (0..NUM_KEYS).map(|i| register_key_tx(1, i)).collect();
        let (root, codes) = chain.run_block(txs);
        assert!(codes.iter().all(|&code| code == 0));
        root
    };
    assert_eq!(drive(), drive());
}
