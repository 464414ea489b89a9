mod census;

use k256::ecdsa::SigningKey;
use urna_proto::{
    EnvelopeType, NewProcessTx, Process, ProcessMode, ProcessStatus, TxPayload, Vote, VoteTx,
};

use crate::TestChain;

pub(crate) fn test_process(pid: u8, start_block: u32) -> Process {
    Process {
        process_id: vec![pid; 32],
        entity_id: vec![0xEE; 32],
        census_root: vec![0xCC; 32],
        census_uri: Some("ipfs://census".into()),
        start_block,
        block_count: 50,
        status: ProcessStatus::Ready as i32,
        envelope_type: Some(EnvelopeType::default()),
        mode: Some(ProcessMode::default()),
        ..Default::default()
    }
}

pub(crate) fn new_process_tx(pid: u8, start_block: u32) -> Vec<u8> {
    TestChain::sign_tx(
        &TestChain::oracle_key(),
        TxPayload::NewProcess(NewProcessTx {
            nonce: vec![pid],
            process: Some(test_process(pid, start_block)),
        }),
    )
}

pub(crate) fn vote_tx(pid: u8, nullifier: [u8; 32], package: Vec<u8>) -> Vec<u8> {
    let voter = SigningKey::from_slice(&[0x55u8; 32]).expect("static key");
    TestChain::sign_tx(
        &voter,
        TxPayload::Vote(VoteTx {
            nonce: nullifier[..4].to_vec(),
            vote: Some(Vote {
                process_id: vec![pid; 32],
                nullifier: nullifier.to_vec(),
                height: 0,
                vote_package: package,
                proof: Vec::new(),
            }),
        }),
    )
}
