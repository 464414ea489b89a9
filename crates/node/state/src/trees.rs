//! Sub-tree configurations and parent-leaf codecs for the domain forest.

use std::sync::{Arc, LazyLock};

use alloy_primitives::B256;
use prost::Message;
use urna_proto::StateDbProcess;
use urna_statedb::{RootCodec, RootLeafCodec, StateDbError, TreeConfig};
use urna_tree::{PoseidonHasher, Sha256Hasher, HASH_LEN};

/// Size of a process identifier.
pub const PROCESS_ID_LEN: usize = 32;

/// Size of a vote nullifier.
pub const NULLIFIER_LEN: usize = 32;

/// Reserved main-tree key holding the serialized chain header.
pub const HEADER_KEY: &[u8] = b"__header__";

/// Codec rewriting the votes root inside a stored process leaf.
#[derive(Clone, Copy, Debug, Default)]
pub struct VotesRootCodec;

impl RootCodec for VotesRootCodec {
    fn get_root(&self, parent_leaf: &[u8]) -> Result<B256, StateDbError> {
        let record = StateDbProcess::decode(parent_leaf)
            .map_err(|e| StateDbError::InvalidParentLeaf(e.to_string()))?;
        root_from_field(&record.votes_root)
    }

    fn set_root(&self, parent_leaf: &[u8], root: &B256) -> Result<Vec<u8>, StateDbError> {
        let mut record = StateDbProcess::decode(parent_leaf)
            .map_err(|e| StateDbError::InvalidParentLeaf(e.to_string()))?;
        record.votes_root = root.to_vec();
        Ok(record.encode_to_vec())
    }
}

/// Codec rewriting the census root inside a stored process leaf.
#[derive(Clone, Copy, Debug, Default)]
pub struct CensusRootCodec;

impl RootCodec for CensusRootCodec {
    fn get_root(&self, parent_leaf: &[u8]) -> Result<B256, StateDbError> {
        let record = StateDbProcess::decode(parent_leaf)
            .map_err(|e| StateDbError::InvalidParentLeaf(e.to_string()))?;
        let process = record
            .process
            .ok_or_else(|| StateDbError::InvalidParentLeaf("process record is empty".into()))?;
        root_from_field(&process.census_root)
    }

    fn set_root(&self, parent_leaf: &[u8], root: &B256) -> Result<Vec<u8>, StateDbError> {
        let mut record = StateDbProcess::decode(parent_leaf)
            .map_err(|e| StateDbError::InvalidParentLeaf(e.to_string()))?;
        let process = record
            .process
            .as_mut()
            .ok_or_else(|| StateDbError::InvalidParentLeaf("process record is empty".into()))?;
        process.census_root = root.to_vec();
        Ok(record.encode_to_vec())
    }
}

fn root_from_field(field: &[u8]) -> Result<B256, StateDbError> {
    if field.len() != HASH_LEN {
        return Err(StateDbError::InvalidParentLeaf(format!(
            "embedded root is {} bytes, expected {HASH_LEN}",
            field.len()
        )));
    }
    Ok(B256::from_slice(field))
}

static ORACLES_CFG: LazyLock<TreeConfig> = LazyLock::new(|| {
    TreeConfig::singleton("oracs", Arc::new(Sha256Hasher), 256, Arc::new(RootLeafCodec))
});

static VALIDATORS_CFG: LazyLock<TreeConfig> = LazyLock::new(|| {
    TreeConfig::singleton("valids", Arc::new(Sha256Hasher), 256, Arc::new(RootLeafCodec))
});

static PROCESSES_CFG: LazyLock<TreeConfig> = LazyLock::new(|| {
    TreeConfig::singleton("procs", Arc::new(Sha256Hasher), 256, Arc::new(RootLeafCodec))
});

static VOTES_CFG: LazyLock<TreeConfig> = LazyLock::new(|| {
    TreeConfig::non_singleton("votes", Arc::new(Sha256Hasher), 256, Arc::new(VotesRootCodec))
});

static CENSUS_CFG: LazyLock<TreeConfig> = LazyLock::new(|| {
    TreeConfig::non_singleton("cen", Arc::new(Sha256Hasher), 256, Arc::new(CensusRootCodec))
});

static CENSUS_POSEIDON_CFG: LazyLock<TreeConfig> = LazyLock::new(|| {
    TreeConfig::non_singleton("cenPos", Arc::new(PoseidonHasher), 64, Arc::new(CensusRootCodec))
});

/// The oracles sub-tree: addresses of principals allowed to submit
/// administrative and results transactions.
pub fn oracles_cfg() -> &'static TreeConfig {
    &ORACLES_CFG
}

/// The validators sub-tree.
pub fn validators_cfg() -> &'static TreeConfig {
    &VALIDATORS_CFG
}

/// The processes sub-tree; each leaf embeds that process's votes and
/// census roots.
pub fn processes_cfg() -> &'static TreeConfig {
    &PROCESSES_CFG
}

/// The per-process votes sub-tree family.
pub fn votes_cfg() -> &'static TreeConfig {
    &VOTES_CFG
}

/// The per-process census family for non-anonymous processes.
pub fn census_cfg() -> &'static TreeConfig {
    &CENSUS_CFG
}

/// The per-process census family for anonymous processes; Poseidon
/// hashed so census membership is provable inside a SNARK.
pub fn census_poseidon_cfg() -> &'static TreeConfig {
    &CENSUS_POSEIDON_CFG
}

#[cfg(test)]
mod tests {
    use urna_proto::Process;

    use super::*;

    fn leaf_with_roots(census: u8, votes: u8) -> Vec<u8> {
        StateDbProcess {
            process: Some(Process {
                process_id: vec![0x01; 32],
                census_root: vec![census; 32],
                ..Default::default()
            }),
            votes_root: vec![votes; 32],
        }
        .encode_to_vec()
    }

    #[test]
    fn votes_codec_roundtrip() {
        let codec = VotesRootCodec;
        let leaf = leaf_with_roots(0xCC, 0x00);
        assert_eq!(codec.get_root(&leaf).unwrap(), B256::ZERO);

        let new_root = B256::repeat_byte(0xDD);
        let rewritten = codec.set_root(&leaf, &new_root).unwrap();
        assert_eq!(codec.get_root(&rewritten).unwrap(), new_root);
        // The census root is untouched.
        assert_eq!(CensusRootCodec.get_root(&rewritten).unwrap(), B256::repeat_byte(0xCC));
    }

    #[test]
    fn census_codec_roundtrip() {
        let codec = CensusRootCodec;
        let leaf = leaf_with_roots(0x00, 0xEE);
        assert_eq!(codec.get_root(&leaf).unwrap(), B256::ZERO);

        let new_root = B256::repeat_byte(0xAB);
        let rewritten = codec.set_root(&leaf, &new_root).unwrap();
        assert_eq!(codec.get_root(&rewritten).unwrap(), new_root);
        assert_eq!(VotesRootCodec.get_root(&rewritten).unwrap(), B256::repeat_byte(0xEE));
    }

    #[test]
    fn codecs_reject_garbage_leaves() {
        assert!(VotesRootCodec.get_root(&[0xFF, 0x01, 0x02]).is_err());
        assert!(CensusRootCodec.set_root(&[0xFF, 0x01, 0x02], &B256::ZERO).is_err());
    }

    #[test]
    fn configs_use_expected_kinds() {
        assert_eq!(oracles_cfg().kind_id(), "oracs");
        assert_eq!(validators_cfg().kind_id(), "valids");
        assert_eq!(processes_cfg().kind_id(), "procs");
        assert_eq!(votes_cfg().kind_id(), "votes");
        assert_eq!(census_cfg().kind_id(), "cen");
        assert_eq!(census_poseidon_cfg().kind_id(), "cenPos");
        assert!(processes_cfg().is_singleton());
        assert!(!votes_cfg().is_singleton());
    }
}
