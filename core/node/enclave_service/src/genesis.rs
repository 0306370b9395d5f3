//! Genesis supplied by process configuration rather than replay (spec §4.8's
//! `GenesisProvider` seam). The real allocation/header format the chain
//! launches with is an L1 management-contract concern outside this core
//! (spec §1); until that wire format is pinned down, `genesis_json_path`
//! is accepted but not parsed and every enclave starts from the same empty
//! state at height zero.

use enclave_executor::state_cache::GenesisProvider;
use enclave_storage::StateSnapshot;
use enclave_types::{BatchHeader, Signature, GENESIS_SEQ_NO};
use primitive_types::H256;

pub struct ConfiguredGenesis {
    genesis_json_path: Option<String>,
}

impl ConfiguredGenesis {
    pub fn new(config: &enclave_config::EnclaveConfig) -> Self {
        Self {
            genesis_json_path: config.genesis_json_path.clone(),
        }
    }
}

impl GenesisProvider for ConfiguredGenesis {
    fn genesis_header(&self) -> BatchHeader {
        BatchHeader {
            seq_no: GENESIS_SEQ_NO,
            height: 0,
            parent_hash: H256::zero(),
            l1_proof: H256::zero(),
            timestamp: 0,
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            signature: Signature::default(),
        }
    }

    fn genesis_state(&self) -> StateSnapshot {
        if let Some(path) = &self.genesis_json_path {
            tracing::warn!(
                path,
                "genesis_json_path is set but allocation parsing is not implemented; starting from empty state"
            );
        }
        StateSnapshot::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_config::{EnclaveConfig, NodeType};

    #[test]
    fn defaults_to_empty_state_at_height_zero() {
        let config = EnclaveConfig::for_tests(NodeType::Sequencer);
        let genesis = ConfiguredGenesis::new(&config);
        assert_eq!(genesis.genesis_header().height, 0);
        assert!(genesis.genesis_state().is_empty());
    }
}
