use primitive_types::H160;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Sequencer,
    Validator,
}

/// Every knob enumerated in the façade's external interface, plus the two
/// health-check bounds used internally (`batch_production_timeout`,
/// `l1_head_staleness_bound`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnclaveConfig {
    pub node_type: NodeType,
    pub sequencer_id: H160,
    pub obscuro_chain_id: u64,
    pub will_attest: bool,
    pub validate_l1_blocks: bool,
    pub genesis_json_path: Option<String>,
    pub profiler_enabled: bool,
    pub debug_namespace_enabled: bool,
    pub max_batch_size: u64,
    pub max_rollup_size: u64,
    pub gas_batch_execution_limit: u64,
    pub gas_local_execution_cap: u64,
    pub min_gas_price: u64,
    pub gas_payment_address: H160,
    pub base_fee: u64,
    pub message_bus_address: H160,
    pub host_id: String,
    pub host_address: String,

    /// Max time without head advancement before `BatchRegistry::health` turns
    /// unhealthy while the sequencer is active (spec §4.5).
    pub batch_production_timeout_secs: u64,
    /// Max time since the L1 head's own timestamp before
    /// `L1BlockProcessor::health` turns unhealthy (spec §4.2).
    pub l1_head_staleness_bound_secs: u64,
}

impl EnclaveConfig {
    /// Loads configuration from environment variables prefixed `ENCLAVE_`,
    /// e.g. `ENCLAVE_NODE_TYPE=sequencer`.
    pub fn from_env() -> anyhow::Result<Self> {
        envy::prefixed("ENCLAVE_")
            .from_env::<Self>()
            .map_err(|e| anyhow::anyhow!("failed to load enclave config from env: {e}"))
    }

    /// A config object suitable for use in unit and integration tests.
    pub fn for_tests(node_type: NodeType) -> Self {
        Self {
            node_type,
            sequencer_id: H160::repeat_byte(0xAB),
            obscuro_chain_id: 443,
            will_attest: false,
            validate_l1_blocks: true,
            genesis_json_path: None,
            profiler_enabled: false,
            debug_namespace_enabled: true,
            max_batch_size: 1024 * 1024,
            max_rollup_size: 4 * 1024 * 1024,
            gas_batch_execution_limit: 30_000_000,
            gas_local_execution_cap: 100_000_000,
            min_gas_price: 1,
            gas_payment_address: H160::zero(),
            base_fee: 1,
            message_bus_address: H160::zero(),
            host_id: "test-host".to_string(),
            host_address: "127.0.0.1:9000".to_string(),
            batch_production_timeout_secs: 30,
            l1_head_staleness_bound_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_tests_is_internally_consistent() {
        let cfg = EnclaveConfig::for_tests(NodeType::Sequencer);
        assert_eq!(cfg.node_type, NodeType::Sequencer);
        assert!(cfg.max_rollup_size > cfg.max_batch_size);
    }
}
