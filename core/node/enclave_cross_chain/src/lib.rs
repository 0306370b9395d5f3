//! Scans L1 receipts for message-bus events and stages L2<->L1 messages
//! (spec §2 CrossChainProcessors); also drives the attestation-gated shared
//! secret exchange (spec §4.11).

mod message_processors;

use enclave_crypto::attestation::{AttestationProvider, AttestationReport};
use enclave_crypto::vault::KeyVault;
use enclave_types::{CrossChainMessage, L1Block, SecretEnvelope};
use primitive_types::H160;
use secp256k1::PublicKey;

pub use message_processors::{
    AttestationEvent, AttestationEventProcessor, L1ToL2MessageProcessor, MessageProcessor,
    MessageProcessorError, SecretExchangeProcessor,
};

#[derive(Debug, Default)]
pub struct CrossChainScanResult {
    pub messages: Vec<CrossChainMessage>,
    pub secret_responses: Vec<SecretEnvelope>,
}

pub struct CrossChainProcessors {
    message_processors: Vec<Box<dyn MessageProcessor>>,
    attestation_processors: Vec<Box<dyn AttestationEventProcessor>>,
}

impl CrossChainProcessors {
    pub fn new(message_bus_address: H160) -> Self {
        Self {
            message_processors: vec![Box::new(L1ToL2MessageProcessor::new(message_bus_address))],
            attestation_processors: vec![Box::new(SecretExchangeProcessor::new(
                message_bus_address,
            ))],
        }
    }

    pub fn scan(
        &self,
        block: &L1Block,
        attestation: &AttestationProvider,
        vault: &KeyVault,
    ) -> CrossChainScanResult {
        let mut result = CrossChainScanResult::default();

        for receipt in &block.receipts {
            for log in &receipt.logs {
                if let Some(message) = self.decode_message(log) {
                    result.messages.push(message);
                    continue;
                }
                if let Some(envelope) = self.decode_and_verify_attestation(log, attestation, vault)
                {
                    result.secret_responses.push(envelope);
                }
            }
        }

        result
    }

    fn decode_message(&self, log: &enclave_types::L1Log) -> Option<CrossChainMessage> {
        for processor in &self.message_processors {
            match processor.try_decode(log) {
                Ok(Some(msg)) => return Some(msg),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(processor = processor.name(), error = %err, "failed decoding message-bus log");
                }
            }
        }
        None
    }

    fn decode_and_verify_attestation(
        &self,
        log: &enclave_types::L1Log,
        attestation: &AttestationProvider,
        vault: &KeyVault,
    ) -> Option<SecretEnvelope> {
        for processor in &self.attestation_processors {
            let event = match processor.try_decode(log) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "failed decoding attestation log");
                    continue;
                }
            };

            let report = AttestationReport {
                enclave_id: event.peer_enclave_id,
                host_id: String::new(),
                host_address: String::new(),
                payload: event.report_payload,
            };

            return match attestation.verify(&report) {
                Ok(verified_id) if verified_id == event.peer_enclave_id => {
                    match PublicKey::from_slice(&event.peer_pubkey) {
                        Ok(peer_public) => match vault.envelope_for_peer(&peer_public) {
                            Ok(envelope) => Some(envelope),
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to build secret envelope for peer");
                                None
                            }
                        },
                        Err(err) => {
                            tracing::warn!(error = %err, "peer reported an invalid public key");
                            None
                        }
                    }
                }
                Ok(_) => {
                    tracing::warn!("attestation verified a different enclave id than claimed");
                    None
                }
                Err(err) => {
                    tracing::warn!(error = %err, "attestation verification failed");
                    None
                }
            };
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_crypto::keys::EnclaveKeyPair;
    use enclave_types::{L1BlockHeader, L1Log, L1Receipt};
    use primitive_types::H256;

    fn bus() -> H160 {
        H160::repeat_byte(0xBB)
    }

    #[test]
    fn stages_l1_to_l2_message() {
        let processors = CrossChainProcessors::new(bus());
        let attestation = AttestationProvider::dummy(false).unwrap();
        let vault = KeyVault::new(EnclaveKeyPair::generate());

        let sig = enclave_crypto::hashing::keccak256(b"L1ToL2Message(uint256,address,bytes)");
        let mut data = vec![0xAAu8; 20];
        data.extend_from_slice(b"payload");
        let block = L1Block {
            header: L1BlockHeader {
                height: 1,
                hash: H256::repeat_byte(1),
                parent_hash: H256::zero(),
                receipts_root: H256::zero(),
                timestamp: 1,
            },
            receipts: vec![L1Receipt {
                tx_hash: H256::repeat_byte(9),
                logs: vec![L1Log {
                    address: bus(),
                    topics: vec![sig, H256::from_low_u64_be(3)],
                    data,
                }],
            }],
        };

        let result = processors.scan(&block, &attestation, &vault);
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].nonce, 3);
        assert!(result.secret_responses.is_empty());
    }
}
