use std::fmt;
use std::sync::OnceLock;

use enclave_crypto::hashing::keccak256;
use enclave_types::L1Log;
use primitive_types::H160;

use super::MessageProcessorError;

fn event_signature() -> primitive_types::H256 {
    static SIG: OnceLock<primitive_types::H256> = OnceLock::new();
    *SIG.get_or_init(|| keccak256(b"AttestationPublished(address,bytes)"))
}

/// A peer's attestation report, observed posted on L1 (spec §4.11,
/// "Attestation-gated exchange": "when a peer's attestation report is seen in
/// an L1 message"). `report_payload` is the attestation provider's opaque
/// binary report; `peer_pubkey` is the SEC1-compressed key the report claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationEvent {
    pub peer_enclave_id: H160,
    pub peer_pubkey: Vec<u8>,
    pub report_payload: Vec<u8>,
}

pub trait AttestationEventProcessor: fmt::Debug + Send + Sync {
    fn try_decode(&self, log: &L1Log) -> Result<Option<AttestationEvent>, MessageProcessorError>;
}

/// Layout: `topics[0]` signature, `topics[1]` (topic-encoded) peer enclave id;
/// `data` is `pubkey(33 bytes) || report_payload`.
#[derive(Debug)]
pub struct SecretExchangeProcessor {
    bus_address: H160,
}

impl SecretExchangeProcessor {
    pub fn new(bus_address: H160) -> Self {
        Self { bus_address }
    }
}

impl AttestationEventProcessor for SecretExchangeProcessor {
    fn try_decode(&self, log: &L1Log) -> Result<Option<AttestationEvent>, MessageProcessorError> {
        if log.address != self.bus_address {
            return Ok(None);
        }
        if log.topics.first() != Some(&event_signature()) {
            return Ok(None);
        }
        let peer_topic = log.topics.get(1).ok_or_else(|| MessageProcessorError::LogDecode {
            msg_kind: "AttestationPublished",
            source: anyhow::anyhow!("missing peer id topic"),
        })?;
        if log.data.len() < 33 {
            return Err(MessageProcessorError::LogDecode {
                msg_kind: "AttestationPublished",
                source: anyhow::anyhow!("data shorter than a compressed pubkey"),
            });
        }
        let peer_enclave_id = H160::from_slice(&peer_topic.as_bytes()[12..]);
        let peer_pubkey = log.data[..33].to_vec();
        let report_payload = log.data[33..].to_vec();

        Ok(Some(AttestationEvent {
            peer_enclave_id,
            peer_pubkey,
            report_payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H256;

    #[test]
    fn decodes_matching_log() {
        let bus = H160::repeat_byte(0xCC);
        let processor = SecretExchangeProcessor::new(bus);
        let peer = H160::repeat_byte(0x11);
        let mut topic_bytes = [0u8; 32];
        topic_bytes[12..].copy_from_slice(peer.as_bytes());

        let mut data = vec![0x02u8; 33];
        data.extend_from_slice(b"report-bytes");
        let log = L1Log {
            address: bus,
            topics: vec![event_signature(), H256(topic_bytes)],
            data,
        };

        let event = processor.try_decode(&log).unwrap().unwrap();
        assert_eq!(event.peer_enclave_id, peer);
        assert_eq!(event.report_payload, b"report-bytes");
    }
}
