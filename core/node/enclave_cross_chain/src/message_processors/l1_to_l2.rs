use std::sync::OnceLock;

use enclave_crypto::hashing::keccak256;
use enclave_types::{CrossChainMessage, L1Log};
use primitive_types::H160;

use super::{MessageProcessor, MessageProcessorError};

fn event_signature() -> primitive_types::H256 {
    static SIG: OnceLock<primitive_types::H256> = OnceLock::new();
    *SIG.get_or_init(|| keccak256(b"L1ToL2Message(uint256,address,bytes)"))
}

/// Decodes deposit/L1-to-L2-call events emitted by the message bus contract.
/// Layout: `topics[0]` is the event signature, `topics[1]` the nonce, the
/// log's emitting address is the sender; `data` is `target(20 bytes) ||
/// payload`.
#[derive(Debug)]
pub struct L1ToL2MessageProcessor {
    bus_address: H160,
}

impl L1ToL2MessageProcessor {
    pub fn new(bus_address: H160) -> Self {
        Self { bus_address }
    }
}

impl MessageProcessor for L1ToL2MessageProcessor {
    fn name(&self) -> &'static str {
        "l1_to_l2"
    }

    fn try_decode(&self, log: &L1Log) -> Result<Option<CrossChainMessage>, MessageProcessorError> {
        if log.address != self.bus_address {
            return Ok(None);
        }
        if log.topics.first() != Some(&event_signature()) {
            return Ok(None);
        }
        let nonce_topic = log.topics.get(1).ok_or_else(|| MessageProcessorError::LogDecode {
            msg_kind: "L1ToL2Message",
            source: anyhow::anyhow!("missing nonce topic"),
        })?;
        if log.data.len() < 20 {
            return Err(MessageProcessorError::LogDecode {
                msg_kind: "L1ToL2Message",
                source: anyhow::anyhow!("data shorter than target address"),
            });
        }
        let nonce = nonce_topic.to_low_u64_be();
        let target = H160::from_slice(&log.data[..20]);
        let payload = log.data[20..].to_vec();

        Ok(Some(CrossChainMessage {
            nonce,
            sender: log.address,
            target,
            topic: event_signature(),
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H256;

    #[test]
    fn decodes_matching_log() {
        let bus = H160::repeat_byte(0xBB);
        let processor = L1ToL2MessageProcessor::new(bus);

        let mut data = vec![0xAAu8; 20];
        data.extend_from_slice(b"hello l2");
        let log = enclave_types::L1Log {
            address: bus,
            topics: vec![event_signature(), H256::from_low_u64_be(7)],
            data,
        };

        let msg = processor.try_decode(&log).unwrap().unwrap();
        assert_eq!(msg.nonce, 7);
        assert_eq!(msg.target, H160::repeat_byte(0xAA));
        assert_eq!(msg.payload, b"hello l2");
    }

    #[test]
    fn ignores_other_addresses() {
        let processor = L1ToL2MessageProcessor::new(H160::repeat_byte(1));
        let log = enclave_types::L1Log {
            address: H160::repeat_byte(2),
            topics: vec![event_signature()],
            data: vec![0; 20],
        };
        assert!(processor.try_decode(&log).unwrap().is_none());
    }
}
