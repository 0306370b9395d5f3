use primitive_types::{H160, H256};
use serde::{Deserialize, Serialize};

/// 65-byte recoverable ECDSA signature, kept as raw bytes here so this crate
/// has no crypto dependency; `enclave_crypto` knows how to produce/verify it.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub [u8; 65]);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.0))
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature([0u8; 65])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(pub [u8; 256]);

impl Default for Bloom {
    fn default() -> Self {
        Bloom([0u8; 256])
    }
}

impl Bloom {
    pub fn accrue(&mut self, topic: &H256) {
        // Same 3-bits-per-item bloom construction used by Ethereum clients:
        // each of 3 indices derived from the topic's hash sets a bit.
        for i in 0..3 {
            let bit = (((topic.0[i * 2] as usize) << 8) | topic.0[i * 2 + 1] as usize) & 2047;
            self.0[256 - 1 - bit / 8] |= 1 << (bit % 8);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: H160,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: H256,
    pub status: u8,
    pub gas_used: u64,
    pub logs: Vec<Log>,
    pub logs_bloom: Bloom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: H256,
    pub from: H160,
    pub to: Option<H160>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainMessage {
    pub nonce: u64,
    pub sender: H160,
    pub target: H160,
    pub topic: H256,
    pub payload: Vec<u8>,
}

/// Fixed-order fields that get RLP-encoded and hashed for signing — see
/// `enclave_crypto::hashing::canonical_batch_hash`. Field order here IS the
/// wire contract between sequencer and validators; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHeader {
    pub seq_no: u64,
    pub height: u64,
    pub parent_hash: H256,
    pub l1_proof: H256,
    pub timestamp: u64,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub signature: Signature,
}

impl BatchHeader {
    pub fn is_genesis(&self) -> bool {
        self.seq_no == crate::GENESIS_SEQ_NO
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchPayload {
    pub transactions: Vec<Transaction>,
    pub messages: Vec<CrossChainMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub header: BatchHeader,
    pub payload: BatchPayload,
}

impl Batch {
    pub fn hash(&self, hasher: impl Fn(&BatchHeader) -> H256) -> H256 {
        hasher(&self.header)
    }
}

/// The externally-shipped form: header in the clear, payload compressed and
/// encrypted. Round-trips losslessly to/from `Batch` via
/// `enclave_compression`/`enclave_crypto`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtBatch {
    pub header: BatchHeader,
    pub blob: Vec<u8>,
}
