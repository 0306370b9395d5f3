use primitive_types::H256;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchHeader, Signature};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupHeader {
    pub from_seq: u64,
    pub to_seq: u64,
    pub l1_proof: H256,
    pub signature: Signature,
}

/// A signed bundle of consecutive batch headers, in `[from_seq, to_seq]`
/// order, published to L1 for data availability. The batch headers double as
/// the references-by-hash to the batches being finalised (their hash is the
/// batch hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub header: RollupHeader,
    pub batch_headers: Vec<BatchHeader>,
}

impl Rollup {
    pub fn batch_count(&self) -> usize {
        self.batch_headers.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtRollup {
    pub header: RollupHeader,
    pub blob: Vec<u8>,
}
