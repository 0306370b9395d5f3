use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// Header of an L1 block as seen by the enclave. The enclave never re-derives
/// consensus validity; it trusts the host to hand it blocks that already passed
/// L1 consensus and only checks internal consistency (receipts root, parent
/// linkage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1BlockHeader {
    pub height: u64,
    pub hash: H256,
    pub parent_hash: H256,
    pub receipts_root: H256,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Log {
    pub address: primitive_types::H160,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Receipt {
    pub tx_hash: H256,
    pub logs: Vec<L1Log>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Block {
    pub header: L1BlockHeader,
    pub receipts: Vec<L1Receipt>,
}

impl L1Block {
    pub fn hash(&self) -> H256 {
        self.header.hash
    }

    pub fn parent_hash(&self) -> H256 {
        self.header.parent_hash
    }
}

/// Result of feeding one L1 block through the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIngestion {
    pub block_hash: H256,
    pub is_fork: bool,
    pub fork_path: Option<ForkPath>,
}

/// Describes a reorg: the chain diverges at `common_ancestor`; `old_chain` and
/// `new_chain` list the abandoned and adopted block hashes, root-to-tip,
/// exclusive of the common ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkPath {
    pub common_ancestor: H256,
    pub old_chain: Vec<H256>,
    pub new_chain: Vec<H256>,
}
