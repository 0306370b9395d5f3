//! Validates, stores, and orders incoming L1 blocks; detects forks against
//! the canonical L1 view; exposes the canonical L1 head (spec §4.2).

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use enclave_crypto::hashing::keccak256;
use enclave_storage::Storage;
use enclave_types::{BlockIngestion, ForkPath, L1Block, L1BlockHeader, L1Receipt};
use primitive_types::H256;

#[derive(Debug, thiserror::Error)]
pub enum L1IngestError {
    #[error("L1 block already processed")]
    AlreadyProcessed,

    #[error("receipts hash does not match block's receipts root")]
    BadReceiptsRoot,

    #[error("parent block not found locally")]
    AncestorNotFound,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

type HeadComparator = dyn Fn(&L1BlockHeader, &L1BlockHeader) -> Ordering + Send + Sync;

pub struct L1BlockProcessor<S: Storage> {
    storage: Arc<S>,
    head_comparator: Arc<HeadComparator>,
    staleness_bound: Duration,
}

/// Ordered hash of a block's receipts' transaction hashes. A stand-in for a
/// true Merkle-Patricia receipts trie, which belongs to the (out of scope)
/// EVM implementation; this enclave only needs to detect tampering between
/// what the host claims and what it sent.
pub fn compute_receipts_digest(receipts: &[L1Receipt]) -> H256 {
    let mut buf = Vec::with_capacity(receipts.len() * 32);
    for r in receipts {
        buf.extend_from_slice(r.tx_hash.as_bytes());
    }
    keccak256(&buf)
}

impl<S: Storage> L1BlockProcessor<S> {
    pub fn new(storage: Arc<S>, staleness_bound: Duration) -> Self {
        Self {
            storage,
            head_comparator: Arc::new(|a, b| a.height.cmp(&b.height)),
            staleness_bound,
        }
    }

    /// Overrides the most-work comparator. The L1 implementation's adapter
    /// supplies this (spec §4.2 step 3); the default orders by height alone,
    /// which is only correct for L1s without reorgable difficulty (tests use
    /// it as-is).
    pub fn with_comparator(
        storage: Arc<S>,
        staleness_bound: Duration,
        comparator: impl Fn(&L1BlockHeader, &L1BlockHeader) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self {
            storage,
            head_comparator: Arc::new(comparator),
            staleness_bound,
        }
    }

    pub async fn ingest(&self, block: L1Block) -> Result<BlockIngestion, L1IngestError> {
        let hash = block.hash();

        if compute_receipts_digest(&block.receipts) != block.header.receipts_root {
            return Err(L1IngestError::BadReceiptsRoot);
        }

        if self.storage.get_l1_block(hash).await?.is_some() {
            return Err(L1IngestError::AlreadyProcessed);
        }

        let is_genesis = self.storage.l1_head().await?.is_none();
        if !is_genesis && self.storage.get_l1_block(block.parent_hash()).await?.is_none() {
            return Err(L1IngestError::AncestorNotFound);
        }

        let old_head = self.storage.l1_head().await?;
        self.storage.store_l1_block(block.clone()).await?;

        let new_head_header = match &old_head {
            None => block.header.clone(),
            Some(old) if (self.head_comparator)(&block.header, old) == Ordering::Greater => {
                block.header.clone()
            }
            Some(old) => old.clone(),
        };

        if new_head_header.hash != hash {
            // The new block did not become head; nothing else to do.
            return Ok(BlockIngestion {
                block_hash: hash,
                is_fork: false,
                fork_path: None,
            });
        }

        self.storage.set_l1_head(hash).await?;

        let fork_path = match old_head {
            None => None,
            Some(old) => self.detect_fork(old.hash, hash).await?,
        };

        if let Some(ref path) = fork_path {
            tracing::warn!(
                common_ancestor = ?path.common_ancestor,
                abandoned = path.old_chain.len(),
                adopted = path.new_chain.len(),
                "L1 fork detected"
            );
        }

        Ok(BlockIngestion {
            block_hash: hash,
            is_fork: fork_path.is_some(),
            fork_path,
        })
    }

    async fn detect_fork(
        &self,
        old_head: H256,
        new_head: H256,
    ) -> Result<Option<ForkPath>, L1IngestError> {
        let old_chain = self.walk_to_genesis(old_head).await?;
        let new_chain = self.walk_to_genesis(new_head).await?;

        if old_chain.contains(&new_head) || new_chain.contains(&old_head) {
            // Simple extension of the same chain, not a fork.
            return Ok(None);
        }

        let old_set: std::collections::HashSet<_> = old_chain.iter().copied().collect();
        let common_ancestor = new_chain
            .iter()
            .copied()
            .find(|h| old_set.contains(h))
            .ok_or_else(|| {
                L1IngestError::Storage(anyhow::anyhow!(
                    "no common ancestor found between L1 chains"
                ))
            })?;

        let abandoned: Vec<H256> = old_chain
            .into_iter()
            .take_while(|h| *h != common_ancestor)
            .collect();
        let adopted: Vec<H256> = new_chain
            .into_iter()
            .take_while(|h| *h != common_ancestor)
            .collect();

        Ok(Some(ForkPath {
            common_ancestor,
            old_chain: abandoned.into_iter().rev().collect(),
            new_chain: adopted.into_iter().rev().collect(),
        }))
    }

    /// Walks parent pointers from `head` down to genesis, tip-first. Unbounded
    /// like the StateDB recovery walk (spec §9 open question); fine for the
    /// chain depths this enclave expects between forks.
    async fn walk_to_genesis(&self, head: H256) -> Result<Vec<H256>, L1IngestError> {
        let mut chain = Vec::new();
        let mut cursor = head;
        loop {
            chain.push(cursor);
            let block = self
                .storage
                .get_l1_block(cursor)
                .await?
                .ok_or_else(|| L1IngestError::Storage(anyhow::anyhow!("missing L1 block in chain walk")))?;
            if block.header.parent_hash == H256::zero() || block.header.parent_hash == cursor {
                break;
            }
            cursor = block.header.parent_hash;
        }
        Ok(chain)
    }

    pub async fn head(&self) -> anyhow::Result<Option<L1BlockHeader>> {
        self.storage.l1_head().await
    }

    pub async fn healthy(&self) -> bool {
        match self.storage.l1_head().await {
            Ok(Some(head)) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                now.saturating_sub(head.timestamp) <= self.staleness_bound.as_secs()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_storage::memory::MemoryStorage;

    fn block(height: u64, hash: u8, parent: u8, receipts: Vec<L1Receipt>) -> L1Block {
        L1Block {
            header: L1BlockHeader {
                height,
                hash: H256::repeat_byte(hash),
                parent_hash: H256::repeat_byte(parent),
                receipts_root: compute_receipts_digest(&receipts),
                timestamp: height,
            },
            receipts,
        }
    }

    #[tokio::test]
    async fn genesis_then_linear_extension() {
        let storage = Arc::new(MemoryStorage::new());
        let proc = L1BlockProcessor::new(storage, Duration::from_secs(1000));

        let a = block(1, 1, 0, vec![]);
        let ingestion = proc.ingest(a.clone()).await.unwrap();
        assert!(!ingestion.is_fork);

        let b = block(2, 2, 1, vec![]);
        let ingestion = proc.ingest(b).await.unwrap();
        assert!(!ingestion.is_fork);
        assert_eq!(proc.head().await.unwrap().unwrap().hash, H256::repeat_byte(2));
    }

    #[tokio::test]
    async fn already_processed_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let proc = L1BlockProcessor::new(storage, Duration::from_secs(1000));
        let a = block(1, 1, 0, vec![]);
        proc.ingest(a.clone()).await.unwrap();
        assert_matches::assert_matches!(proc.ingest(a).await, Err(L1IngestError::AlreadyProcessed));
    }

    #[tokio::test]
    async fn unknown_parent_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let proc = L1BlockProcessor::new(storage, Duration::from_secs(1000));
        let a = block(1, 1, 0, vec![]);
        proc.ingest(a).await.unwrap();
        let orphan = block(5, 9, 8, vec![]);
        assert_matches::assert_matches!(
            proc.ingest(orphan).await,
            Err(L1IngestError::AncestorNotFound)
        );
    }

    #[tokio::test]
    async fn fork_switches_head_and_reports_path() {
        let storage = Arc::new(MemoryStorage::new());
        let proc = L1BlockProcessor::new(storage, Duration::from_secs(1000));

        proc.ingest(block(1, 1, 0, vec![])).await.unwrap();
        proc.ingest(block(2, 2, 1, vec![])).await.unwrap();
        proc.ingest(block(3, 3, 2, vec![])).await.unwrap();

        // competing chain forks after block 1, eventually taller
        proc.ingest(block(2, 20, 1, vec![])).await.unwrap();
        proc.ingest(block(3, 30, 20, vec![])).await.unwrap();
        let ingestion = proc.ingest(block(4, 40, 30, vec![])).await.unwrap();

        assert!(ingestion.is_fork);
        let path = ingestion.fork_path.unwrap();
        assert_eq!(path.common_ancestor, H256::repeat_byte(1));
        assert_eq!(proc.head().await.unwrap().unwrap().hash, H256::repeat_byte(40));
    }
}
