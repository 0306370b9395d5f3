//! An in-memory `Storage` implementation. Test-only ambient infrastructure:
//! production backends are out of scope for the enclave core (spec §1).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use enclave_types::{Batch, L1Block, L1BlockHeader, Receipt, Rollup, SharedSecret};
use primitive_types::H256;

use crate::{StateSnapshot, Storage};

#[derive(Default)]
struct Inner {
    l1_blocks: HashMap<H256, L1Block>,
    l1_head: Option<H256>,
    batches_by_hash: HashMap<H256, Batch>,
    batches_by_seq: HashMap<u64, H256>,
    receipts: HashMap<H256, Vec<Receipt>>,
    rollups: HashMap<H256, Rollup>,
    secret: Option<SharedSecret>,
    snapshots: HashMap<H256, StateSnapshot>,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_l1_block(&self, hash: H256) -> anyhow::Result<Option<L1Block>> {
        Ok(self.inner.read().unwrap().l1_blocks.get(&hash).cloned())
    }

    async fn store_l1_block(&self, block: L1Block) -> anyhow::Result<()> {
        let hash = block.hash();
        self.inner.write().unwrap().l1_blocks.insert(hash, block);
        Ok(())
    }

    async fn l1_head(&self) -> anyhow::Result<Option<L1BlockHeader>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .l1_head
            .and_then(|h| inner.l1_blocks.get(&h))
            .map(|b| b.header.clone()))
    }

    async fn set_l1_head(&self, hash: H256) -> anyhow::Result<()> {
        self.inner.write().unwrap().l1_head = Some(hash);
        Ok(())
    }

    async fn get_batch_by_hash(&self, hash: H256) -> anyhow::Result<Option<Batch>> {
        Ok(self.inner.read().unwrap().batches_by_hash.get(&hash).cloned())
    }

    async fn get_batch_by_seq(&self, seq: u64) -> anyhow::Result<Option<Batch>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .batches_by_seq
            .get(&seq)
            .and_then(|h| inner.batches_by_hash.get(h))
            .cloned())
    }

    async fn store_batch(&self, hash: H256, batch: Batch) -> anyhow::Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.batches_by_seq.insert(batch.header.seq_no, hash);
        inner.batches_by_hash.insert(hash, batch);
        Ok(())
    }

    async fn head_batch_seq(&self) -> anyhow::Result<Option<u64>> {
        Ok(self.inner.read().unwrap().batches_by_seq.keys().max().copied())
    }

    async fn get_receipts(&self, batch_hash: H256) -> anyhow::Result<Option<Vec<Receipt>>> {
        Ok(self.inner.read().unwrap().receipts.get(&batch_hash).cloned())
    }

    async fn store_receipts(&self, batch_hash: H256, receipts: Vec<Receipt>) -> anyhow::Result<()> {
        self.inner.write().unwrap().receipts.insert(batch_hash, receipts);
        Ok(())
    }

    async fn store_rollup(&self, hash: H256, rollup: Rollup) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().unwrap();
        if inner.rollups.contains_key(&hash) {
            return Ok(false);
        }
        inner.rollups.insert(hash, rollup);
        Ok(true)
    }

    async fn has_rollup(&self, hash: H256) -> anyhow::Result<bool> {
        Ok(self.inner.read().unwrap().rollups.contains_key(&hash))
    }

    async fn load_secret(&self) -> anyhow::Result<Option<SharedSecret>> {
        Ok(self.inner.read().unwrap().secret.clone())
    }

    async fn store_secret(&self, secret: SharedSecret) -> anyhow::Result<()> {
        self.inner.write().unwrap().secret = Some(secret);
        Ok(())
    }

    async fn get_snapshot(&self, batch_hash: H256) -> anyhow::Result<Option<StateSnapshot>> {
        Ok(self.inner.read().unwrap().snapshots.get(&batch_hash).cloned())
    }

    async fn put_snapshot(&self, batch_hash: H256, snapshot: StateSnapshot) -> anyhow::Result<()> {
        self.inner.write().unwrap().snapshots.insert(batch_hash, snapshot);
        Ok(())
    }

    async fn clear_snapshots(&self) -> anyhow::Result<()> {
        self.inner.write().unwrap().snapshots.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollup_dedup() {
        let storage = MemoryStorage::new();
        let rollup = Rollup {
            header: enclave_types::RollupHeader {
                from_seq: 1,
                to_seq: 2,
                l1_proof: H256::zero(),
                signature: enclave_types::Signature::default(),
            },
            batch_headers: vec![],
        };
        let hash = H256::repeat_byte(1);
        assert!(storage.store_rollup(hash, rollup.clone()).await.unwrap());
        assert!(!storage.store_rollup(hash, rollup).await.unwrap());
    }
}
