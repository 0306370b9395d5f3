//! Abstract persistence contract. Storage exclusively owns all persisted
//! entities (spec §3 "Ownership & lifecycle"); every in-memory cache elsewhere
//! in the enclave holds non-owning handles and is rebuildable from Storage
//! alone. The real backend (a key-value/SQL store) is an external
//! collaborator, consumed only through this trait.

pub mod memory;

use async_trait::async_trait;
use enclave_types::{Batch, L1Block, L1BlockHeader, Receipt, Rollup, SharedSecret};
use primitive_types::H256;
use std::collections::BTreeMap;

/// Opaque post-execution state image, keyed by arbitrary account/storage
/// keys. The enclave core never interprets its contents — that's the EVM
/// implementation's job.
pub type StateSnapshot = BTreeMap<Vec<u8>, Vec<u8>>;

#[async_trait]
pub trait Storage: Send + Sync {
    // --- L1 blocks ---
    async fn get_l1_block(&self, hash: H256) -> anyhow::Result<Option<L1Block>>;
    async fn store_l1_block(&self, block: L1Block) -> anyhow::Result<()>;
    async fn l1_head(&self) -> anyhow::Result<Option<L1BlockHeader>>;
    async fn set_l1_head(&self, hash: H256) -> anyhow::Result<()>;

    // --- L2 batches ---
    async fn get_batch_by_hash(&self, hash: H256) -> anyhow::Result<Option<Batch>>;
    async fn get_batch_by_seq(&self, seq: u64) -> anyhow::Result<Option<Batch>>;
    async fn store_batch(&self, hash: H256, batch: Batch) -> anyhow::Result<()>;
    async fn head_batch_seq(&self) -> anyhow::Result<Option<u64>>;

    // --- receipts ---
    async fn get_receipts(&self, batch_hash: H256) -> anyhow::Result<Option<Vec<Receipt>>>;
    async fn store_receipts(&self, batch_hash: H256, receipts: Vec<Receipt>) -> anyhow::Result<()>;

    // --- rollups ---
    /// Returns `false` (and does not overwrite) if a rollup with this hash is
    /// already stored — the `DuplicateRollup` condition of spec §4.3.
    async fn store_rollup(&self, hash: H256, rollup: Rollup) -> anyhow::Result<bool>;
    async fn has_rollup(&self, hash: H256) -> anyhow::Result<bool>;

    // --- shared secret ---
    async fn load_secret(&self) -> anyhow::Result<Option<SharedSecret>>;
    async fn store_secret(&self, secret: SharedSecret) -> anyhow::Result<()>;

    // --- state cache ---
    async fn get_snapshot(&self, batch_hash: H256) -> anyhow::Result<Option<StateSnapshot>>;
    async fn put_snapshot(&self, batch_hash: H256, snapshot: StateSnapshot) -> anyhow::Result<()>;
    async fn clear_snapshots(&self) -> anyhow::Result<()>;
}
