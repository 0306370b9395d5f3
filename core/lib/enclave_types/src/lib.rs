//! Core data model shared by every enclave component: L1 blocks, L2 batches
//! and rollups, the shared secret envelope, and the `SystemError` taxonomy.

mod batch;
mod error;
mod l1;
mod rollup;
mod secret;

pub use batch::{
    Batch, BatchHeader, BatchPayload, Bloom, CrossChainMessage, ExtBatch, Log, Receipt, Signature,
    Transaction,
};
pub use error::{SystemError, SystemResult};
pub use l1::{BlockIngestion, ForkPath, L1Block, L1BlockHeader, L1Log, L1Receipt};
pub use rollup::{ExtRollup, Rollup, RollupHeader};
pub use secret::{SecretEnvelope, SharedSecret};

/// The sequencer-order-number of the genesis batch. Batches are dense from
/// here: the batch at `seq_no == GENESIS_SEQ_NO + 1` is the first non-genesis
/// batch and its parent must be the genesis batch.
pub const GENESIS_SEQ_NO: u64 = 1;
