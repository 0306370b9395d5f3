//! The Sequencer and Validator roles (spec §4.6, §4.7). Modeled as a tagged
//! variant rather than a trait-object hierarchy (spec §9 "Role
//! polymorphism"): the two roles share machinery but diverge on a handful of
//! operations, so dispatch is a pattern match, not virtual dispatch.

pub mod mempool;

use std::sync::Mutex as StdMutex;

use enclave_compression::ext_to_batch;
use enclave_crypto::hashing::{canonical_batch_hash, converted_hash};
use enclave_crypto::keys::{verify_signature, EnclaveKeyPair};
use enclave_executor::{BatchExecutor, ExecutionContext, TransactionExecutor};
use enclave_registry::BatchRegistry;
use enclave_rollup::{RollupProducer, RollupProducerError};
use enclave_storage::{StateSnapshot, Storage};
use enclave_types::{
    Batch, BatchHeader, BatchPayload, ExtBatch, ExtRollup, ForkPath, L1Block, SharedSecret,
    Signature, GENESIS_SEQ_NO,
};
use primitive_types::H256;
use std::sync::Arc;

pub use mempool::Mempool;

#[derive(Debug, thiserror::Error)]
pub enum NodeServiceError {
    #[error("this operation is sequencer-only")]
    NotSequencer,

    #[error("this operation is validator-only")]
    NotValidator,

    #[error("parent batch (seq {0}) is not present locally")]
    MissingParent(u64),

    #[error("replay of batch #{seq_no} diverged: signed root {signed:?}, replayed root {replayed:?}")]
    Divergence {
        seq_no: u64,
        signed: H256,
        replayed: H256,
    },

    #[error("rollup production failed: {0}")]
    Rollup(#[from] RollupProducerError),

    #[error("registry error: {0}")]
    Registry(#[from] enclave_registry::RegistryError),

    #[error("signature verification failed: {0}")]
    Crypto(#[from] enclave_crypto::CryptoError),

    #[error("failed to decode submitted batch: {0}")]
    Codec(anyhow::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Capabilities every role supports, dispatched by pattern match on
/// `NodeService` rather than through a trait object (spec §9).
pub trait NodeCapability {
    fn on_l1_block(&self, block: &L1Block);
    fn on_l1_fork(&self, fork: &ForkPath);
    fn close(&self);
}

/// Tracks the L1 block the role should stamp into the next batch/rollup's
/// `l1_proof` field. Updated by `OnL1Block`, read by `CreateBatch`/
/// `CreateRollup` — shared by both roles so it lives in one place.
#[derive(Default)]
struct L1Cursor(StdMutex<H256>);

impl L1Cursor {
    fn set(&self, hash: H256) {
        *self.0.lock().unwrap() = hash;
    }

    fn get(&self) -> H256 {
        *self.0.lock().unwrap()
    }
}

pub struct SequencerState<S: Storage, T: TransactionExecutor> {
    storage: Arc<S>,
    registry: Arc<BatchRegistry<S>>,
    executor: BatchExecutor<T>,
    rollup_producer: RollupProducer<S>,
    key: EnclaveKeyPair,
    mempool: Mempool,
    l1_cursor: L1Cursor,
    gas_batch_execution_limit: u64,
    max_batch_size: u64,
}

pub struct ValidatorState<S: Storage, T: TransactionExecutor> {
    storage: Arc<S>,
    registry: Arc<BatchRegistry<S>>,
    executor: BatchExecutor<T>,
    sequencer_id: primitive_types::H160,
    l1_cursor: L1Cursor,
    gas_batch_execution_limit: u64,
}

pub enum NodeService<S: Storage, T: TransactionExecutor> {
    Sequencer(SequencerState<S, T>),
    Validator(ValidatorState<S, T>),
}

impl<S: Storage, T: TransactionExecutor> NodeService<S, T> {
    pub fn new_sequencer(
        storage: Arc<S>,
        registry: Arc<BatchRegistry<S>>,
        transaction_executor: T,
        key: EnclaveKeyPair,
        gas_batch_execution_limit: u64,
        max_batch_size: u64,
        max_rollup_size: u64,
    ) -> Self {
        NodeService::Sequencer(SequencerState {
            rollup_producer: RollupProducer::new(storage.clone(), max_rollup_size as usize),
            storage,
            registry,
            executor: BatchExecutor::new(transaction_executor),
            key,
            mempool: Mempool::new(),
            l1_cursor: L1Cursor::default(),
            gas_batch_execution_limit,
            max_batch_size,
        })
    }

    pub fn new_validator(
        storage: Arc<S>,
        registry: Arc<BatchRegistry<S>>,
        transaction_executor: T,
        sequencer_id: primitive_types::H160,
        gas_batch_execution_limit: u64,
    ) -> Self {
        NodeService::Validator(ValidatorState {
            storage,
            registry,
            executor: BatchExecutor::new(transaction_executor),
            sequencer_id,
            l1_cursor: L1Cursor::default(),
            gas_batch_execution_limit,
        })
    }

    pub fn as_sequencer(&self) -> Result<&SequencerState<S, T>, NodeServiceError> {
        match self {
            NodeService::Sequencer(s) => Ok(s),
            NodeService::Validator(_) => Err(NodeServiceError::NotSequencer),
        }
    }

    pub fn as_validator(&self) -> Result<&ValidatorState<S, T>, NodeServiceError> {
        match self {
            NodeService::Validator(v) => Ok(v),
            NodeService::Sequencer(_) => Err(NodeServiceError::NotValidator),
        }
    }

    pub fn on_l1_block(&self, block: &L1Block) {
        match self {
            NodeService::Sequencer(s) => s.on_l1_block(block),
            NodeService::Validator(v) => v.on_l1_block(block),
        }
    }

    pub fn on_l1_fork(&self, fork: &ForkPath) {
        match self {
            NodeService::Sequencer(s) => s.on_l1_fork(fork),
            NodeService::Validator(v) => v.on_l1_fork(fork),
        }
    }

    pub fn close(&self) {
        match self {
            NodeService::Sequencer(s) => s.close(),
            NodeService::Validator(v) => v.close(),
        }
    }
}

impl<S: Storage, T: TransactionExecutor> NodeCapability for SequencerState<S, T> {
    fn on_l1_block(&self, block: &L1Block) {
        self.l1_cursor.set(block.hash());
    }

    fn on_l1_fork(&self, fork: &ForkPath) {
        tracing::warn!(common_ancestor = ?fork.common_ancestor, "sequencer observed L1 fork");
    }

    fn close(&self) {
        tracing::info!("sequencer role closing");
    }
}

impl<S: Storage, T: TransactionExecutor> NodeCapability for ValidatorState<S, T> {
    fn on_l1_block(&self, block: &L1Block) {
        self.l1_cursor.set(block.hash());
    }

    fn on_l1_fork(&self, fork: &ForkPath) {
        tracing::warn!(common_ancestor = ?fork.common_ancestor, "validator observed L1 fork");
    }

    fn close(&self) {
        tracing::info!("validator role closing");
    }
}

impl<S: Storage, T: TransactionExecutor> SequencerState<S, T> {
    pub fn submit_tx(&self, tx: enclave_types::Transaction) {
        self.mempool.submit(tx);
    }

    /// Spec §4.6 "On CreateBatch": pulls from mempool, executes, signs,
    /// stores, and publishes. Returns `Ok(None)` when `skip_if_empty` is set
    /// and there is nothing to include.
    pub async fn create_batch(&self, skip_if_empty: bool) -> Result<Option<Batch>, NodeServiceError> {
        let head_seq = self.registry.head_batch_seq();
        let (seq_no, parent_hash, parent_state) = self.parent_context(head_seq).await?;

        let transactions = self
            .mempool
            .select(self.max_batch_size as usize, self.gas_batch_execution_limit);
        let messages = Vec::new(); // cross-chain message staging is wired by the façade, not minted here

        if skip_if_empty && transactions.is_empty() && messages.is_empty() {
            return Ok(None);
        }

        let timestamp = now_secs();
        let output = self.executor.execute(
            &parent_state,
            ExecutionContext { timestamp },
            &transactions,
            self.gas_batch_execution_limit,
        );

        let unsigned = BatchHeader {
            seq_no,
            height: seq_no - 1,
            parent_hash,
            l1_proof: self.l1_cursor.get(),
            timestamp,
            state_root: output.state_root,
            transactions_root: output.transactions_root,
            receipts_root: output.receipts_root,
            signature: Signature::default(),
        };
        let hash = canonical_batch_hash(&unsigned);
        let signature = self.key.sign(hash);
        let header = BatchHeader { signature, ..unsigned };

        let batch = Batch {
            header,
            payload: BatchPayload {
                transactions: output_transactions(transactions, &output),
                messages,
            },
        };

        self.storage.store_batch(hash, batch.clone()).await?;
        self.storage.store_receipts(hash, output.receipts.clone()).await?;
        self.storage.put_snapshot(hash, output.state).await?;
        self.registry.publish(batch.clone(), output.receipts).await?;

        tracing::info!(seq_no, "sequencer minted batch");
        Ok(Some(batch))
    }

    /// Spec §4.6 "On CreateRollup": collect `[fromSeq, head]`, truncate to
    /// fit, sign.
    pub async fn create_rollup(&self, from_seq: u64) -> Result<ExtRollup, NodeServiceError> {
        Ok(self
            .rollup_producer
            .produce(from_seq, self.l1_cursor.get(), &self.key)
            .await?)
    }

    async fn parent_context(
        &self,
        head_seq: Option<u64>,
    ) -> Result<(u64, H256, StateSnapshot), NodeServiceError> {
        match head_seq {
            None => Ok((GENESIS_SEQ_NO, H256::zero(), StateSnapshot::new())),
            Some(seq) => {
                let parent = self
                    .storage
                    .get_batch_by_seq(seq)
                    .await?
                    .ok_or(NodeServiceError::MissingParent(seq))?;
                let parent_hash = canonical_batch_hash(&parent.header);
                let parent_state = self
                    .storage
                    .get_snapshot(parent_hash)
                    .await?
                    .ok_or(NodeServiceError::MissingParent(seq))?;
                Ok((seq + 1, parent_hash, parent_state))
            }
        }
    }
}

impl<S: Storage, T: TransactionExecutor> ValidatorState<S, T> {
    /// Spec §4.7 "On SubmitBatch".
    pub async fn submit_batch(
        &self,
        ext: ExtBatch,
        secret: &SharedSecret,
    ) -> Result<(), NodeServiceError> {
        let seq_no = ext.header.seq_no;
        if seq_no > GENESIS_SEQ_NO + 1 {
            let parent_seq = seq_no - 1;
            if self.storage.get_batch_by_seq(parent_seq).await?.is_none() {
                return Err(NodeServiceError::MissingParent(parent_seq));
            }
        }

        let batch = ext_to_batch(&ext, secret).map_err(NodeServiceError::Codec)?;
        let hash = canonical_batch_hash(&batch.header);
        verify_signature(hash, &batch.header.signature, self.sequencer_id)?;

        // An Ethereum-header-equivalent hash for EVM-facing tooling; computed
        // on demand rather than cached, since the record Storage persists
        // (`Batch`) has no slot for it.
        let _converted = converted_hash(&batch.header);

        self.storage.store_batch(hash, batch).await?;
        self.execute_stored_batches(seq_no).await
    }

    /// Walks seq forward from the current executed head up to `up_to_seq`,
    /// re-executing each stored batch and asserting the roots match the
    /// sequencer's. Stops (without erroring the batches already applied) at
    /// the first mismatch — a hard divergence (spec §4.7 step 4).
    pub async fn execute_stored_batches(&self, up_to_seq: u64) -> Result<(), NodeServiceError> {
        let mut seq = self.registry.head_batch_seq().map(|s| s + 1).unwrap_or(GENESIS_SEQ_NO);

        while seq <= up_to_seq {
            let batch = self
                .storage
                .get_batch_by_seq(seq)
                .await?
                .ok_or(NodeServiceError::MissingParent(seq))?;

            let parent_state = if batch.header.is_genesis() {
                StateSnapshot::new()
            } else {
                let parent = self
                    .storage
                    .get_batch_by_seq(seq - 1)
                    .await?
                    .ok_or(NodeServiceError::MissingParent(seq - 1))?;
                let parent_hash = canonical_batch_hash(&parent.header);
                self.storage
                    .get_snapshot(parent_hash)
                    .await?
                    .ok_or(NodeServiceError::MissingParent(seq - 1))?
            };

            let output = self.executor.execute(
                &parent_state,
                ExecutionContext {
                    timestamp: batch.header.timestamp,
                },
                &batch.payload.transactions,
                self.gas_batch_execution_limit,
            );

            if output.state_root != batch.header.state_root {
                tracing::error!(
                    seq_no = seq,
                    signed = ?batch.header.state_root,
                    replayed = ?output.state_root,
                    "validator replay diverged from sequencer; refusing to advance head"
                );
                return Err(NodeServiceError::Divergence {
                    seq_no: seq,
                    signed: batch.header.state_root,
                    replayed: output.state_root,
                });
            }

            let hash = canonical_batch_hash(&batch.header);
            self.storage.put_snapshot(hash, output.state).await?;
            self.storage.store_receipts(hash, output.receipts.clone()).await?;
            self.registry.publish(batch, output.receipts).await?;

            seq += 1;
        }

        Ok(())
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `BatchExecutor::execute` returns the transactions it actually included
/// only implicitly (via `transactions_root`); the payload stored alongside
/// the header must list exactly those. Since the executor closes the batch
/// at the first tx that doesn't fit, the included set is always a prefix of
/// what was selected.
fn output_transactions(
    selected: Vec<enclave_types::Transaction>,
    output: &enclave_executor::ExecutionOutput,
) -> Vec<enclave_types::Transaction> {
    selected
        .into_iter()
        .take(output.receipts.len())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_crypto::keys::EnclaveKeyPair;
    use enclave_executor::ToyLedgerExecutor;
    use enclave_storage::memory::MemoryStorage;
    use std::time::Duration;

    async fn registry(storage: Arc<MemoryStorage>) -> Arc<BatchRegistry<MemoryStorage>> {
        Arc::new(
            BatchRegistry::new(storage, Duration::from_secs(60))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn sequencer_mints_genesis_batch() {
        let storage = Arc::new(MemoryStorage::new());
        let reg = registry(storage.clone()).await;
        let key = EnclaveKeyPair::generate();
        let service = NodeService::new_sequencer(
            storage,
            reg,
            ToyLedgerExecutor,
            key,
            30_000_000,
            1024 * 1024,
            4 * 1024 * 1024,
        );

        let seq = service.as_sequencer().unwrap();
        let batch = seq.create_batch(false).await.unwrap().unwrap();
        assert_eq!(batch.header.seq_no, GENESIS_SEQ_NO);
    }

    #[tokio::test]
    async fn sequencer_skips_empty_batch_when_asked() {
        let storage = Arc::new(MemoryStorage::new());
        let reg = registry(storage.clone()).await;
        let key = EnclaveKeyPair::generate();
        let service = NodeService::new_sequencer(
            storage,
            reg,
            ToyLedgerExecutor,
            key,
            30_000_000,
            1024 * 1024,
            4 * 1024 * 1024,
        );

        let seq = service.as_sequencer().unwrap();
        assert!(seq.create_batch(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validator_accepts_honest_batch_and_advances_head() {
        let sequencer_storage = Arc::new(MemoryStorage::new());
        let sequencer_reg = registry(sequencer_storage.clone()).await;
        let key = EnclaveKeyPair::generate();
        let sequencer = NodeService::new_sequencer(
            sequencer_storage,
            sequencer_reg,
            ToyLedgerExecutor,
            key.clone(),
            30_000_000,
            1024 * 1024,
            4 * 1024 * 1024,
        );
        let batch = sequencer
            .as_sequencer()
            .unwrap()
            .create_batch(false)
            .await
            .unwrap()
            .unwrap();

        let secret = SharedSecret([9u8; 32]);
        let ext = enclave_compression::batch_to_ext(&batch, &secret).unwrap();

        let validator_storage = Arc::new(MemoryStorage::new());
        let validator_reg = registry(validator_storage.clone()).await;
        let validator = NodeService::new_validator(
            validator_storage,
            validator_reg,
            ToyLedgerExecutor,
            key.enclave_id(),
            30_000_000,
        );

        validator
            .as_validator()
            .unwrap()
            .submit_batch(ext, &secret)
            .await
            .unwrap();
        assert_eq!(
            validator.as_validator().unwrap().registry.head_batch_seq(),
            Some(GENESIS_SEQ_NO)
        );
    }

    #[tokio::test]
    async fn validator_rejects_batch_from_wrong_signer() {
        let sequencer_storage = Arc::new(MemoryStorage::new());
        let sequencer_reg = registry(sequencer_storage.clone()).await;
        let key = EnclaveKeyPair::generate();
        let sequencer = NodeService::new_sequencer(
            sequencer_storage,
            sequencer_reg,
            ToyLedgerExecutor,
            key,
            30_000_000,
            1024 * 1024,
            4 * 1024 * 1024,
        );
        let batch = sequencer
            .as_sequencer()
            .unwrap()
            .create_batch(false)
            .await
            .unwrap()
            .unwrap();

        let secret = SharedSecret([9u8; 32]);
        let ext = enclave_compression::batch_to_ext(&batch, &secret).unwrap();

        let impostor = EnclaveKeyPair::generate();
        let validator_storage = Arc::new(MemoryStorage::new());
        let validator_reg = registry(validator_storage.clone()).await;
        let validator = NodeService::new_validator(
            validator_storage,
            validator_reg,
            ToyLedgerExecutor,
            impostor.enclave_id(),
            30_000_000,
        );

        assert!(matches!(
            validator.as_validator().unwrap().submit_batch(ext, &secret).await,
            Err(NodeServiceError::Crypto(_))
        ));
    }
}
