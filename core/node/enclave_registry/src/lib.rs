//! In-memory projection of the executed-batch chain: head-of-chain tracking
//! and fan-out of executed-batch events (spec §4.5). Depends only on
//! `Storage` — never on the executor or the façade — so the
//! registry/executor/node-service cycle the source code had (spec §9) cannot
//! reoccur here.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use enclave_storage::Storage;
use enclave_types::{Batch, Receipt};
use tokio::sync::{broadcast, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("batch seq {got} is not the immediate successor of head {expected}")]
    NonMonotonicSeq { expected: u64, got: u64 },
}

#[derive(Debug, Clone)]
pub struct ExecutedBatchEvent {
    pub batch: Batch,
    pub receipts: Vec<Receipt>,
}

/// Exactly-one logical consumer (the `EnclaveService`): a `broadcast` channel
/// already gives "late subscribers only see new events" for free, since it
/// never replays events sent before a receiver subscribed.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct BatchRegistry<S: Storage> {
    storage: Arc<S>,
    head_seq: AtomicU64,
    last_advance: Mutex<Instant>,
    batch_production_timeout: Duration,
    sender: broadcast::Sender<ExecutedBatchEvent>,
}

const NO_HEAD: u64 = 0;

impl<S: Storage> BatchRegistry<S> {
    /// Seeds `head_seq` from `storage` so a restarted process picks up where
    /// it left off without needing the executor's recovery walk to have run
    /// first.
    pub async fn new(storage: Arc<S>, batch_production_timeout: Duration) -> anyhow::Result<Self> {
        let head_seq = storage.head_batch_seq().await?.unwrap_or(NO_HEAD);
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            storage,
            head_seq: AtomicU64::new(head_seq),
            last_advance: Mutex::new(Instant::now()),
            batch_production_timeout,
            sender,
        })
    }

    pub fn head_batch_seq(&self) -> Option<u64> {
        match self.head_seq.load(AtomicOrdering::SeqCst) {
            NO_HEAD => None,
            seq => Some(seq),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutedBatchEvent> {
        self.sender.subscribe()
    }

    /// Called once a batch has been executed and durably stored. Advances
    /// `head_batch_seq` and fans the event out to whatever is subscribed.
    pub async fn publish(
        &self,
        batch: Batch,
        receipts: Vec<Receipt>,
    ) -> Result<(), RegistryError> {
        let seq = batch.header.seq_no;
        let current = self.head_seq.load(AtomicOrdering::SeqCst);
        let expected_next = if current == NO_HEAD { seq } else { current + 1 };
        if seq != expected_next {
            return Err(RegistryError::NonMonotonicSeq {
                expected: expected_next,
                got: seq,
            });
        }

        self.head_seq.store(seq, AtomicOrdering::SeqCst);
        *self.last_advance.lock().await = Instant::now();

        // A send error only means nobody is currently subscribed; the event
        // is still durable in storage and was applied to head_seq above.
        if self.sender.send(ExecutedBatchEvent { batch, receipts }).is_err() {
            tracing::debug!(seq, "no registry subscribers for executed batch");
        }

        Ok(())
    }

    pub async fn healthy(&self) -> bool {
        self.last_advance.lock().await.elapsed() <= self.batch_production_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_storage::memory::MemoryStorage;
    use enclave_types::{BatchHeader, BatchPayload, Signature};
    use primitive_types::H256;

    fn batch(seq: u64) -> Batch {
        Batch {
            header: BatchHeader {
                seq_no: seq,
                height: seq,
                parent_hash: H256::zero(),
                l1_proof: H256::zero(),
                timestamp: seq,
                state_root: H256::zero(),
                transactions_root: H256::zero(),
                receipts_root: H256::zero(),
                signature: Signature::default(),
            },
            payload: BatchPayload::default(),
        }
    }

    #[tokio::test]
    async fn publish_advances_head_and_fans_out() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = BatchRegistry::new(storage, Duration::from_secs(10))
            .await
            .unwrap();

        let mut rx = registry.subscribe();
        registry.publish(batch(1), vec![]).await.unwrap();

        assert_eq!(registry.head_batch_seq(), Some(1));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.batch.header.seq_no, 1);
    }

    #[tokio::test]
    async fn late_subscriber_only_sees_new_events() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = BatchRegistry::new(storage, Duration::from_secs(10))
            .await
            .unwrap();

        registry.publish(batch(1), vec![]).await.unwrap();
        let mut rx = registry.subscribe();
        registry.publish(batch(2), vec![]).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.batch.header.seq_no, 2);
    }

    #[tokio::test]
    async fn rejects_non_monotonic_seq() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = BatchRegistry::new(storage, Duration::from_secs(10))
            .await
            .unwrap();

        registry.publish(batch(1), vec![]).await.unwrap();
        assert_matches::assert_matches!(
            registry.publish(batch(3), vec![]).await,
            Err(RegistryError::NonMonotonicSeq { expected: 2, got: 3 })
        );
    }

    #[tokio::test]
    async fn healthy_until_timeout_elapses() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = BatchRegistry::new(storage, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(registry.healthy().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!registry.healthy().await);
    }
}
