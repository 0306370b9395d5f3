use std::sync::Arc;

use enclave_compression::ext_to_rollup;
use enclave_crypto::hashing::{canonical_batch_hash, canonical_rollup_hash};
use enclave_crypto::keys::verify_signature;
use enclave_crypto::CryptoError;
use enclave_storage::Storage;
use enclave_types::ExtRollup;
use primitive_types::H160;
use primitive_types::H256;

#[derive(Debug, thiserror::Error)]
pub enum RollupConsumerError {
    #[error("rollup signature invalid: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("failed to decompress rollup: {0}")]
    Codec(anyhow::Error),
}

/// Result of a successful ingest. `missing_batches` lists batch hashes the
/// rollup references but which are not yet locally stored — the host is
/// responsible for backfilling them over P2P (spec §4.3 step 3); this is not
/// itself an error.
#[derive(Debug)]
pub struct ConsumeOutcome {
    pub accepted: bool,
    pub missing_batches: Vec<H256>,
}

pub struct RollupConsumer<S: Storage> {
    storage: Arc<S>,
    sequencer_id: H160,
}

impl<S: Storage> RollupConsumer<S> {
    pub fn new(storage: Arc<S>, sequencer_id: H160) -> Self {
        Self {
            storage,
            sequencer_id,
        }
    }

    /// Decompresses and verifies a rollup observed in an L1 receipt.
    /// Rollups within one L1 block must be fed in receipt order; across
    /// blocks, in L1 canonical order (spec §4.3 "Ordering contract") — this
    /// method itself is order-agnostic and relies on the caller to honour it.
    pub async fn consume(&self, ext: &ExtRollup) -> Result<ConsumeOutcome, RollupConsumerError> {
        let rollup = ext_to_rollup(ext).map_err(RollupConsumerError::Codec)?;

        let signing_hash = canonical_rollup_hash(&rollup.header);
        verify_signature(signing_hash, &rollup.header.signature, self.sequencer_id)?;

        let stored = self.storage.store_rollup(signing_hash, rollup.clone()).await?;
        if !stored {
            tracing::debug!(hash = ?signing_hash, "duplicate rollup ignored");
            return Ok(ConsumeOutcome {
                accepted: false,
                missing_batches: vec![],
            });
        }

        let mut missing_batches = Vec::new();
        for header in &rollup.batch_headers {
            let batch_hash = canonical_batch_hash(header);
            if self.storage.get_batch_by_hash(batch_hash).await?.is_none() {
                missing_batches.push(batch_hash);
            }
        }

        if !missing_batches.is_empty() {
            tracing::warn!(
                count = missing_batches.len(),
                "rollup references batches absent locally; host must backfill via P2P"
            );
        }

        Ok(ConsumeOutcome {
            accepted: true,
            missing_batches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_crypto::keys::EnclaveKeyPair;
    use enclave_storage::memory::MemoryStorage;
    use enclave_types::{Batch, BatchHeader, BatchPayload, Rollup, RollupHeader, Signature};

    fn header(seq: u64) -> BatchHeader {
        BatchHeader {
            seq_no: seq,
            height: seq,
            parent_hash: H256::zero(),
            l1_proof: H256::zero(),
            timestamp: seq,
            state_root: H256::repeat_byte(seq as u8),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            signature: Signature::default(),
        }
    }

    fn signed_ext_rollup(signer: &EnclaveKeyPair, headers: Vec<BatchHeader>) -> ExtRollup {
        let unsigned = RollupHeader {
            from_seq: headers.first().unwrap().seq_no,
            to_seq: headers.last().unwrap().seq_no,
            l1_proof: H256::zero(),
            signature: Signature::default(),
        };
        let hash = canonical_rollup_hash(&unsigned);
        let signature = signer.sign(hash);
        let rollup = Rollup {
            header: RollupHeader { signature, ..unsigned },
            batch_headers: headers,
        };
        enclave_compression::rollup_to_ext(&rollup).unwrap()
    }

    #[tokio::test]
    async fn accepts_and_reports_missing_batches() {
        let signer = EnclaveKeyPair::generate();
        let storage = Arc::new(MemoryStorage::new());
        let consumer = RollupConsumer::new(storage, signer.enclave_id());

        let ext = signed_ext_rollup(&signer, vec![header(1), header(2)]);
        let outcome = consumer.consume(&ext).await.unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.missing_batches.len(), 2);
    }

    #[tokio::test]
    async fn rejects_wrong_signer() {
        let signer = EnclaveKeyPair::generate();
        let impostor = EnclaveKeyPair::generate();
        let storage = Arc::new(MemoryStorage::new());
        let consumer = RollupConsumer::new(storage, signer.enclave_id());

        let ext = signed_ext_rollup(&impostor, vec![header(1)]);
        assert!(consumer.consume(&ext).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_rollup_is_ignored_not_errored() {
        let signer = EnclaveKeyPair::generate();
        let storage = Arc::new(MemoryStorage::new());
        let consumer = RollupConsumer::new(storage, signer.enclave_id());

        let ext = signed_ext_rollup(&signer, vec![header(1)]);
        let first = consumer.consume(&ext).await.unwrap();
        let second = consumer.consume(&ext).await.unwrap();

        assert!(first.accepted);
        assert!(!second.accepted);
    }

    #[tokio::test]
    async fn batch_present_locally_is_not_reported_missing() {
        let signer = EnclaveKeyPair::generate();
        let storage = Arc::new(MemoryStorage::new());
        let h = header(1);
        let batch_hash = canonical_batch_hash(&h);
        storage
            .store_batch(
                batch_hash,
                Batch {
                    header: h.clone(),
                    payload: BatchPayload::default(),
                },
            )
            .await
            .unwrap();

        let consumer = RollupConsumer::new(storage, signer.enclave_id());
        let ext = signed_ext_rollup(&signer, vec![h]);
        let outcome = consumer.consume(&ext).await.unwrap();

        assert!(outcome.accepted);
        assert!(outcome.missing_batches.is_empty());
    }
}
