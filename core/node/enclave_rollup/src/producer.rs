use std::sync::Arc;

use enclave_compression::{brotli_codec, cbor, rollup_to_ext};
use enclave_crypto::hashing::canonical_rollup_hash;
use enclave_crypto::keys::EnclaveKeyPair;
use enclave_storage::Storage;
use enclave_types::{BatchHeader, ExtRollup, Rollup, RollupHeader, Signature};
use primitive_types::H256;

#[derive(Debug, thiserror::Error)]
pub enum RollupProducerError {
    #[error("registry has no head; cannot start a rollup")]
    NotInitialised,

    #[error("rollup range [{from_seq}, {to_seq}] has no batches that fit MaxRollupSize")]
    Empty { from_seq: u64, to_seq: u64 },

    #[error("batch #{0} is in range but missing from storage")]
    MissingBatch(u64),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub struct RollupProducer<S: Storage> {
    storage: Arc<S>,
    max_rollup_size: usize,
}

impl<S: Storage> RollupProducer<S> {
    pub fn new(storage: Arc<S>, max_rollup_size: usize) -> Self {
        Self {
            storage,
            max_rollup_size,
        }
    }

    /// Collects committed batches in `[from_seq, head]`, truncating the
    /// range at the highest seq that still fits `max_rollup_size` once
    /// compressed, then signs the result. `l1_proof` is the host-supplied
    /// current L1 head hash (the producer has no L1 view of its own, same as
    /// `BatchExecutor` takes its header fields from the caller).
    pub async fn produce(
        &self,
        from_seq: u64,
        l1_proof: H256,
        signer: &EnclaveKeyPair,
    ) -> Result<ExtRollup, RollupProducerError> {
        let head = self
            .storage
            .head_batch_seq()
            .await?
            .ok_or(RollupProducerError::NotInitialised)?;

        if from_seq > head {
            return Err(RollupProducerError::Empty {
                from_seq,
                to_seq: head,
            });
        }

        let mut headers = Vec::new();
        for seq in from_seq..=head {
            let batch = self
                .storage
                .get_batch_by_seq(seq)
                .await?
                .ok_or(RollupProducerError::MissingBatch(seq))?;
            headers.push(batch.header);
        }

        self.truncate_to_fit(&mut headers)?;
        if headers.is_empty() {
            return Err(RollupProducerError::Empty {
                from_seq,
                to_seq: head,
            });
        }

        let to_seq = headers.last().expect("checked non-empty above").seq_no;
        let unsigned = RollupHeader {
            from_seq,
            to_seq,
            l1_proof,
            signature: Signature::default(),
        };
        let hash = canonical_rollup_hash(&unsigned);
        let signature = signer.sign(hash);

        let rollup = Rollup {
            header: RollupHeader {
                signature,
                ..unsigned
            },
            batch_headers: headers,
        };

        tracing::info!(from_seq, to_seq, "produced rollup");
        Ok(rollup_to_ext(&rollup)?)
    }

    /// Drops the highest-seq headers one at a time until the compressed
    /// bundle fits `max_rollup_size` (spec §4.6 step 2).
    fn truncate_to_fit(&self, headers: &mut Vec<BatchHeader>) -> Result<(), RollupProducerError> {
        while !headers.is_empty() {
            let encoded = cbor::encode(&*headers)?;
            let blob = brotli_codec::compress(&encoded);
            if blob.len() <= self.max_rollup_size {
                return Ok(());
            }
            let dropped = headers.pop().expect("loop guard ensures non-empty");
            tracing::debug!(seq_no = dropped.seq_no, "dropped batch from rollup to fit MaxRollupSize");
        }
        Ok(())
    }
}
