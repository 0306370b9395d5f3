//! Converts between the in-enclave `Batch`/`Rollup` representations and their
//! externally-shipped forms. Wire format (spec §6): `brotli-compress(
//! encrypted(cbor(payload)))`. The inner codec must match bit-for-bit between
//! sequencer and validators, so this is the single place that does the
//! conversion — nobody else composes compression and encryption by hand.

use enclave_crypto::data_encryption;
use enclave_types::{Batch, BatchPayload, ExtBatch, ExtRollup, Rollup, RollupHeader, SharedSecret};

use crate::{brotli_codec, cbor};

pub fn batch_to_ext(batch: &Batch, secret: &SharedSecret) -> anyhow::Result<ExtBatch> {
    let cbor = cbor::encode(&batch.payload)?;
    let encrypted = data_encryption::encrypt(secret, &cbor)
        .map_err(|e| anyhow::anyhow!("payload encryption failed: {e}"))?;
    let blob = brotli_codec::compress(&encrypted);
    Ok(ExtBatch {
        header: batch.header.clone(),
        blob,
    })
}

pub fn ext_to_batch(ext: &ExtBatch, secret: &SharedSecret) -> anyhow::Result<Batch> {
    let encrypted = brotli_codec::decompress(&ext.blob)?;
    let cbor = data_encryption::decrypt(secret, &encrypted)
        .map_err(|e| anyhow::anyhow!("payload decryption failed: {e}"))?;
    let payload: BatchPayload = cbor::decode(&cbor)?;
    Ok(Batch {
        header: ext.header.clone(),
        payload,
    })
}

/// The batch headers a rollup bundles, compressed (not encrypted — rollups
/// are published to L1 for public data availability, unlike batch payloads).
pub fn rollup_to_ext(rollup: &Rollup) -> anyhow::Result<ExtRollup> {
    let cbor = cbor::encode(&rollup.batch_headers)?;
    let blob = brotli_codec::compress(&cbor);
    Ok(ExtRollup {
        header: rollup.header.clone(),
        blob,
    })
}

pub fn ext_to_rollup(ext: &ExtRollup) -> anyhow::Result<Rollup> {
    let cbor = brotli_codec::decompress(&ext.blob)?;
    let batch_headers = cbor::decode(&cbor)?;
    Ok(Rollup {
        header: ext.header.clone(),
        batch_headers,
    })
}

pub fn rollup_header_for(
    from_seq: u64,
    to_seq: u64,
    l1_proof: primitive_types::H256,
    signature: enclave_types::Signature,
) -> RollupHeader {
    RollupHeader {
        from_seq,
        to_seq,
        l1_proof,
        signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_types::{BatchHeader, Signature};
    use primitive_types::H256;

    fn sample_batch() -> Batch {
        Batch {
            header: BatchHeader {
                seq_no: 1,
                height: 1,
                parent_hash: H256::zero(),
                l1_proof: H256::repeat_byte(1),
                timestamp: 1,
                state_root: H256::repeat_byte(2),
                transactions_root: H256::repeat_byte(3),
                receipts_root: H256::repeat_byte(4),
                signature: Signature::default(),
            },
            payload: BatchPayload::default(),
        }
    }

    #[test]
    fn batch_round_trips() {
        let secret = SharedSecret([7u8; 32]);
        let batch = sample_batch();
        let ext = batch_to_ext(&batch, &secret).unwrap();
        let recovered = ext_to_batch(&ext, &secret).unwrap();
        assert_eq!(recovered, batch);
    }

    #[test]
    fn rollup_round_trips() {
        let rollup = Rollup {
            header: rollup_header_for(1, 1, H256::zero(), Signature::default()),
            batch_headers: vec![sample_batch().header],
        };
        let ext = rollup_to_ext(&rollup).unwrap();
        let recovered = ext_to_rollup(&ext).unwrap();
        assert_eq!(recovered, rollup);
    }
}
