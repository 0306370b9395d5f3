use enclave_types::{BatchHeader, RollupHeader};
use primitive_types::H256;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

/// RLP field order is the wire contract between sequencer and validators —
/// this MUST match `enclave_types::BatchHeader`'s field order exactly and
/// never change without a protocol bump. The signature field itself is
/// excluded: it signs over everything else.
fn rlp_batch_header_unsigned(header: &BatchHeader) -> RlpStream {
    let mut s = RlpStream::new();
    s.begin_list(8);
    s.append(&header.seq_no);
    s.append(&header.height);
    s.append(&header.parent_hash.as_bytes());
    s.append(&header.l1_proof.as_bytes());
    s.append(&header.timestamp);
    s.append(&header.state_root.as_bytes());
    s.append(&header.transactions_root.as_bytes());
    s.append(&header.receipts_root.as_bytes());
    s
}

/// The hash signed by the sequencer and checked by validators (spec §3:
/// "Signature over a canonical header encoding").
pub fn canonical_batch_hash(header: &BatchHeader) -> H256 {
    let stream = rlp_batch_header_unsigned(header);
    H256::from_slice(&Keccak256::digest(stream.out()))
}

/// An Ethereum-header-shaped encoding of the same batch, used only so
/// EVM-facing tooling (block explorers, `eth_getBlockByHash`-style RPCs) can
/// address a batch the way it addresses an Ethereum block. Deliberately a
/// distinct hash from `canonical_batch_hash`: this one is never signed, it is
/// a display/lookup convenience computed after the batch is final.
pub fn converted_hash(header: &BatchHeader) -> H256 {
    let mut s = RlpStream::new();
    s.begin_list(7);
    s.append(&header.parent_hash.as_bytes());
    s.append(&header.state_root.as_bytes());
    s.append(&header.transactions_root.as_bytes());
    s.append(&header.receipts_root.as_bytes());
    s.append(&header.height);
    s.append(&header.timestamp);
    s.append(&header.l1_proof.as_bytes());
    H256::from_slice(&Keccak256::digest(s.out()))
}

fn rlp_rollup_header_unsigned(header: &RollupHeader) -> RlpStream {
    let mut s = RlpStream::new();
    s.begin_list(3);
    s.append(&header.from_seq);
    s.append(&header.to_seq);
    s.append(&header.l1_proof.as_bytes());
    s
}

pub fn canonical_rollup_hash(header: &RollupHeader) -> H256 {
    let stream = rlp_rollup_header_unsigned(header);
    H256::from_slice(&Keccak256::digest(stream.out()))
}

pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_types::Signature;

    fn header() -> BatchHeader {
        BatchHeader {
            seq_no: 1,
            height: 1,
            parent_hash: H256::zero(),
            l1_proof: H256::repeat_byte(1),
            timestamp: 42,
            state_root: H256::repeat_byte(2),
            transactions_root: H256::repeat_byte(3),
            receipts_root: H256::repeat_byte(4),
            signature: Signature::default(),
        }
    }

    #[test]
    fn hash_is_deterministic_and_signature_independent() {
        let mut h1 = header();
        let mut h2 = header();
        h2.signature = Signature([0xFFu8; 65]);
        assert_eq!(canonical_batch_hash(&h1), canonical_batch_hash(&h2));

        h1.timestamp += 1;
        assert_ne!(canonical_batch_hash(&h1), canonical_batch_hash(&h2));
    }

    #[test]
    fn converted_hash_differs_from_signing_hash() {
        let h = header();
        assert_ne!(canonical_batch_hash(&h), converted_hash(&h));
    }
}
