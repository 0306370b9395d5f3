use enclave_types::Signature;
use primitive_types::{H160, H256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, Secp256k1, SecretKey,
};
use sha3::{Digest, Keccak256};

use crate::CryptoError;

/// The enclave's long-lived ECDSA identity keypair. The public half, reduced
/// to an Ethereum-style address, IS the `EnclaveId` (spec §3).
#[derive(Clone)]
pub struct EnclaveKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl std::fmt::Debug for EnclaveKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnclaveKeyPair")
            .field("public", &self.enclave_id())
            .finish()
    }
}

pub type EnclaveId = H160;

impl EnclaveKeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes).map_err(CryptoError::Secp256k1)?;
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Uncompressed public key, minus the leading `0x04` tag, hashed and
    /// truncated the Ethereum way to yield a 20-byte address.
    pub fn enclave_id(&self) -> EnclaveId {
        public_key_to_address(&self.public)
    }

    pub fn sign(&self, hash: H256) -> Signature {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest_slice(hash.as_bytes()).expect("H256 is 32 bytes");
        let sig = secp.sign_ecdsa_recoverable(&msg, &self.secret);
        let (rec_id, bytes) = sig.serialize_compact();
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&bytes);
        out[64] = rec_id.to_i32() as u8;
        Signature(out)
    }
}

pub fn public_key_to_address(public: &PublicKey) -> H160 {
    let uncompressed = public.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    H160::from_slice(&hash[12..])
}

/// Recovers the signer's address from a batch/rollup signature and checks it
/// against `expected`. This is the sole-sequencer check referenced throughout
/// spec §4 ("verifies against the sole SequencerID").
pub fn verify_signature(hash: H256, sig: &Signature, expected: EnclaveId) -> Result<(), CryptoError> {
    let recovered = recover_signer(hash, sig)?;
    if recovered == expected {
        Ok(())
    } else {
        Err(CryptoError::SignatureMismatch {
            expected,
            recovered,
        })
    }
}

pub fn recover_signer(hash: H256, sig: &Signature) -> Result<H160, CryptoError> {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(hash.as_bytes()).expect("H256 is 32 bytes");
    let rec_id = RecoveryId::from_i32(sig.0[64] as i32).map_err(CryptoError::Secp256k1)?;
    let rec_sig =
        RecoverableSignature::from_compact(&sig.0[..64], rec_id).map_err(CryptoError::Secp256k1)?;
    let public = secp
        .recover_ecdsa(&msg, &rec_sig)
        .map_err(CryptoError::Secp256k1)?;
    Ok(public_key_to_address(&public))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_round_trips() {
        let pair = EnclaveKeyPair::generate();
        let hash = H256::repeat_byte(7);
        let sig = pair.sign(hash);
        assert_eq!(recover_signer(hash, &sig).unwrap(), pair.enclave_id());
        verify_signature(hash, &sig, pair.enclave_id()).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_signer() {
        let pair = EnclaveKeyPair::generate();
        let other = EnclaveKeyPair::generate();
        let hash = H256::repeat_byte(7);
        let sig = pair.sign(hash);
        assert!(verify_signature(hash, &sig, other.enclave_id()).is_err());
    }
}
