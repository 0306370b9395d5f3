use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha256;

use crate::CryptoError;

const NONCE_LEN: usize = 12;

/// ECIES over secp256k1: an ephemeral keypair does ECDH with the recipient's
/// static public key, HKDF-SHA256 turns the shared point into an AES-256 key,
/// and AES-256-GCM seals the plaintext. Output layout:
/// `ephemeral_pubkey(33) || nonce(12) || ciphertext+tag`.
///
/// Used both for the shared-secret envelopes (§4.11) and the viewing-key RPC
/// envelope (§4.10) — the only difference is which public key plays
/// "recipient".
pub fn encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let secp = Secp256k1::new();
    let ephemeral_secret = SecretKey::new(&mut rand::thread_rng());
    let ephemeral_public = PublicKey::from_secret_key(&secp, &ephemeral_secret);

    let key = derive_key(recipient, &ephemeral_secret)?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Aead(e.to_string()))?;

    let mut out = Vec::with_capacity(33 + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&ephemeral_public.serialize());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(recipient_secret: &SecretKey, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < 33 + NONCE_LEN {
        return Err(CryptoError::MalformedEnvelope(
            "envelope shorter than header".to_string(),
        ));
    }
    let (ephemeral_pub_bytes, rest) = envelope.split_at(33);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral_public =
        PublicKey::from_slice(ephemeral_pub_bytes).map_err(CryptoError::Secp256k1)?;

    let key = derive_key_from_public(&ephemeral_public, recipient_secret)?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Aead(e.to_string()))
}

fn derive_key(their_public: &PublicKey, our_secret: &SecretKey) -> Result<[u8; 32], CryptoError> {
    derive_key_from_public(their_public, our_secret)
}

fn derive_key_from_public(
    their_public: &PublicKey,
    our_secret: &SecretKey,
) -> Result<[u8; 32], CryptoError> {
    let shared = secp256k1::ecdh::SharedSecret::new(their_public, our_secret);
    let hk = Hkdf::<Sha256>::new(None, shared.as_ref());
    let mut key = [0u8; 32];
    hk.expand(b"enclave-ecies-v1", &mut key)
        .map_err(|_| CryptoError::Aead("HKDF expand failed".to_string()))?;
    Ok(key)
}
