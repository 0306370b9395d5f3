//! The envelope every user-originating RPC goes through (spec §4.10): a
//! `(validate, execute)` pair. `validate` opens the caller's ECIES envelope
//! and checks their viewing-key signature binds the request to the claimed
//! `from` address; `execute` runs the caller-supplied handler and re-seals
//! the response under the caller's own key before it leaves the enclave.

use enclave_compression::cbor;
use enclave_crypto::keys::{public_key_to_address, EnclaveKeyPair};
use enclave_crypto::{ecies, viewing_key, CryptoError};
use enclave_types::Signature;
use primitive_types::H160;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("malformed RPC envelope: {0}")]
    Codec(#[from] anyhow::Error),

    #[error("viewer public key does not hash to the claimed from address")]
    IdentityMismatch,

    #[error("request handler failed: {0}")]
    Handler(anyhow::Error),
}

/// Wire-format plaintext carried inside the ECIES envelope. `viewer_pubkey`
/// is carried alongside `from` because a signature only lets us recover an
/// address, not the public key needed to encrypt the response back.
#[derive(Debug, Serialize, Deserialize)]
struct RpcEnvelopePlaintext {
    from: H160,
    viewer_pubkey: Vec<u8>,
    payload: Vec<u8>,
    signature: Signature,
}

/// A request that has passed viewing-key validation: the caller's claimed
/// identity is authenticated, and we hold their public key for the response.
pub struct ValidatedRequest {
    pub from: H160,
    pub payload: Vec<u8>,
    viewer_pubkey: PublicKey,
}

/// The caller-supplied read logic. Snapshot selection ("latest" or a
/// specific batch hash, spec §4.10) is encoded inside `payload` by the
/// concrete RPC method and is this trait's implementor's concern, not the
/// envelope's.
pub trait RpcHandler: Send + Sync {
    fn execute(&self, from: H160, payload: &[u8]) -> Result<Vec<u8>, anyhow::Error>;
}

pub struct EncryptionManager {
    identity: EnclaveKeyPair,
}

impl EncryptionManager {
    pub fn new(identity: EnclaveKeyPair) -> Self {
        Self { identity }
    }

    /// Decrypts `envelope` with the enclave's ECIES key, then checks the
    /// viewing-key signature binds the decrypted payload to the claimed
    /// `from` (spec §4.10 step "validate").
    pub fn validate(&self, envelope: &[u8]) -> Result<ValidatedRequest, RpcError> {
        let plaintext = ecies::decrypt(self.identity.secret_key(), envelope)?;
        let request: RpcEnvelopePlaintext = cbor::decode(&plaintext)?;

        let viewer_pubkey = PublicKey::from_slice(&request.viewer_pubkey)
            .map_err(|e| RpcError::Crypto(CryptoError::Secp256k1(e)))?;
        if public_key_to_address(&viewer_pubkey) != request.from {
            return Err(RpcError::IdentityMismatch);
        }

        viewing_key::verify_binds_to(request.from, &request.payload, &request.signature)?;

        Ok(ValidatedRequest {
            from: request.from,
            payload: request.payload,
            viewer_pubkey,
        })
    }

    /// Runs `handler` against the validated request, then re-encrypts the
    /// result under the caller's viewing key (spec §4.10 step "execute").
    pub fn execute(
        &self,
        request: &ValidatedRequest,
        handler: &dyn RpcHandler,
    ) -> Result<Vec<u8>, RpcError> {
        let result = handler
            .execute(request.from, &request.payload)
            .map_err(RpcError::Handler)?;
        Ok(ecies::encrypt(&request.viewer_pubkey, &result)?)
    }

    /// Convenience wrapper for callers that just want to send one envelope
    /// in and get one envelope out.
    pub fn handle(&self, envelope: &[u8], handler: &dyn RpcHandler) -> Result<Vec<u8>, RpcError> {
        let validated = self.validate(envelope)?;
        self.execute(&validated, handler)
    }
}

/// Builds an encrypted request the way a client would, for tests and for any
/// in-process caller that needs to round-trip the envelope itself.
pub fn build_envelope(
    enclave_public: &PublicKey,
    viewer: &EnclaveKeyPair,
    payload: Vec<u8>,
) -> Result<Vec<u8>, RpcError> {
    let digest = enclave_crypto::hashing::keccak256(&payload);
    let signature = viewer.sign(digest);
    let request = RpcEnvelopePlaintext {
        from: viewer.enclave_id(),
        viewer_pubkey: viewer.public_key().serialize().to_vec(),
        payload,
        signature,
    };
    let plaintext = cbor::encode(&request)?;
    Ok(ecies::encrypt(enclave_public, &plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl RpcHandler for Echo {
        fn execute(&self, _from: H160, payload: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
            Ok(payload.to_vec())
        }
    }

    struct AlwaysFails;
    impl RpcHandler for AlwaysFails {
        fn execute(&self, _from: H160, _payload: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    #[test]
    fn validates_executes_and_reencrypts() {
        let enclave_identity = EnclaveKeyPair::generate();
        let viewer = EnclaveKeyPair::generate();
        let manager = EncryptionManager::new(enclave_identity.clone());

        let envelope =
            build_envelope(enclave_identity.public_key(), &viewer, b"getBalance".to_vec()).unwrap();
        let response_envelope = manager.handle(&envelope, &Echo).unwrap();

        let decrypted = ecies::decrypt(viewer.secret_key(), &response_envelope).unwrap();
        assert_eq!(decrypted, b"getBalance");
    }

    #[test]
    fn rejects_tampered_from() {
        let enclave_identity = EnclaveKeyPair::generate();
        let viewer = EnclaveKeyPair::generate();
        let impostor = EnclaveKeyPair::generate();
        let manager = EncryptionManager::new(enclave_identity.clone());

        // sign with `viewer` but claim to be `impostor`
        let digest = enclave_crypto::hashing::keccak256(b"payload");
        let signature = viewer.sign(digest);
        let tampered = RpcEnvelopePlaintext {
            from: impostor.enclave_id(),
            viewer_pubkey: viewer.public_key().serialize().to_vec(),
            payload: b"payload".to_vec(),
            signature,
        };
        let plaintext = cbor::encode(&tampered).unwrap();
        let envelope = ecies::encrypt(enclave_identity.public_key(), &plaintext).unwrap();

        assert!(manager.validate(&envelope).is_err());
    }

    #[test]
    fn propagates_handler_failure() {
        let enclave_identity = EnclaveKeyPair::generate();
        let viewer = EnclaveKeyPair::generate();
        let manager = EncryptionManager::new(enclave_identity.clone());

        let envelope =
            build_envelope(enclave_identity.public_key(), &viewer, b"x".to_vec()).unwrap();
        assert_matches::assert_matches!(manager.handle(&envelope, &AlwaysFails), Err(RpcError::Handler(_)));
    }
}
