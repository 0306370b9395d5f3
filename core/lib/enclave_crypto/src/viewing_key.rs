use enclave_types::Signature;
use primitive_types::H160;

use crate::{keys::recover_signer, CryptoError};
use sha3::{Digest, Keccak256};

/// Checks that `signature` over `message` was produced by the viewing key
/// that authenticates `claimed_from` (spec §4.10: "checks the viewing-key
/// signature binds the request to the claimed `from` address").
///
/// The enclave does not maintain a separate viewing-key registry in this
/// core: the recovered signer address IS the viewing identity, matching the
/// "public half is registered with the enclave" model where registration is
/// exactly "I can recover your address from your signature".
pub fn verify_binds_to(
    claimed_from: H160,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let digest = Keccak256::digest(message);
    let hash = primitive_types::H256::from_slice(&digest);
    let recovered = recover_signer(hash, signature)?;
    if recovered == claimed_from {
        Ok(())
    } else {
        Err(CryptoError::SignatureMismatch {
            expected: claimed_from,
            recovered,
        })
    }
}
