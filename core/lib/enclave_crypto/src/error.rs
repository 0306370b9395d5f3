use primitive_types::H160;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),

    #[error("signature recovered address {recovered:?}, expected {expected:?}")]
    SignatureMismatch { expected: H160, recovered: H160 },

    #[error("AEAD failure: {0}")]
    Aead(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("shared secret already initialised")]
    AlreadyInitialized,
}
