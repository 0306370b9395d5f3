//! Enclave identity keys, the shared-secret lifecycle, ECIES envelopes,
//! symmetric payload encryption, and canonical batch/rollup hashing.

pub mod attestation;
pub mod data_encryption;
pub mod ecies;
mod error;
pub mod hashing;
pub mod keys;
pub mod vault;
pub mod viewing_key;

pub use attestation::{AttestationProvider, AttestationReport};
pub use error::CryptoError;
pub use keys::{EnclaveId, EnclaveKeyPair};
pub use vault::KeyVault;
