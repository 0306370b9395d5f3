use serde::{Deserialize, Serialize};

/// 32 bytes of network-wide entropy shared by every enclave in the network.
/// Write-once-then-read: generated exactly once, at genesis, then replicated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSecret(pub [u8; 32]);

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret(<redacted>)")
    }
}

/// An opaque envelope carrying a `SharedSecret` (or other private payload)
/// encrypted under a specific recipient's public key. Only that recipient's
/// private key can open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEnvelope {
    pub recipient: Vec<u8>,
    pub ciphertext: Vec<u8>,
}
