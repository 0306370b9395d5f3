//! Attestation is a black-box collaborator (spec §1): the enclave only needs
//! a report producer/verifier interface, never the attestation cryptography
//! itself. `AttestationProvider` is a tagged variant (spec §9) rather than a
//! trait object so a `Dummy` instance can never silently satisfy a `dyn`
//! bound meant for `Real`.

use primitive_types::H160;
use serde::{Deserialize, Serialize};

use crate::CryptoError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationReport {
    pub enclave_id: H160,
    pub host_id: String,
    pub host_address: String,
    /// Opaque, provider-specific binary payload (spec §6: "follow the
    /// attestation provider's opaque binary format").
    pub payload: Vec<u8>,
}

pub enum AttestationProvider {
    Real(RealAttestationProvider),
    Dummy,
}

impl AttestationProvider {
    /// Refuses to construct a `Dummy` provider when the caller claims
    /// `will_attest`, per spec §9: the dummy variant must never back a
    /// production promise to attest.
    pub fn dummy(will_attest: bool) -> Result<Self, CryptoError> {
        if will_attest {
            return Err(CryptoError::MalformedEnvelope(
                "refusing to start a dummy attestation provider with will_attest=true".to_string(),
            ));
        }
        Ok(AttestationProvider::Dummy)
    }

    pub fn real() -> Self {
        AttestationProvider::Real(RealAttestationProvider)
    }

    pub fn report(
        &self,
        enclave_id: H160,
        host_id: &str,
        host_address: &str,
    ) -> AttestationReport {
        match self {
            AttestationProvider::Real(p) => p.report(enclave_id, host_id, host_address),
            AttestationProvider::Dummy => AttestationReport {
                enclave_id,
                host_id: host_id.to_string(),
                host_address: host_address.to_string(),
                payload: b"dummy-attestation".to_vec(),
            },
        }
    }

    pub fn verify(&self, report: &AttestationReport) -> Result<H160, CryptoError> {
        match self {
            AttestationProvider::Real(p) => p.verify(report),
            AttestationProvider::Dummy => Ok(report.enclave_id),
        }
    }
}

pub struct RealAttestationProvider;

impl RealAttestationProvider {
    fn report(&self, enclave_id: H160, host_id: &str, host_address: &str) -> AttestationReport {
        // Real hardware attestation is an external collaborator; this crate
        // only defines the seam it plugs into.
        AttestationReport {
            enclave_id,
            host_id: host_id.to_string(),
            host_address: host_address.to_string(),
            payload: Vec::new(),
        }
    }

    fn verify(&self, _report: &AttestationReport) -> Result<H160, CryptoError> {
        Err(CryptoError::MalformedEnvelope(
            "real attestation verification is provided by the host's attestation backend"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_refused_when_will_attest() {
        assert!(AttestationProvider::dummy(true).is_err());
        assert!(AttestationProvider::dummy(false).is_ok());
    }

    #[test]
    fn dummy_round_trips_report() {
        let provider = AttestationProvider::dummy(false).unwrap();
        let id = H160::repeat_byte(1);
        let report = provider.report(id, "host-1", "127.0.0.1:9000");
        assert_eq!(provider.verify(&report).unwrap(), id);
    }
}
