use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use enclave_config::EnclaveConfig;
use enclave_crypto::attestation::AttestationProvider;
use enclave_crypto::keys::EnclaveKeyPair;
use enclave_executor::ToyLedgerExecutor;
use enclave_service::EnclaveService;
use enclave_storage::memory::MemoryStorage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Enclave core entrypoint", long_about = None)]
struct Cli {
    /// Hostname reported in attestation reports.
    #[arg(long, env = "ENCLAVE_HOST_ID", default_value = "localhost")]
    host_id: String,

    /// Network address reported in attestation reports.
    #[arg(long, env = "ENCLAVE_HOST_ADDRESS", default_value = "127.0.0.1:0")]
    host_address: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = EnclaveConfig::from_env().context("loading EnclaveConfig from environment")?;

    // Sealed persistent identity storage is a host/hardware concern out of
    // scope for this core (spec §1); every boot mints a fresh identity and
    // relies on the genesis/joiner secret exchange to rejoin the network.
    let identity = EnclaveKeyPair::generate();
    tracing::info!(enclave_id = ?identity.enclave_id(), "generated enclave identity");

    let attestation = if config.will_attest {
        AttestationProvider::real()
    } else {
        AttestationProvider::dummy(false).context("constructing dummy attestation provider")?
    };

    let storage = Arc::new(MemoryStorage::new());

    let service = EnclaveService::new(
        config,
        storage,
        ToyLedgerExecutor,
        identity,
        attestation,
    )
    .await
    .context("constructing EnclaveService")?;

    let report = service.attestation(&cli.host_id, &cli.host_address);
    tracing::info!(host_id = %cli.host_id, payload_len = report.payload.len(), "attestation report ready");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    tracing::info!("shutdown signal received, stopping enclave");
    service.stop();

    Ok(())
}
