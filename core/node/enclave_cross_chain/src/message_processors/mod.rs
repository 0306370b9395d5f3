use std::fmt;

use enclave_types::{CrossChainMessage, L1Log};

#[derive(Debug, thiserror::Error)]
pub enum MessageProcessorError {
    #[error("failed decoding a log into {msg_kind}: {source:?}")]
    LogDecode {
        msg_kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("internal processing error: {0:?}")]
    Internal(#[from] anyhow::Error),
}

/// One decoder for one family of message-bus events, in the shape of
/// `via_btc_watch`'s `MessageProcessor` trait: stateless per-log decoding
/// rather than a whole-block scan, so multiple processors can be tried in
/// order against every log the bus address emitted.
pub trait MessageProcessor: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `Ok(None)` when this processor does not recognise the log's
    /// topic — that is not an error, just "try the next processor".
    fn try_decode(&self, log: &L1Log) -> Result<Option<CrossChainMessage>, MessageProcessorError>;
}

mod l1_to_l2;
mod secret_exchange;

pub use l1_to_l2::L1ToL2MessageProcessor;
pub use secret_exchange::{AttestationEvent, SecretExchangeProcessor};
