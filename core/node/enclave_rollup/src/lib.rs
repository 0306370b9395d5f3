//! Bundles committed batches into a signed rollup for L1 publication
//! (`RollupProducer`, spec §4.6 "On CreateRollup") and ingests rollups
//! observed in L1 receipts (`RollupConsumer`, spec §4.3). Range-selection and
//! truncate-to-fit mirror `via_btc_sender::ViaAggregator`'s
//! criterion-then-truncate shape, simplified to a single size criterion.

mod consumer;
mod producer;

pub use consumer::{ConsumeOutcome, RollupConsumer, RollupConsumerError};
pub use producer::{RollupProducer, RollupProducerError};
