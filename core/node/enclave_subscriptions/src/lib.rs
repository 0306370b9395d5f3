//! Log-filter subscriptions matched against each executed head batch's
//! receipts (spec §4.9). The map is concurrent-safe; add/remove may race
//! with a concurrent match pass, and a subscription removed mid-emission may
//! still receive one more event — acceptable per spec §5's shared-resource
//! policy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use enclave_types::{Log, Receipt};
use primitive_types::{H160, H256};

pub type SubscriptionId = u64;

/// An empty `addresses`/`topics` set matches any address/topic, mirroring
/// the permissive-when-absent semantics of `eth_getLogs`-style filters.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub addresses: HashSet<H160>,
    pub topics: HashSet<H256>,
    pub from_batch: u64,
}

impl LogFilter {
    fn matches(&self, log: &Log) -> bool {
        let address_ok = self.addresses.is_empty() || self.addresses.contains(&log.address);
        let topic_ok =
            self.topics.is_empty() || log.topics.iter().any(|t| self.topics.contains(t));
        address_ok && topic_ok
    }
}

#[derive(Debug, Clone)]
pub struct MatchedLog {
    pub subscription_id: SubscriptionId,
    pub batch_seq: u64,
    pub log: Log,
}

#[derive(Default)]
pub struct SubscriptionManager {
    next_id: AtomicU64,
    subscriptions: RwLock<std::collections::HashMap<SubscriptionId, LogFilter>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: LogFilter) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.write().unwrap().insert(id, filter);
        id
    }

    /// Idempotent: unsubscribing an id that is already gone is a no-op, not
    /// an error.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.write().unwrap().remove(&id);
    }

    /// For every subscription whose `from_batch` has been reached, filters
    /// `receipts`' logs against its predicate (spec §8: "the logs emitted
    /// are exactly `{l ∈ logs(B.receipts) : matches(S, l)}`").
    pub fn match_batch(&self, batch_seq: u64, receipts: &[Receipt]) -> Vec<MatchedLog> {
        let subscriptions = self.subscriptions.read().unwrap();
        let mut matched = Vec::new();
        for (&id, filter) in subscriptions.iter() {
            if filter.from_batch > batch_seq {
                continue;
            }
            for receipt in receipts {
                for log in &receipt.logs {
                    if filter.matches(log) {
                        matched.push(MatchedLog {
                            subscription_id: id,
                            batch_seq,
                            log: log.clone(),
                        });
                    }
                }
            }
        }
        matched
    }
}
