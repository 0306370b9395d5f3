//! Pending-transaction pool feeding `SequencerState::create_batch`
//! (spec §4.6 step 2: "pull transactions from mempool in gas-price order").

use std::sync::Mutex;

use enclave_types::Transaction;

/// Fixed per-transaction overhead added to `data.len()` when estimating a
/// batch's encoded size against `MaxBatchSize` — there is no wire encoder in
/// scope here, so this stands in for one (hash + from + to + nonce + gas
/// fields, all fixed-width).
const TX_OVERHEAD_BYTES: usize = 96;

#[derive(Default)]
pub struct Mempool {
    pending: Mutex<Vec<Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self, tx: Transaction) {
        self.pending.lock().unwrap().push(tx);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Selects transactions in descending gas-price order, skipping (not
    /// stopping at) any that would overflow `max_bytes` or `gas_limit` so
    /// later, cheaper transactions still get a chance to fill the batch —
    /// unlike `BatchExecutor::execute`, which closes a batch at the first
    /// transaction that doesn't fit (spec §4.4). The two rules are
    /// deliberately different: this one bin-packs for mempool throughput,
    /// that one must close deterministically so replay never reorders
    /// inclusion. Selected transactions are removed from the pool.
    pub fn select(&self, max_bytes: usize, gas_limit: u64) -> Vec<Transaction> {
        let mut pending = self.pending.lock().unwrap();
        let mut candidates = std::mem::take(&mut *pending);
        candidates.sort_by(|a, b| b.gas_price.cmp(&a.gas_price));

        let mut selected = Vec::new();
        let mut used_bytes = 0usize;
        let mut used_gas = 0u64;
        let mut remainder = Vec::new();

        for tx in candidates {
            let tx_bytes = tx.data.len() + TX_OVERHEAD_BYTES;
            if used_bytes + tx_bytes > max_bytes || used_gas.saturating_add(tx.gas_limit) > gas_limit
            {
                remainder.push(tx);
                continue;
            }
            used_bytes += tx_bytes;
            used_gas += tx.gas_limit;
            selected.push(tx);
        }

        *pending = remainder;
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::{H160, H256};

    fn tx(gas_price: u64, gas_limit: u64) -> Transaction {
        Transaction {
            hash: H256::zero(),
            from: H160::zero(),
            to: None,
            nonce: 0,
            gas_limit,
            gas_price,
            data: vec![],
        }
    }

    #[test]
    fn selects_highest_gas_price_first() {
        let mempool = Mempool::new();
        mempool.submit(tx(1, 21_000));
        mempool.submit(tx(5, 21_000));
        mempool.submit(tx(3, 21_000));

        let selected = mempool.select(usize::MAX, 21_000);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].gas_price, 5);
    }

    #[test]
    fn leaves_unselected_transactions_in_the_pool() {
        let mempool = Mempool::new();
        mempool.submit(tx(5, 21_000));
        mempool.submit(tx(4, 21_000));

        let selected = mempool.select(usize::MAX, 21_000);
        assert_eq!(selected.len(), 1);
        assert_eq!(mempool.len(), 1);
    }
}
