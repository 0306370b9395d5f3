//! The deterministic state-transition core (spec §4.4): a pure function over
//! (parent snapshot, header fields fixed by the caller, ordered transaction
//! list) yielding a new state root, receipts, and used gas. All
//! wall-clock/randomness inputs must come from the caller-supplied header,
//! never from the system, or sequencer and validator would diverge.

pub mod state_cache;

use enclave_crypto::hashing::keccak256;
use enclave_storage::StateSnapshot;
use enclave_types::{Bloom, Log, Receipt, Transaction};
use primitive_types::H256;

/// Outcome of applying a single transaction. The real EVM implementation is
/// an opaque collaborator (spec §1); this trait is the seam it plugs into.
pub struct TxOutcome {
    pub status: u8,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

pub trait TransactionExecutor: Send + Sync {
    fn apply(&self, state: &mut StateSnapshot, tx: &Transaction) -> TxOutcome;
}

/// Fields of the batch header the executor needs but never invents itself —
/// they come from the sequencer (or, on replay, from the stored header being
/// re-verified).
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    pub timestamp: u64,
}

pub struct ExecutionOutput {
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub receipts: Vec<Receipt>,
    pub gas_used: u64,
    pub state: StateSnapshot,
}

pub struct BatchExecutor<T: TransactionExecutor> {
    transaction_executor: T,
}

impl<T: TransactionExecutor> BatchExecutor<T> {
    pub fn new(transaction_executor: T) -> Self {
        Self {
            transaction_executor,
        }
    }

    /// Executes `txs` against `parent_state`, honouring `gas_limit`.
    /// Transactions that would exceed the remaining gas are dropped, not
    /// aborted — the batch simply closes at the last transaction that still
    /// fit (spec §4.4; gas accounting for the dropped tail is explicitly left
    /// unspecified by the source, see spec §9).
    pub fn execute(
        &self,
        parent_state: &StateSnapshot,
        _ctx: ExecutionContext,
        txs: &[Transaction],
        gas_limit: u64,
    ) -> ExecutionOutput {
        let mut state = parent_state.clone();
        let mut receipts = Vec::new();
        let mut gas_used = 0u64;
        let mut included: Vec<&Transaction> = Vec::new();

        for tx in txs {
            if gas_used.saturating_add(tx.gas_limit) > gas_limit {
                break;
            }
            let outcome = self.transaction_executor.apply(&mut state, tx);
            gas_used += outcome.gas_used;

            let mut logs_bloom = Bloom::default();
            for log in &outcome.logs {
                for topic in &log.topics {
                    logs_bloom.accrue(topic);
                }
            }

            receipts.push(Receipt {
                tx_hash: tx.hash,
                status: outcome.status,
                gas_used: outcome.gas_used,
                logs: outcome.logs,
                logs_bloom,
            });
            included.push(tx);
        }

        let state_root = state_root_hash(&state);
        let transactions_root = transactions_root_hash(&included);
        let receipts_root = receipts_root_hash(&receipts);

        ExecutionOutput {
            state_root,
            transactions_root,
            receipts_root,
            receipts,
            gas_used,
            state,
        }
    }
}

pub fn state_root_hash(state: &StateSnapshot) -> H256 {
    let mut buf = Vec::new();
    // `StateSnapshot` is a `BTreeMap`, so iteration order is already
    // deterministic by key.
    for (k, v) in state {
        buf.extend_from_slice(&(k.len() as u32).to_be_bytes());
        buf.extend_from_slice(k);
        buf.extend_from_slice(&(v.len() as u32).to_be_bytes());
        buf.extend_from_slice(v);
    }
    keccak256(&buf)
}

pub fn transactions_root_hash(txs: &[&Transaction]) -> H256 {
    let mut buf = Vec::with_capacity(txs.len() * 32);
    for tx in txs {
        buf.extend_from_slice(tx.hash.as_bytes());
    }
    keccak256(&buf)
}

pub fn receipts_root_hash(receipts: &[Receipt]) -> H256 {
    let mut buf = Vec::with_capacity(receipts.len() * 41);
    for r in receipts {
        buf.extend_from_slice(r.tx_hash.as_bytes());
        buf.push(r.status);
        buf.extend_from_slice(&r.gas_used.to_be_bytes());
    }
    keccak256(&buf)
}

/// A minimal, deterministic stand-in for the EVM used by tests and as the
/// reference `TransactionExecutor`: `tx.data` is an 8-byte big-endian amount
/// moved from `tx.from` to `tx.to` (or burned if `to` is `None`).
#[derive(Debug, Default, Clone)]
pub struct ToyLedgerExecutor;

impl TransactionExecutor for ToyLedgerExecutor {
    fn apply(&self, state: &mut StateSnapshot, tx: &Transaction) -> TxOutcome {
        let amount = if tx.data.len() >= 8 {
            u64::from_be_bytes(tx.data[..8].try_into().unwrap())
        } else {
            0
        };

        let from_key = tx.from.as_bytes().to_vec();
        let from_balance = balance_of(state, &from_key);
        if from_balance < amount {
            return TxOutcome {
                status: 0,
                gas_used: tx.gas_limit.min(21_000),
                logs: vec![],
            };
        }

        set_balance(state, &from_key, from_balance - amount);
        if let Some(to) = tx.to {
            let to_key = to.as_bytes().to_vec();
            let to_balance = balance_of(state, &to_key);
            set_balance(state, &to_key, to_balance + amount);
        }

        TxOutcome {
            status: 1,
            gas_used: 21_000,
            logs: vec![],
        }
    }
}

fn balance_of(state: &StateSnapshot, key: &[u8]) -> u64 {
    state
        .get(key)
        .map(|v| u64::from_be_bytes(v.as_slice().try_into().unwrap_or([0; 8])))
        .unwrap_or(0)
}

fn set_balance(state: &mut StateSnapshot, key: &[u8], balance: u64) {
    state.insert(key.to_vec(), balance.to_be_bytes().to_vec());
}
