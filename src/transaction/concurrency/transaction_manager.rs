use std::sync::atomic::{AtomicU32, Ordering};

use crate::transaction::concurrency::transaction::{Transaction, TransactionState};

/// Hands out transactions with monotonically increasing ids; earlier
/// transactions are older and win wait-die conflicts.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
        }
    }

    /// Begin a new transaction
    pub fn begin(&self) -> Transaction {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        Transaction::new(txn_id)
    }

    /// Commit: the caller is responsible for releasing held locks
    /// afterwards (under strict 2PL, unlock is only legal from here on)
    pub fn commit(&self, txn: &mut Transaction) {
        txn.set_state(TransactionState::Committed);
    }

    /// Abort: the caller is responsible for releasing held locks
    pub fn abort(&self, txn: &mut Transaction) {
        txn.set_state(TransactionState::Aborted);
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let manager = TransactionManager::new();
        let t1 = manager.begin();
        let t2 = manager.begin();
        assert!(t1.id() < t2.id());
        assert_eq!(t1.state(), TransactionState::Growing);
    }

    #[test]
    fn test_commit_and_abort_transition() {
        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        manager.commit(&mut txn);
        assert_eq!(txn.state(), TransactionState::Committed);

        let mut txn = manager.begin();
        manager.abort(&mut txn);
        assert_eq!(txn.state(), TransactionState::Aborted);
    }
}
