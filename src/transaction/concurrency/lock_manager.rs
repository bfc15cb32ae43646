use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TxnId};
use crate::transaction::concurrency::transaction::{Transaction, TransactionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
    Upgrading,
}

/// One condition variable per request keeps FIFO wake-up semantics simple:
/// `unlock` grants a specific request and signals exactly that waiter.
struct GrantSignal {
    granted: Mutex<bool>,
    cv: Condvar,
}

impl GrantSignal {
    fn new(granted: bool) -> Self {
        Self {
            granted: Mutex::new(granted),
            cv: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut granted = self.granted.lock();
        while !*granted {
            self.cv.wait(&mut granted);
        }
    }

    fn grant(&self) {
        let mut granted = self.granted.lock();
        *granted = true;
        self.cv.notify_one();
    }
}

struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
    signal: Arc<GrantSignal>,
}

#[derive(Default)]
struct QueueInner {
    requests: Vec<LockRequest>,
    has_upgraded: bool,
}

#[derive(Default)]
struct RecordQueue {
    inner: Mutex<QueueInner>,
}

/// Tuple-level lock manager: shared/exclusive record locks with FIFO
/// queues, wait-die deadlock prevention, and a choice of strict or
/// standard two-phase locking.
///
/// Wait-die: a request that cannot be granted compares its transaction id
/// against the tail of the queue; a younger (larger id) requester aborts,
/// an older one waits. Aborting here means the transaction's state becomes
/// `Aborted` and the call returns false; releasing the locks it already
/// holds stays the caller's job.
pub struct LockManager {
    strict_2pl: bool,
    lock_table: Mutex<HashMap<Rid, Arc<RecordQueue>>>,
}

impl LockManager {
    pub fn new(strict_2pl: bool) -> Self {
        Self {
            strict_2pl,
            lock_table: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a shared lock on the record; blocks while incompatible
    /// holders drain, false when the transaction aborts instead
    pub fn lock_shared(&self, txn: &mut Transaction, rid: Rid) -> bool {
        // 1. only a growing transaction may acquire locks
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        // 2. pin the record's queue, releasing the table before any wait
        let mut table = self.lock_table.lock();
        let queue = table.entry(rid).or_default().clone();
        let mut inner = queue.inner.lock();
        drop(table);
        // 3. a shared lock joins an all-shared granted tail immediately
        let can_grant = match inner.requests.last() {
            None => true,
            Some(last) => last.granted && last.mode == LockMode::Shared,
        };
        // 4. wait-die against the queue tail
        if !can_grant {
            let last = inner.requests.last().expect("non-grantable queue has a tail");
            if txn.id() > last.txn_id {
                txn.set_state(TransactionState::Aborted);
                log::debug!("txn {} dies waiting for shared {:?}", txn.id(), rid);
                return false;
            }
        }
        // 5. enqueue, then wait outside the queue lock if needed
        let signal = Arc::new(GrantSignal::new(can_grant));
        inner.requests.push(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Shared,
            granted: can_grant,
            signal: signal.clone(),
        });
        drop(inner);
        if !can_grant {
            signal.wait();
        }
        txn.shared_lock_set_mut().insert(rid);
        true
    }

    /// Acquire an exclusive lock on the record
    pub fn lock_exclusive(&self, txn: &mut Transaction, rid: Rid) -> bool {
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        let mut table = self.lock_table.lock();
        let queue = table.entry(rid).or_default().clone();
        let mut inner = queue.inner.lock();
        drop(table);
        // exclusive is granted immediately only on an empty queue
        let can_grant = inner.requests.is_empty();
        if !can_grant {
            let last = inner.requests.last().expect("non-empty queue has a tail");
            if txn.id() > last.txn_id {
                txn.set_state(TransactionState::Aborted);
                log::debug!("txn {} dies waiting for exclusive {:?}", txn.id(), rid);
                return false;
            }
        }
        let signal = Arc::new(GrantSignal::new(can_grant));
        inner.requests.push(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Exclusive,
            granted: can_grant,
            signal: signal.clone(),
        });
        drop(inner);
        if !can_grant {
            signal.wait();
        }
        txn.exclusive_lock_set_mut().insert(rid);
        true
    }

    /// Upgrade the transaction's granted shared lock to exclusive. At most
    /// one upgrade may be in flight per record.
    pub fn lock_upgrade(&self, txn: &mut Transaction, rid: Rid) -> bool {
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        let mut table = self.lock_table.lock();
        let queue = table.entry(rid).or_default().clone();
        let mut inner = queue.inner.lock();
        drop(table);
        // a second concurrent upgrade on the same record aborts
        if inner.has_upgraded {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        // the transaction must currently hold a granted shared lock here
        let position = inner.requests.iter().position(|request| {
            request.txn_id == txn.id()
                && request.mode == LockMode::Shared
                && request.granted
        });
        let position = match position {
            Some(position) => position,
            None => {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
        };
        inner.requests.remove(position);
        txn.shared_lock_set_mut().remove(&rid);

        let can_grant = inner.requests.is_empty();
        if can_grant {
            let signal = Arc::new(GrantSignal::new(true));
            inner.requests.push(LockRequest {
                txn_id: txn.id(),
                mode: LockMode::Exclusive,
                granted: true,
                signal,
            });
            drop(inner);
        } else {
            let last = inner.requests.last().expect("non-empty queue has a tail");
            if txn.id() > last.txn_id {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
            let signal = Arc::new(GrantSignal::new(false));
            inner.requests.push(LockRequest {
                txn_id: txn.id(),
                mode: LockMode::Upgrading,
                granted: false,
                signal: signal.clone(),
            });
            inner.has_upgraded = true;
            drop(inner);
            signal.wait();
        }
        txn.exclusive_lock_set_mut().insert(rid);
        true
    }

    /// Release the transaction's lock on the record and wake the next
    /// compatible prefix of the queue
    pub fn unlock(&self, txn: &mut Transaction, rid: Rid) -> bool {
        // 1. strict 2PL releases only at commit/abort; standard 2PL flips
        //    the transaction into its shrinking phase
        if self.strict_2pl {
            if txn.state() != TransactionState::Committed
                && txn.state() != TransactionState::Aborted
            {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
        } else if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }
        // 2. locate and remove the transaction's request
        let mut table = self.lock_table.lock();
        let queue = match table.get(&rid) {
            Some(queue) => queue.clone(),
            None => return false,
        };
        let mut inner = queue.inner.lock();
        let position = match inner
            .requests
            .iter()
            .position(|request| request.txn_id == txn.id())
        {
            Some(position) => position,
            None => return false,
        };
        let removed = inner.requests.remove(position);
        match removed.mode {
            LockMode::Shared => {
                txn.shared_lock_set_mut().remove(&rid);
            }
            _ => {
                txn.exclusive_lock_set_mut().remove(&rid);
            }
        }
        // 3. a drained queue leaves the table
        if inner.requests.is_empty() {
            table.remove(&rid);
            return true;
        }
        drop(table);
        // 4. grant the next compatible prefix: a run of shared requests, or
        //    one exclusive/upgrading request
        let mut index = 0;
        while index < inner.requests.len() {
            if inner.requests[index].granted {
                break;
            }
            inner.requests[index].granted = true;
            inner.requests[index].signal.grant();
            log::debug!(
                "granted {:?} on {:?} to txn {}",
                inner.requests[index].mode,
                rid,
                inner.requests[index].txn_id
            );
            match inner.requests[index].mode {
                LockMode::Shared => {
                    index += 1;
                }
                LockMode::Upgrading => {
                    inner.has_upgraded = false;
                    inner.requests[index].mode = LockMode::Exclusive;
                    break;
                }
                LockMode::Exclusive => break,
            }
        }
        true
    }
}
