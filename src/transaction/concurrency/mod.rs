pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

// Public exports
pub use lock_manager::LockManager;
pub use transaction::{PageLatch, Transaction, TransactionState};
pub use transaction_manager::TransactionManager;
