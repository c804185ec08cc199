// Service module - SHARED ACCESS
// Async handle that serializes ledger operations and persists each commit

mod handle;

pub use handle::{LedgerService, ServiceError};
