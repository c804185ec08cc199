// Ledger module - THE BOOKS
// Per-participant balances, the deposit/withdraw state machine, and the
// payout seam through which value leaves custody

mod book;
mod event;
mod journal;
mod value;

pub use crate::units::Amount;
pub use book::{Ledger, LedgerError, LedgerStats};
pub use event::{EventRecord, LedgerEvent};
pub use value::{Payout, PayoutError, Value};
