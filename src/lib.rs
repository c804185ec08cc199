// Custody - a single-asset custodial ledger
//
// Participants deposit value into the ledger and withdraw up to their own
// recorded balance. Withdrawals follow checks-effects-interactions: the
// balance is debited before value leaves custody, and a failed payout
// reverts everything the withdrawal touched.

pub mod config;
pub mod identity;
pub mod ledger;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod units;

pub use ledger::{Amount, Ledger, LedgerError, LedgerEvent};
pub use runtime::{Runtime, RuntimeError};
