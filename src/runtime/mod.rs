// Runtime module - THE OUTSIDE WORLD
// Simulated value-transfer environment the ledger runs in: external
// participant funds, the ledger's custody account, and recipient hooks

mod chain;
mod recipient;

pub use chain::{Runtime, RuntimeError};
pub use recipient::{Delivery, MockRecipient, Recipient};
