// Value tokens and the payout seam

use crate::identity::Address;
use crate::ledger::{Amount, Ledger};
use thiserror::Error;

/// Funds actually moving into or out of custody
///
/// Not `Clone`: a `Value` can only be minted inside this crate, by the
/// runtime when a caller attaches funds and by the ledger when funds leave
/// custody. `Ledger::deposit` consumes one, so the recorded amount is
/// always the transferred amount.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a Value loses the funds it carries"]
pub struct Value {
    amount: Amount,
}

impl Value {
    pub(crate) fn new(amount: Amount) -> Self {
        Self { amount }
    }

    /// Amount carried by this value
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Consume the value, returning its amount
    pub fn into_amount(self) -> Amount {
        self.amount
    }
}

/// Why a payout did not go through
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct PayoutError {
    reason: String,
}

impl PayoutError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Delivers withdrawn value to its recipient
///
/// `pay` receives the ledger mutably because delivery may hand control to
/// recipient code that calls back into the ledger. When `pay` returns an
/// error the implementor must already have undone its own side effects;
/// the ledger reverts its part.
pub trait Payout {
    fn pay(&mut self, ledger: &mut Ledger, to: Address, value: Value) -> Result<(), PayoutError>;
}
