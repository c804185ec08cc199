// Runtime - moves value between participants and the ledger's custody
//
// Deposits debit the caller's external funds before the ledger credits
// them; payouts debit custody and credit the recipient. Both directions
// undo their own effects when the other side fails.

use crate::identity::Address;
use crate::ledger::{Amount, Ledger, LedgerError, Payout, PayoutError, Value};
use crate::runtime::recipient::{Delivery, Recipient};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Insufficient external funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("External funds would overflow")]
    Overflow,

    #[error("Ledger call failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("State export/import error: {0}")]
    StateError(String),
}

/// External funds and custody captured at one instant; hooks excluded
#[derive(Clone, Debug)]
pub(crate) struct RuntimeSnapshot {
    accounts: BTreeMap<Address, Amount>,
    custody: Amount,
}

/// The simulated value-transfer runtime
#[derive(Default, Serialize, Deserialize)]
pub struct Runtime {
    /// External funds of each participant
    accounts: BTreeMap<Address, Amount>,
    /// Funds physically held by the ledger
    custody: Amount,
    #[serde(skip)]
    recipients: HashMap<Address, Box<dyn Recipient>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("accounts", &self.accounts)
            .field("custody", &self.custody)
            .field("recipients", &self.recipients.len())
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // EXTERNAL FUNDS
    // ========================================================================

    /// Credit external funds to a participant (faucet)
    ///
    /// Returns the new external balance.
    pub fn fund(&mut self, participant: Address, amount: Amount) -> Result<Amount, RuntimeError> {
        let balance = self
            .funds_of(&participant)
            .checked_add(amount)
            .ok_or(RuntimeError::Overflow)?;
        self.accounts.insert(participant, balance);
        debug!(participant = %participant, amount = %amount, "funded");
        Ok(balance)
    }

    /// External funds a participant holds outside the ledger
    pub fn funds_of(&self, participant: &Address) -> Amount {
        self.accounts.get(participant).copied().unwrap_or(0)
    }

    /// Funds held in the ledger's custody, observed independently of it
    pub fn custodied(&self) -> Amount {
        self.custody
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // ========================================================================
    // RECIPIENT HOOKS
    // ========================================================================

    /// Attach code to run whenever a payout lands at `address`
    pub fn set_recipient(&mut self, address: Address, recipient: Box<dyn Recipient>) {
        self.recipients.insert(address, recipient);
    }

    /// Remove the hook for `address`, returning whether one was set
    pub fn clear_recipient(&mut self, address: &Address) -> bool {
        self.recipients.remove(address).is_some()
    }

    pub fn has_recipient(&self, address: &Address) -> bool {
        self.recipients.contains_key(address)
    }

    // ========================================================================
    // LEDGER CALLS
    // ========================================================================

    /// Attach `amount` of the caller's external funds to a ledger deposit
    ///
    /// The caller is only debited if the ledger accepts the deposit.
    pub fn deposit(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        amount: Amount,
    ) -> Result<(), RuntimeError> {
        let available = self.funds_of(&caller);
        if amount > available {
            warn!(participant = %caller, needed = %amount, available = %available, "deposit without funds");
            return Err(RuntimeError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        let previous_custody = self.custody;
        self.custody = previous_custody
            .checked_add(amount)
            .ok_or(RuntimeError::Overflow)?;
        self.accounts.insert(caller, available - amount);

        if let Err(e) = ledger.deposit(caller, Value::new(amount)) {
            self.accounts.insert(caller, available);
            self.custody = previous_custody;
            return Err(e.into());
        }
        Ok(())
    }

    /// Withdraw from the ledger, paying out through this runtime
    pub fn withdraw(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        amount: Amount,
    ) -> Result<(), RuntimeError> {
        ledger.withdraw(caller, amount, self)?;
        Ok(())
    }

    /// Check the ledger's books against the custody actually held
    pub fn audit(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        ledger.verify_conservation(self.custody)
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    pub(crate) fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            accounts: self.accounts.clone(),
            custody: self.custody,
        }
    }

    /// Put funds and custody back; registered hooks are left as they are
    pub(crate) fn restore(&mut self, snapshot: RuntimeSnapshot) {
        self.accounts = snapshot.accounts;
        self.custody = snapshot.custody;
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    /// Serialize accounts and custody; recipient hooks are not persisted
    pub fn to_bytes(&self) -> Result<Vec<u8>, RuntimeError> {
        postcard::to_allocvec(self).map_err(|e| RuntimeError::StateError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RuntimeError> {
        postcard::from_bytes(bytes).map_err(|e| RuntimeError::StateError(e.to_string()))
    }
}

impl Payout for Runtime {
    fn pay(&mut self, ledger: &mut Ledger, to: Address, value: Value) -> Result<(), PayoutError> {
        let amount = value.into_amount();
        let custody = self
            .custody
            .checked_sub(amount)
            .ok_or_else(|| PayoutError::new("custody does not hold the payout amount"))?;
        let credited = self
            .funds_of(&to)
            .checked_add(amount)
            .ok_or_else(|| PayoutError::new("recipient funds would overflow"))?;

        // A hook that is already running is not invoked again.
        let hook = self.recipients.remove(&to);
        let snapshot = hook.as_ref().map(|_| self.snapshot());

        self.custody = custody;
        self.accounts.insert(to, credited);
        debug!(recipient = %to, amount = %amount, hooked = hook.is_some(), "payout delivered");

        let (Some(mut hook), Some(snapshot)) = (hook, snapshot) else {
            return Ok(());
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            hook.on_receive(Delivery {
                ledger: &mut *ledger,
                runtime: &mut *self,
                recipient: to,
                amount,
            })
        }));
        self.recipients.entry(to).or_insert(hook);

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.restore(snapshot);
                warn!(recipient = %to, amount = %amount, reason = %e, "recipient rejected payout");
                return Err(e);
            }
            Err(payload) => {
                self.restore(snapshot);
                warn!(recipient = %to, amount = %amount, "recipient panicked");
                panic::resume_unwind(payload);
            }
        }
        Ok(())
    }
}
