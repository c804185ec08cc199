// Ledger - per-participant balances backed by custodied funds

use crate::identity::Address;
use crate::ledger::event::{EventRecord, LedgerEvent};
use crate::ledger::journal::Journal;
use crate::ledger::value::{Payout, Value};
use crate::ledger::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced to ledger callers
///
/// Every failing operation leaves balances exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Transfer to {recipient} failed: {reason}")]
    TransferFailed { recipient: Address, reason: String },

    #[error("Ledger out of balance: recorded {recorded}, custodied {custodied}")]
    Inconsistent { recorded: Amount, custodied: Amount },

    #[error("State export/import error: {0}")]
    StateError(String),
}

/// Counters over committed and rejected operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub participants: usize,
    pub total_balance: Amount,
    pub deposits: u64,
    pub withdrawals: u64,
    pub failed_withdrawals: u64,
}

/// State captured before an external payout
struct Checkpoint {
    journal_len: usize,
    total: Amount,
    events_len: usize,
    next_seq: u64,
    stats: LedgerStats,
}

/// The custodial ledger
///
/// Balances are created on first write and never removed, so a zero
/// balance reads the same as a participant that never deposited.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Participant -> recorded balance
    balances: BTreeMap<Address, Amount>,
    /// Sum of all balances
    total: Amount,
    /// Emitted events, oldest first
    events: Vec<EventRecord>,
    next_seq: u64,
    stats: LedgerStats,
    #[serde(skip)]
    journal: Journal,
    /// Number of payouts currently in flight
    #[serde(skip)]
    depth: u32,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Recorded balance of a participant, zero if never seen
    pub fn balance_of(&self, participant: &Address) -> Amount {
        self.balances.get(participant).copied().unwrap_or(0)
    }

    /// Sum of all recorded balances
    pub fn total_balance(&self) -> Amount {
        self.total
    }

    /// Number of participants with a balance entry
    pub fn participant_count(&self) -> usize {
        self.balances.len()
    }

    /// Participants and their balances, ordered by address
    pub fn participants(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.balances.iter().map(|(p, b)| (p, *b))
    }

    /// Whether a withdrawal payout is currently in flight
    pub fn is_paying_out(&self) -> bool {
        self.depth > 0
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            participants: self.balances.len(),
            total_balance: self.total,
            ..self.stats
        }
    }

    // ========================================================================
    // DEPOSIT
    // ========================================================================

    /// Credit the caller with the value they attached
    ///
    /// The amount is taken from `value` itself, never from a separate
    /// argument. Fails with `ArithmeticOverflow` before touching any state.
    pub fn deposit(&mut self, caller: Address, value: Value) -> Result<(), LedgerError> {
        let amount = value.into_amount();
        let current = self.balance_of(&caller);

        let (new_balance, new_total) = match (
            current.checked_add(amount),
            self.total.checked_add(amount),
        ) {
            (Some(balance), Some(total)) => (balance, total),
            _ => {
                warn!(participant = %caller, amount = %amount, "deposit rejected: overflow");
                return Err(LedgerError::ArithmeticOverflow);
            }
        };

        if amount > 0 {
            self.write_balance(caller, new_balance);
            self.total = new_total;
        }
        self.stats.deposits += 1;
        self.emit(LedgerEvent::Deposited {
            participant: caller,
            amount,
        });

        info!(participant = %caller, amount = %amount, balance = %new_balance, "deposit committed");
        Ok(())
    }

    // ========================================================================
    // WITHDRAW
    // ========================================================================

    /// Debit the caller and pay the amount out through `payout`
    ///
    /// Ordering: the balance check happens first, the debit second, and the
    /// payout last. Code the payout runs on the recipient's behalf therefore
    /// sees the already-reduced balance. If the payout fails, every ledger
    /// change made since the debit, nested ones included, is reverted. A
    /// panicking payout is reverted the same way before the panic resumes.
    pub fn withdraw<P>(
        &mut self,
        caller: Address,
        amount: Amount,
        payout: &mut P,
    ) -> Result<(), LedgerError>
    where
        P: Payout + ?Sized,
    {
        // Checks
        let available = self.balance_of(&caller);
        if amount > available {
            self.stats.failed_withdrawals += 1;
            warn!(
                participant = %caller,
                requested = %amount,
                available = %available,
                "withdrawal rejected: insufficient balance"
            );
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        if amount == 0 {
            self.stats.withdrawals += 1;
            self.emit(LedgerEvent::Withdrawn {
                participant: caller,
                amount,
            });
            debug!(participant = %caller, "zero withdrawal");
            return Ok(());
        }

        let new_total = self
            .total
            .checked_sub(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        // Effects
        let checkpoint = self.checkpoint();
        self.depth += 1;
        self.write_balance(caller, available - amount);
        self.total = new_total;
        debug!(participant = %caller, amount = %amount, depth = self.depth, "balance debited, paying out");

        // Interactions
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            payout.pay(self, caller, Value::new(amount))
        }));
        self.depth -= 1;

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                self.revert(checkpoint);
                if self.depth == 0 {
                    self.journal.clear();
                }
                warn!(participant = %caller, amount = %amount, "withdrawal reverted: payout panicked");
                panic::resume_unwind(payload);
            }
        };

        let outcome = match result {
            Ok(()) => {
                self.stats.withdrawals += 1;
                self.emit(LedgerEvent::Withdrawn {
                    participant: caller,
                    amount,
                });
                info!(participant = %caller, amount = %amount, "withdrawal committed");
                Ok(())
            }
            Err(e) => {
                self.revert(checkpoint);
                self.stats.failed_withdrawals += 1;
                warn!(participant = %caller, amount = %amount, reason = %e, "withdrawal reverted: transfer failed");
                Err(LedgerError::TransferFailed {
                    recipient: caller,
                    reason: e.reason().to_string(),
                })
            }
        };

        if self.depth == 0 {
            self.journal.clear();
        }
        outcome
    }

    // ========================================================================
    // AUDIT
    // ========================================================================

    /// Check that recorded balances add up to the funds actually held
    pub fn verify_conservation(&self, custodied: Amount) -> Result<(), LedgerError> {
        let recorded = self
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            .ok_or(LedgerError::ArithmeticOverflow)?;

        if recorded != self.total || recorded != custodied {
            return Err(LedgerError::Inconsistent {
                recorded,
                custodied,
            });
        }
        Ok(())
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    /// All events emitted so far, oldest first
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Take all pending events, leaving the log empty
    ///
    /// Sequence numbers keep counting across drains. While a payout is in
    /// flight nothing is drained: those events may still be reverted, and
    /// a reverted event must never reach an observer.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        if self.is_paying_out() {
            debug!(pending = self.events.len(), "drain deferred until payout settles");
            return Vec::new();
        }
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    /// Serialize the ledger to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        postcard::to_allocvec(self).map_err(|e| LedgerError::StateError(e.to_string()))
    }

    /// Deserialize a ledger from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let ledger: Ledger =
            postcard::from_bytes(bytes).map_err(|e| LedgerError::StateError(e.to_string()))?;
        ledger.verify_conservation(ledger.total)?;
        Ok(ledger)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn write_balance(&mut self, participant: Address, amount: Amount) {
        let previous = self.balances.insert(participant, amount);
        if self.depth > 0 {
            self.journal.record(participant, previous);
        }
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.next_seq += 1;
        debug!(seq = self.next_seq, %event, "event emitted");
        self.events.push(EventRecord::new(self.next_seq, event));
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal_len: self.journal.len(),
            total: self.total,
            events_len: self.events.len(),
            next_seq: self.next_seq,
            stats: self.stats,
        }
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        self.journal
            .revert(checkpoint.journal_len, &mut self.balances);
        self.total = checkpoint.total;
        self.events.truncate(checkpoint.events_len);
        self.next_seq = checkpoint.next_seq;
        self.stats = checkpoint.stats;
    }
}
