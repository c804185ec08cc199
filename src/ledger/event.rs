// Ledger events - the audit trail observers consume

use crate::identity::Address;
use crate::ledger::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification emitted by a committed ledger operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Deposited { participant: Address, amount: Amount },
    Withdrawn { participant: Address, amount: Amount },
}

impl LedgerEvent {
    pub fn participant(&self) -> &Address {
        match self {
            LedgerEvent::Deposited { participant, .. } => participant,
            LedgerEvent::Withdrawn { participant, .. } => participant,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            LedgerEvent::Deposited { amount, .. } => *amount,
            LedgerEvent::Withdrawn { amount, .. } => *amount,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::Deposited { participant, amount } => {
                write!(f, "Deposited({}, {})", participant, amount)
            }
            LedgerEvent::Withdrawn { participant, amount } => {
                write!(f, "Withdrawn({}, {})", participant, amount)
            }
        }
    }
}

/// An event with its position in the log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    seq: u64,
    event: LedgerEvent,
    recorded_at: DateTime<Utc>,
}

impl EventRecord {
    pub(crate) fn new(seq: u64, event: LedgerEvent) -> Self {
        Self {
            seq,
            event,
            recorded_at: Utc::now(),
        }
    }

    /// Monotonic sequence number, starting at 1
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn event(&self) -> &LedgerEvent {
        &self.event
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
