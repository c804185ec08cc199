// Revert journal for in-flight withdrawals
//
// While a payout is running, every balance write is recorded with the value
// it replaced. A failed payout rolls the journal back to its checkpoint,
// undoing nested writes made by re-entrant calls as well.

use crate::identity::Address;
use crate::ledger::Amount;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct Entry {
    participant: Address,
    previous: Option<Amount>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<Entry>,
}

impl Journal {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn record(&mut self, participant: Address, previous: Option<Amount>) {
        self.entries.push(Entry {
            participant,
            previous,
        });
    }

    /// Undo every write recorded after `mark`, newest first
    pub(crate) fn revert(&mut self, mark: usize, balances: &mut BTreeMap<Address, Amount>) {
        while self.entries.len() > mark {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            match entry.previous {
                Some(amount) => {
                    balances.insert(entry.participant, amount);
                }
                None => {
                    balances.remove(&entry.participant);
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
