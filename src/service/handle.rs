// LedgerService - one ledger, many concurrent callers
//
// Every operation holds the state lock from its checks to its last
// effect, so operations never interleave. When a store is attached the
// new state is written before the lock is released, and a failed write
// undoes the operation.

use crate::identity::Address;
use crate::ledger::{Amount, EventRecord, Ledger, LedgerError, LedgerStats};
use crate::runtime::{Recipient, Runtime, RuntimeError};
use crate::storage::{StateStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// The ledger error underneath, if this failure came from the ledger
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            ServiceError::Ledger(e) => Some(e),
            ServiceError::Runtime(RuntimeError::Ledger(e)) => Some(e),
            _ => None,
        }
    }
}

struct State {
    ledger: Ledger,
    runtime: Runtime,
    store: Option<Box<dyn StateStore>>,
}

impl State {
    /// Run one mutation and persist its result
    ///
    /// If the store rejects the write, the in-memory state is put back as
    /// it was before `op`, so a reported failure never leaves a change
    /// behind.
    fn commit<T, F>(&mut self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Ledger, &mut Runtime) -> Result<T, ServiceError>,
    {
        let Some(store) = &self.store else {
            return op(&mut self.ledger, &mut self.runtime);
        };

        let ledger_before = self.ledger.clone();
        let runtime_before = self.runtime.snapshot();
        let value = op(&mut self.ledger, &mut self.runtime)?;

        if let Err(e) = store.save(&self.ledger, &self.runtime) {
            self.ledger = ledger_before;
            self.runtime.restore(runtime_before);
            warn!(error = %e, "persist failed, in-memory state rolled back");
            return Err(e.into());
        }
        debug!("state persisted");
        Ok(value)
    }
}

/// Cloneable async handle over a ledger and its runtime
#[derive(Clone)]
pub struct LedgerService {
    state: Arc<Mutex<State>>,
}

impl LedgerService {
    /// In-memory service with an empty ledger
    pub fn new() -> Self {
        Self::from_parts(Ledger::new(), Runtime::new(), None)
    }

    /// Service backed by a store, resuming whatever state it holds
    pub fn open<S>(store: S) -> Result<Self, ServiceError>
    where
        S: StateStore + 'static,
    {
        let (ledger, runtime) = store.load()?;
        runtime.audit(&ledger)?;
        Ok(Self::from_parts(ledger, runtime, Some(Box::new(store))))
    }

    fn from_parts(ledger: Ledger, runtime: Runtime, store: Option<Box<dyn StateStore>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                ledger,
                runtime,
                store,
            })),
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Credit external funds to a participant
    pub async fn fund(&self, participant: Address, amount: Amount) -> Result<Amount, ServiceError> {
        let mut state = self.state.lock().await;
        state.commit(|_, runtime| Ok(runtime.fund(participant, amount)?))
    }

    pub async fn deposit(&self, caller: Address, amount: Amount) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        state.commit(|ledger, runtime| Ok(runtime.deposit(ledger, caller, amount)?))
    }

    pub async fn withdraw(&self, caller: Address, amount: Amount) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        state.commit(|ledger, runtime| Ok(runtime.withdraw(ledger, caller, amount)?))
    }

    /// Take all pending ledger events
    pub async fn drain_events(&self) -> Result<Vec<EventRecord>, ServiceError> {
        let mut state = self.state.lock().await;
        state.commit(|ledger, _| Ok(ledger.drain_events()))
    }

    /// Attach a recipient hook; hooks live in memory only
    pub async fn set_recipient(&self, address: Address, recipient: Box<dyn Recipient>) {
        self.state.lock().await.runtime.set_recipient(address, recipient);
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn balance_of(&self, participant: &Address) -> Amount {
        self.state.lock().await.ledger.balance_of(participant)
    }

    pub async fn funds_of(&self, participant: &Address) -> Amount {
        self.state.lock().await.runtime.funds_of(participant)
    }

    pub async fn custodied(&self) -> Amount {
        self.state.lock().await.runtime.custodied()
    }

    pub async fn stats(&self) -> LedgerStats {
        self.state.lock().await.ledger.stats()
    }

    /// Copy of the event log, oldest first
    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.lock().await.ledger.events().to_vec()
    }

    /// Verify recorded balances against custodied funds
    pub async fn audit(&self) -> Result<(), ServiceError> {
        let state = self.state.lock().await;
        state.runtime.audit(&state.ledger)?;
        Ok(())
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}
