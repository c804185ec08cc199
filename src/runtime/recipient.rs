// Recipient hooks - code that runs when a payout lands in an account

use crate::identity::Address;
use crate::ledger::{Amount, Ledger, PayoutError};
use crate::runtime::Runtime;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Context handed to a recipient hook
///
/// The hook may call back into both the ledger and the runtime, for
/// example to withdraw again while the first payout is still in flight.
pub struct Delivery<'a> {
    pub ledger: &'a mut Ledger,
    pub runtime: &'a mut Runtime,
    pub recipient: Address,
    pub amount: Amount,
}

/// Account-attached code invoked on every incoming payout
///
/// Returning an error rejects the funds and fails the whole payout.
pub trait Recipient: Send {
    fn on_receive(&mut self, delivery: Delivery<'_>) -> Result<(), PayoutError>;
}

/// Configurable recipient for tests and demos
pub struct MockRecipient {
    failure_message: Option<String>,
    failures_before_success: usize,
    call_count: Arc<AtomicUsize>,
}

impl MockRecipient {
    /// Create a recipient that accepts everything
    pub fn new() -> Self {
        Self {
            failure_message: None,
            failures_before_success: 0,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reject every payout with a message
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure_message = Some(message.to_string());
        self.failures_before_success = usize::MAX;
        self
    }

    /// Reject the first N payouts, then accept
    pub fn with_failures_then_success(mut self, failures: usize) -> Self {
        self.failures_before_success = failures;
        self
    }

    /// Shared counter of invocations, usable after the hook is boxed
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

impl Default for MockRecipient {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipient for MockRecipient {
    fn on_receive(&mut self, _delivery: Delivery<'_>) -> Result<(), PayoutError> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);

        if call_num < self.failures_before_success {
            return Err(PayoutError::new(
                self.failure_message
                    .clone()
                    .unwrap_or_else(|| "Mock rejection".to_string()),
            ));
        }
        Ok(())
    }
}
