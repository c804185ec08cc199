// Deposit / withdraw / balance tests for the ledger

use custody::identity::{Address, Keypair};
use custody::ledger::{Ledger, LedgerError, LedgerEvent};
use custody::runtime::{Runtime, RuntimeError};
use custody::units::ONE;

fn setup() -> (Ledger, Runtime, Address) {
    let mut runtime = Runtime::new();
    let user = Keypair::generate().address();
    runtime.fund(user, 10 * ONE).unwrap();
    (Ledger::new(), runtime, user)
}

fn ledger_error(err: RuntimeError) -> LedgerError {
    match err {
        RuntimeError::Ledger(e) => e,
        other => panic!("expected ledger error, got {:?}", other),
    }
}

// ============================================================================
// LEDGER CREATION TESTS
// ============================================================================

#[test]
fn test_new_ledger_is_empty() {
    let ledger = Ledger::new();

    assert_eq!(ledger.total_balance(), 0);
    assert_eq!(ledger.participant_count(), 0);
    assert_eq!(ledger.event_count(), 0);
}

#[test]
fn test_unknown_participant_reads_zero() {
    let ledger = Ledger::new();
    let stranger = Keypair::generate().address();

    assert_eq!(ledger.balance_of(&stranger), 0);
}

// ============================================================================
// DEPOSIT TESTS
// ============================================================================

#[test]
fn test_deposit_credits_caller() {
    let (mut ledger, mut runtime, user) = setup();

    runtime.deposit(&mut ledger, user, ONE).unwrap();

    assert_eq!(ledger.balance_of(&user), ONE);
}

#[test]
fn test_deposit_changes_no_other_balance() {
    let (mut ledger, mut runtime, user) = setup();
    let other = Keypair::generate().address();
    runtime.fund(other, ONE).unwrap();
    runtime.deposit(&mut ledger, other, ONE / 4).unwrap();

    runtime.deposit(&mut ledger, user, 3 * ONE).unwrap();

    assert_eq!(ledger.balance_of(&other), ONE / 4);
    assert_eq!(ledger.balance_of(&user), 3 * ONE);
    assert_eq!(ledger.total_balance(), 3 * ONE + ONE / 4);
}

#[test]
fn test_deposits_accumulate() {
    let (mut ledger, mut runtime, user) = setup();

    for _ in 0..5 {
        runtime.deposit(&mut ledger, user, ONE).unwrap();
    }

    assert_eq!(ledger.balance_of(&user), 5 * ONE);
    assert_eq!(ledger.stats().deposits, 5);
}

#[test]
fn test_deposit_emits_deposited() {
    let (mut ledger, mut runtime, user) = setup();

    runtime.deposit(&mut ledger, user, ONE).unwrap();

    let events = ledger.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].event(),
        &LedgerEvent::Deposited {
            participant: user,
            amount: ONE
        }
    );
}

#[test]
fn test_deposit_without_external_funds_fails() {
    let (mut ledger, mut runtime, _) = setup();
    let broke = Keypair::generate().address();

    let err = runtime.deposit(&mut ledger, broke, ONE).unwrap_err();

    assert_eq!(
        err,
        RuntimeError::InsufficientFunds {
            needed: ONE,
            available: 0
        }
    );
    assert_eq!(ledger.balance_of(&broke), 0);
    assert_eq!(runtime.custodied(), 0);
}

#[test]
fn test_zero_deposit_is_a_noop() {
    let (mut ledger, mut runtime, user) = setup();

    runtime.deposit(&mut ledger, user, 0).unwrap();

    assert_eq!(ledger.balance_of(&user), 0);
    assert_eq!(runtime.funds_of(&user), 10 * ONE);
    assert_eq!(ledger.event_count(), 1);
}

// ============================================================================
// WITHDRAW TESTS
// ============================================================================

#[test]
fn test_withdraw_more_than_balance_fails() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, ONE / 2).unwrap();

    let err = runtime.withdraw(&mut ledger, user, ONE).unwrap_err();

    assert_eq!(
        ledger_error(err),
        LedgerError::InsufficientBalance {
            requested: ONE,
            available: ONE / 2
        }
    );
    assert_eq!(ledger.balance_of(&user), ONE / 2);
}

#[test]
fn test_withdraw_part_of_balance_emits_withdrawn() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, 2 * ONE).unwrap();

    runtime.withdraw(&mut ledger, user, ONE).unwrap();

    let last = ledger.events().last().unwrap();
    assert_eq!(
        last.event(),
        &LedgerEvent::Withdrawn {
            participant: user,
            amount: ONE
        }
    );
    assert_eq!(ledger.balance_of(&user), ONE);
}

#[test]
fn test_withdraw_pays_caller_exactly() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, 4 * ONE).unwrap();
    let before = runtime.funds_of(&user);

    runtime.withdraw(&mut ledger, user, 3 * ONE).unwrap();

    assert_eq!(runtime.funds_of(&user), before + 3 * ONE);
    assert_eq!(ledger.balance_of(&user), ONE);
}

#[test]
fn test_withdraw_full_balance() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, ONE).unwrap();

    runtime.withdraw(&mut ledger, user, ONE).unwrap();

    assert_eq!(ledger.balance_of(&user), 0);
    assert_eq!(runtime.funds_of(&user), 10 * ONE);
}

#[test]
fn test_cannot_withdraw_someone_elses_balance() {
    let (mut ledger, mut runtime, user) = setup();
    let thief = Keypair::generate().address();
    runtime.deposit(&mut ledger, user, 5 * ONE).unwrap();

    let err = runtime.withdraw(&mut ledger, thief, ONE).unwrap_err();

    assert!(matches!(
        ledger_error(err),
        LedgerError::InsufficientBalance { available: 0, .. }
    ));
    assert_eq!(ledger.balance_of(&user), 5 * ONE);
}

#[test]
fn test_aggregate_withdrawals_bounded_by_balance() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, 3 * ONE).unwrap();

    runtime.withdraw(&mut ledger, user, ONE).unwrap();
    runtime.withdraw(&mut ledger, user, ONE).unwrap();
    runtime.withdraw(&mut ledger, user, ONE).unwrap();
    let err = runtime.withdraw(&mut ledger, user, 1).unwrap_err();

    assert!(matches!(
        ledger_error(err),
        LedgerError::InsufficientBalance { requested: 1, available: 0 }
    ));
    assert_eq!(ledger.stats().withdrawals, 3);
    assert_eq!(ledger.stats().failed_withdrawals, 1);
}

#[test]
fn test_zero_withdraw_is_a_noop() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, ONE).unwrap();

    runtime.withdraw(&mut ledger, user, 0).unwrap();

    assert_eq!(ledger.balance_of(&user), ONE);
    assert_eq!(runtime.custodied(), ONE);
    assert_eq!(ledger.event_count(), 2);
}

// ============================================================================
// CUSTODY TESTS
// ============================================================================

#[test]
fn test_custody_follows_deposit_and_withdraw() {
    let (mut ledger, mut runtime, user) = setup();
    assert_eq!(runtime.custodied(), 0);

    runtime.deposit(&mut ledger, user, ONE).unwrap();
    assert_eq!(runtime.custodied(), ONE);

    runtime.withdraw(&mut ledger, user, ONE).unwrap();
    assert_eq!(runtime.custodied(), 0);
}

#[test]
fn test_audit_passes_after_operations() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, 2 * ONE).unwrap();
    runtime.withdraw(&mut ledger, user, ONE / 3).unwrap();

    assert!(runtime.audit(&ledger).is_ok());
}

#[test]
fn test_audit_detects_mismatch() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, ONE).unwrap();

    let err = ledger.verify_conservation(2 * ONE).unwrap_err();

    assert_eq!(
        err,
        LedgerError::Inconsistent {
            recorded: ONE,
            custodied: 2 * ONE
        }
    );
}

// ============================================================================
// EVENT LOG TESTS
// ============================================================================

#[test]
fn test_event_sequence_numbers_survive_drain() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, ONE).unwrap();
    runtime.deposit(&mut ledger, user, ONE).unwrap();

    let drained = ledger.drain_events();
    runtime.withdraw(&mut ledger, user, ONE).unwrap();

    assert_eq!(drained.iter().map(|r| r.seq()).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(ledger.events()[0].seq(), 3);
}

#[test]
fn test_failed_withdraw_emits_nothing() {
    let (mut ledger, mut runtime, user) = setup();
    runtime.deposit(&mut ledger, user, ONE).unwrap();

    let _ = runtime.withdraw(&mut ledger, user, 2 * ONE);

    assert_eq!(ledger.event_count(), 1);
}
