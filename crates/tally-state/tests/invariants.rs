//! Property tests over random operation sequences applied through the engine.
//!
//! Properties checked after every step, whether the step succeeded or not:
//! 1. Link order is non-decreasing in weight from head to tail.
//! 2. Every allocated slot is reachable exactly once and the tail is the last.
//! 3. No account locks more than its gross balance.
//! 4. Each candidate's weight equals the locked weight of the votes behind it.
//! 5. Balances sum to the issued supply.
//!
//! Low-level commitments carry arbitrary or outdated position hints: they
//! either land in order or fail, and a failed transaction never advances the
//! sender's nonce.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use tally_core::error::TallyError;
use tally_core::protocol::{EpochState, ProtocolParams};
use tally_core::transaction::{Action, Transaction};
use tally_core::types::{AccountId, Balance, NodeIndex};
use tally_state::{CandidateList, Staged, StateDb, StateEngine};

const ACCOUNTS: u8 = 5;

static CASE: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug)]
enum Op {
    Commit { who: u8, price: u128, amount: Balance },
    CommitAt { who: u8, hint: NodeIndex, existing: NodeIndex, price: u128, amount: Balance, is_update: bool },
    /// Plan a commitment against current state, let another account commit
    /// first, then submit the outdated plan.
    StalePlan { who: u8, price: u128, amount: Balance, other: u8, other_price: u128, other_amount: Balance },
    Transfer { who: u8, to: u8, amount: Balance },
    LockAware { who: u8, to: u8, amount: Balance },
    Finalize { advance: i64 },
}

fn hint() -> impl Strategy<Value = NodeIndex> {
    prop_oneof![0..12u64, Just(u64::MAX), any::<u64>()]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACCOUNTS, 1..6u128, 1..3_000u128).prop_map(|(who, price, amount)| Op::Commit { who, price, amount }),
        (0..ACCOUNTS, hint(), hint(), 1..6u128, 1..3_000u128, any::<bool>()).prop_map(
            |(who, hint, existing, price, amount, is_update)| Op::CommitAt { who, hint, existing, price, amount, is_update }
        ),
        (0..ACCOUNTS, 1..6u128, 1..3_000u128, 0..ACCOUNTS, 1..6u128, 1..3_000u128).prop_map(
            |(who, price, amount, other, other_price, other_amount)| Op::StalePlan {
                who, price, amount, other, other_price, other_amount,
            }
        ),
        (0..ACCOUNTS, 0..ACCOUNTS, 1..3_000u128).prop_map(|(who, to, amount)| Op::Transfer { who, to, amount }),
        (0..ACCOUNTS, 0..ACCOUNTS, 1..3_000u128).prop_map(|(who, to, amount)| Op::LockAware { who, to, amount }),
        (0..200_000i64).prop_map(|advance| Op::Finalize { advance }),
    ]
}

fn id(b: u8) -> AccountId {
    AccountId::from_bytes([b + 1; 32])
}

fn fresh_engine() -> StateEngine {
    let n = CASE.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("tally_invariants_{}_{}", std::process::id(), n));
    let _ = std::fs::remove_dir_all(&dir);
    let db = Arc::new(StateDb::open(&dir).expect("open temp db"));
    db.put_params(&ProtocolParams::default()).unwrap();
    db.put_epoch(&EpochState::new(1_000)).unwrap();
    let mut staged = Staged::open(&db).unwrap();
    for b in 0..ACCOUNTS {
        staged.ledger.mint(&id(b), 5_000).unwrap();
    }
    staged.commit().unwrap();
    StateEngine::new(db)
}

fn nonce(engine: &StateEngine, who: u8) -> u64 {
    engine.db.get_account(&id(who)).unwrap().map_or(0, |a| a.nonce)
}

/// Apply one action from `who`; a rejection must leave the nonce untouched.
fn submit(engine: &StateEngine, who: u8, now: i64, action: Action) -> Result<Result<(), TallyError>, TestCaseError> {
    let before = nonce(engine, who);
    let tx = Transaction::new(id(who), before, now, vec![action]);
    let result = engine.apply(&tx, now);
    match &result {
        Ok(()) => prop_assert_eq!(nonce(engine, who), before + 1),
        Err(_) => prop_assert_eq!(nonce(engine, who), before),
    }
    Ok(result)
}

/// A rejected low-level commitment is either stale or a genuine input,
/// threshold or lock failure; it never corrupts anything.
fn check_commit_rejection(result: &Result<(), TallyError>) -> Result<(), TestCaseError> {
    if let Err(e) = result {
        prop_assert!(
            e.is_stale()
                || matches!(
                    e,
                    TallyError::AlreadyCommitted
                        | TallyError::InsufficientPower { .. }
                        | TallyError::BelowThreshold { .. }
                ),
            "unexpected rejection: {:?}",
            e
        );
    }
    Ok(())
}

/// Low-level commitment with hints resolved against current state.
fn plan(engine: &StateEngine, price: u128, amount: Balance) -> Action {
    let list = CandidateList::open(&engine.db).unwrap();
    match list.index_of(price).unwrap() {
        Some(existing) => Action::CommitAt { position_hint: 0, existing_candidate: existing, price, amount, is_update: true },
        None => Action::CommitAt {
            position_hint: list.locate_insert(amount).unwrap(),
            existing_candidate: 0,
            price,
            amount,
            is_update: false,
        },
    }
}

/// Build a lock-aware transfer with hints computed from live state.
fn lock_aware(engine: &StateEngine, who: u8, to: u8, amount: Balance) -> Action {
    let acc = engine.db.get_account(&id(who)).unwrap();
    let (hint, residual) = match acc.as_ref().and_then(|a| a.vote.clone().map(|v| (a.balance, v))) {
        Some((balance, v)) => (v.node_index, v.locked_weight.min(balance.saturating_sub(amount))),
        None => (0, 0),
    };
    Action::LockAwareTransfer { to: id(to), amount, position_hint: hint, residual_weight: residual }
}

fn check_invariants(engine: &StateEngine) -> Result<(), TestCaseError> {
    let list = CandidateList::open(&engine.db).unwrap();
    let ordered = list.ordered().unwrap();

    for pair in ordered.windows(2) {
        prop_assert!(pair[0].weight <= pair[1].weight, "out of order: {:?}", pair);
    }
    prop_assert_eq!(ordered.len() as u64, list.len());
    prop_assert_eq!(ordered.last().unwrap().index, list.header().tail);

    let mut behind: BTreeMap<NodeIndex, Balance> = BTreeMap::new();
    let mut total: Balance = 0;
    for b in 0..ACCOUNTS {
        let Some(acc) = engine.db.get_account(&id(b)).unwrap() else { continue };
        prop_assert!(acc.locked_weight() <= acc.balance);
        total += acc.balance;
        if let Some(v) = acc.vote {
            *behind.entry(v.node_index).or_default() += v.locked_weight;
        }
    }
    for node in ordered.iter().skip(1) {
        prop_assert_eq!(behind.get(&node.index).copied().unwrap_or(0), node.weight);
    }
    prop_assert_eq!(total, engine.db.get_market().unwrap().total_issued);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_sequences_keep_list_and_locks_consistent(ops in prop::collection::vec(op(), 1..40)) {
        let engine = fresh_engine();
        let mut now = 0i64;
        for op in ops {
            match op {
                Op::Commit { who, price, amount } => {
                    submit(&engine, who, now, Action::Commit { price, amount })?;
                }
                Op::CommitAt { who, hint, existing, price, amount, is_update } => {
                    let action = Action::CommitAt {
                        position_hint: hint,
                        existing_candidate: existing,
                        price,
                        amount,
                        is_update,
                    };
                    let result = submit(&engine, who, now, action)?;
                    check_commit_rejection(&result)?;
                }
                Op::StalePlan { who, price, amount, other, other_price, other_amount } => {
                    let planned = plan(&engine, price, amount);
                    check_invariants(&engine)?;
                    submit(&engine, other, now, Action::Commit { price: other_price, amount: other_amount })?;
                    check_invariants(&engine)?;
                    let result = submit(&engine, who, now, planned)?;
                    check_commit_rejection(&result)?;
                }
                Op::Transfer { who, to, amount } => {
                    submit(&engine, who, now, Action::Transfer { to: id(to), amount })?;
                }
                Op::LockAware { who, to, amount } => {
                    let action = lock_aware(&engine, who, to, amount);
                    submit(&engine, who, now, action)?;
                }
                Op::Finalize { advance } => {
                    now += advance;
                    submit(&engine, 0, now, Action::Finalize)?;
                }
            }
            check_invariants(&engine)?;
        }
    }

    #[test]
    fn finalized_price_is_tail_weight(amounts in prop::collection::vec(20..3_000u128, 1..5)) {
        let engine = fresh_engine();
        for (i, amount) in amounts.iter().enumerate() {
            submit(&engine, i as u8, 0, Action::Commit { price: 10 + i as u128, amount: *amount })?;
        }
        submit(&engine, 0, ProtocolParams::default().dwell_secs, Action::Finalize)?;

        let max = amounts.iter().copied().max().unwrap();
        prop_assert_eq!(engine.db.get_epoch().unwrap().current_price, max);
    }

    #[test]
    fn plan_outdated_by_an_intervening_insert_is_stale(
        first in 20..1_000u128,
        middle in 1_001..2_000u128,
        planned_weight in 2_001..3_000u128,
    ) {
        let engine = fresh_engine();
        submit(&engine, 0, 0, Action::Commit { price: 1, amount: first })?.unwrap();

        // Planned while `first` is the tail: insert directly after it.
        let planned = plan(&engine, 3, planned_weight);
        prop_assert!(
            matches!(planned, Action::CommitAt { position_hint: 1, is_update: false, .. }),
            "unexpected plan: {:?}",
            planned
        );

        // A lighter candidate lands between `first` and the planned slot.
        submit(&engine, 1, 0, Action::Commit { price: 2, amount: middle })?.unwrap();

        let before = nonce(&engine, 2);
        let err = submit(&engine, 2, 0, planned)?.unwrap_err();
        prop_assert_eq!(err, TallyError::StaleOrInvalidPosition { index: 1 });
        prop_assert_eq!(nonce(&engine, 2), before);
        check_invariants(&engine)?;

        // Re-planning against fresh state succeeds.
        let replanned = plan(&engine, 3, planned_weight);
        submit(&engine, 2, 0, replanned)?.unwrap();
        check_invariants(&engine)?;
        let tail = CandidateList::open(&engine.db).unwrap().tail().unwrap();
        prop_assert_eq!(tail.weight, planned_weight);
    }
}
