use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::config::{GroupPass, MatchConfig};
use crate::error::ReconError;
use crate::groups::build_groups;
use crate::matcher::match_one_to_one;
use crate::model::{
    Group, GroupDirection, MatchPair, Origin, Phase, PhaseTiming, ReconciliationResult, RowId,
    SearchStats, Transaction,
};
use crate::report::PhaseEvent;
use crate::summary::PartitionBreakdown;

/// Run the full pipeline: one-to-one, approved groups, suggested groups,
/// closure.
pub fn run(
    ledger: &[Transaction],
    bank: &[Transaction],
    config: &MatchConfig,
) -> Result<ReconciliationResult, ReconError> {
    run_with_observer(ledger, bank, config, |_| {})
}

/// Same as [`run`], handing a [`PhaseEvent`] to `observer` after each step.
pub fn run_with_observer<F>(
    ledger: &[Transaction],
    bank: &[Transaction],
    config: &MatchConfig,
    mut observer: F,
) -> Result<ReconciliationResult, ReconError>
where
    F: FnMut(&PhaseEvent),
{
    config.validate()?;
    check_table(ledger, Origin::Ledger)?;
    check_table(bank, Origin::Bank)?;

    // Zero rows are balance markers, not movements.
    let ledger: Vec<Transaction> = ledger.iter().filter(|r| r.amount_cents != 0).cloned().collect();
    let bank: Vec<Transaction> = bank.iter().filter(|r| r.amount_cents != 0).cloned().collect();

    let run_start = Instant::now();
    observer(&PhaseEvent::RunStart {
        ledger_rows: ledger.len(),
        bank_rows: bank.len(),
        days_window: config.days_window,
    });
    let mut timings = Vec::with_capacity(4);

    // Phase 1: one-to-one
    let started = Instant::now();
    let one_to_one = match_one_to_one(&ledger, &bank, config.days_window);
    let elapsed = started.elapsed();
    timings.push(PhaseTiming {
        phase: Phase::OneToOne,
        duration: elapsed,
    });
    tracing::debug!(
        pairs = one_to_one.pairs.len(),
        leftover_ledger = one_to_one.leftover_ledger.len(),
        leftover_bank = one_to_one.leftover_bank.len(),
        elapsed_ms = millis(elapsed),
        "phase one_to_one"
    );
    observer(&PhaseEvent::pairs_done(&one_to_one.pairs, millis(elapsed)));

    // Phase 2: approved groups
    let started = Instant::now();
    let approved_phase = group_phase(
        one_to_one.leftover_ledger,
        one_to_one.leftover_bank,
        &config.approved_pass(),
        config.bidirectional_groups,
    );
    let elapsed = started.elapsed();
    timings.push(PhaseTiming {
        phase: Phase::GroupsApproved,
        duration: elapsed,
    });
    tracing::debug!(
        groups = approved_phase.groups.len(),
        nodes = approved_phase.stats.nodes_visited,
        cap_hits = approved_phase.stats.cap_hits,
        elapsed_ms = millis(elapsed),
        "phase groups_approved"
    );
    observer(&PhaseEvent::groups_done(
        Phase::GroupsApproved,
        &approved_phase.groups,
        millis(elapsed),
    ));

    // Phase 3: suggested groups
    let started = Instant::now();
    let mut suggested_phase = group_phase(
        approved_phase.ledger,
        approved_phase.bank,
        &config.suggested_pass(),
        config.bidirectional_groups,
    );
    let before = suggested_phase.groups.len();
    suggested_phase
        .groups
        .retain(|g| g.diff_cents.unsigned_abs() > config.strict_tolerance_cents.unsigned_abs());
    let elapsed = started.elapsed();
    timings.push(PhaseTiming {
        phase: Phase::GroupsSuggested,
        duration: elapsed,
    });
    tracing::debug!(
        groups = suggested_phase.groups.len(),
        dropped_within_strict = before - suggested_phase.groups.len(),
        nodes = suggested_phase.stats.nodes_visited,
        cap_hits = suggested_phase.stats.cap_hits,
        elapsed_ms = millis(elapsed),
        "phase groups_suggested"
    );
    observer(&PhaseEvent::groups_done(
        Phase::GroupsSuggested,
        &suggested_phase.groups,
        millis(elapsed),
    ));

    // Phase 4: closure, from accepted outputs only
    let started = Instant::now();
    let pairs = one_to_one.pairs;
    let approved = approved_phase.groups;
    let suggested = suggested_phase.groups;
    let claimed = claimed_ids(&pairs, approved.iter().chain(suggested.iter()))?;
    let leftover_ledger: Vec<Transaction> = ledger
        .iter()
        .filter(|r| !claimed.contains(&(Origin::Ledger, r.row_id)))
        .cloned()
        .collect();
    let leftover_bank: Vec<Transaction> = bank
        .iter()
        .filter(|r| !claimed.contains(&(Origin::Bank, r.row_id)))
        .cloned()
        .collect();
    let elapsed = started.elapsed();
    timings.push(PhaseTiming {
        phase: Phase::Closure,
        duration: elapsed,
    });
    observer(&PhaseEvent::closure_done(
        &leftover_bank,
        &leftover_ledger,
        millis(elapsed),
    ));

    let result = ReconciliationResult {
        pairs,
        approved,
        suggested,
        leftover_bank,
        leftover_ledger,
        timings,
        approved_stats: approved_phase.stats,
        suggested_stats: suggested_phase.stats,
    };
    verify_closure(&ledger, &bank, &result)?;

    let total = run_start.elapsed();
    tracing::info!(
        pairs = result.pairs.len(),
        approved = result.approved.len(),
        suggested = result.suggested.len(),
        leftover_bank = result.leftover_bank.len(),
        leftover_ledger = result.leftover_ledger.len(),
        elapsed_ms = millis(total),
        "reconciliation done"
    );
    observer(&PhaseEvent::ResultsReady {
        breakdown: PartitionBreakdown::from_result(&result),
        elapsed_ms: millis(total),
    });

    Ok(result)
}

/// Check that every non-zero input row lands in exactly one partition.
pub fn verify_closure(
    ledger: &[Transaction],
    bank: &[Transaction],
    result: &ReconciliationResult,
) -> Result<(), ReconError> {
    let mut seen: HashMap<(Origin, RowId), usize> = HashMap::new();
    let mut bump = |origin: Origin, tx: &Transaction| {
        *seen.entry((origin, tx.row_id)).or_insert(0) += 1;
    };
    for p in &result.pairs {
        bump(Origin::Ledger, &p.ledger);
        bump(Origin::Bank, &p.bank);
    }
    for g in result.groups() {
        bump(g.direction.target_origin(), &g.target);
        for c in &g.components {
            bump(g.direction.component_origin(), c);
        }
    }
    for r in &result.leftover_ledger {
        bump(Origin::Ledger, r);
    }
    for r in &result.leftover_bank {
        bump(Origin::Bank, r);
    }

    for (origin, rows) in [(Origin::Ledger, ledger), (Origin::Bank, bank)] {
        for r in rows.iter().filter(|r| r.amount_cents != 0) {
            match seen.remove(&(origin, r.row_id)) {
                Some(1) => {}
                Some(n) => {
                    return Err(ReconError::ClosureViolation(format!(
                        "{origin} row {} appears {n} times",
                        r.row_id
                    )))
                }
                None => {
                    return Err(ReconError::ClosureViolation(format!(
                        "{origin} row {} is missing from the result",
                        r.row_id
                    )))
                }
            }
        }
    }
    if let Some(((origin, row_id), _)) = seen.into_iter().next() {
        return Err(ReconError::ClosureViolation(format!(
            "{origin} row {row_id} is not an input row"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_table(rows: &[Transaction], origin: Origin) -> Result<(), ReconError> {
    let mut ids = BTreeSet::new();
    for r in rows {
        if r.origin != origin {
            return Err(ReconError::OriginMismatch {
                row_id: r.row_id,
                expected: origin,
                found: r.origin,
            });
        }
        if !ids.insert(r.row_id) {
            return Err(ReconError::DuplicateRowId {
                origin,
                row_id: r.row_id,
            });
        }
    }
    Ok(())
}

struct GroupPhase {
    groups: Vec<Group>,
    ledger: Vec<Transaction>,
    bank: Vec<Transaction>,
    stats: SearchStats,
}

/// One group pass: ledger-to-bank, then bank-to-ledger over what is left when
/// `bidirectional` is set.
fn group_phase(
    ledger: Vec<Transaction>,
    bank: Vec<Transaction>,
    pass: &GroupPass,
    bidirectional: bool,
) -> GroupPhase {
    let forward = build_groups(&ledger, &bank, pass, GroupDirection::LedgerToBank);
    let mut groups = forward.groups;
    let mut stats = forward.stats;
    let mut ledger = remaining(ledger, &forward.consumed_ledger);
    let mut bank = remaining(bank, &forward.consumed_bank);

    if bidirectional {
        let reverse = build_groups(&ledger, &bank, pass, GroupDirection::BankToLedger);
        ledger = remaining(ledger, &reverse.consumed_ledger);
        bank = remaining(bank, &reverse.consumed_bank);
        groups.extend(reverse.groups);
        stats.absorb(reverse.stats);
    }

    GroupPhase {
        groups,
        ledger,
        bank,
        stats,
    }
}

fn remaining(rows: Vec<Transaction>, consumed: &BTreeSet<RowId>) -> Vec<Transaction> {
    rows.into_iter().filter(|r| !consumed.contains(&r.row_id)).collect()
}

fn claimed_ids<'a>(
    pairs: &[MatchPair],
    groups: impl Iterator<Item = &'a Group>,
) -> Result<BTreeSet<(Origin, RowId)>, ReconError> {
    let mut claimed = BTreeSet::new();
    let mut claim = |origin: Origin, row_id: RowId| {
        if claimed.insert((origin, row_id)) {
            Ok(())
        } else {
            Err(ReconError::ClosureViolation(format!(
                "{origin} row {row_id} claimed twice"
            )))
        }
    };
    for p in pairs {
        claim(Origin::Ledger, p.ledger.row_id)?;
        claim(Origin::Bank, p.bank.row_id)?;
    }
    for g in groups {
        claim(g.direction.target_origin(), g.target.row_id)?;
        for c in &g.components {
            claim(g.direction.component_origin(), c.row_id)?;
        }
    }
    Ok(claimed)
}

fn millis(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupStatus;
    use chrono::NaiveDate;

    fn tx(origin: Origin, id: u64, cents: i64, day: u32) -> Transaction {
        Transaction::new(
            RowId(id),
            origin,
            NaiveDate::from_ymd_opt(2025, 9, day),
            cents,
            format!("{origin}-{id}"),
        )
    }

    #[test]
    fn phases_run_in_order() {
        let ledger = vec![
            tx(Origin::Ledger, 1, 10_000, 1),
            tx(Origin::Ledger, 2, 30_000, 2),
            tx(Origin::Ledger, 3, 20_050, 2),
            tx(Origin::Ledger, 4, 77_300, 3),
            tx(Origin::Ledger, 5, 999, 3),
        ];
        let bank = vec![
            tx(Origin::Bank, 1, 10_000, 2),
            tx(Origin::Bank, 2, 50_000, 3),
            tx(Origin::Bank, 3, 77_000, 3),
            tx(Origin::Bank, 4, -4_000, 3),
        ];
        let result = run(&ledger, &bank, &MatchConfig::default()).unwrap();

        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.approved.len(), 1);
        assert_eq!(result.approved[0].target.row_id, RowId(2));
        assert_eq!(result.suggested.len(), 1);
        assert_eq!(result.suggested[0].target.row_id, RowId(3));
        assert_eq!(result.suggested[0].diff_cents, 300);
        assert_eq!(result.suggested[0].status, GroupStatus::Suggested);
        assert_eq!(result.leftover_ledger.len(), 1);
        assert_eq!(result.leftover_ledger[0].row_id, RowId(5));
        assert_eq!(result.leftover_bank.len(), 1);
        assert_eq!(result.leftover_bank[0].row_id, RowId(4));
        assert_eq!(result.timings.len(), 4);
        assert!(result.timing(Phase::Closure).is_some());
    }

    #[test]
    fn suggested_within_strict_tolerance_goes_back_to_leftovers() {
        // A single near-exact component: approved needs two, suggested finds
        // one, but diff 50 is within strict tolerance so it is dropped.
        let ledger = vec![tx(Origin::Ledger, 1, 100_050, 1)];
        let bank = vec![tx(Origin::Bank, 1, 100_000, 1)];
        let result = run(&ledger, &bank, &MatchConfig::default()).unwrap();
        assert!(result.approved.is_empty());
        assert!(result.suggested.is_empty());
        assert_eq!(result.leftover_ledger.len(), 1);
        assert_eq!(result.leftover_bank.len(), 1);
    }

    #[test]
    fn zero_rows_never_appear() {
        let ledger = vec![tx(Origin::Ledger, 1, 0, 1), tx(Origin::Ledger, 2, 500, 1)];
        let bank = vec![tx(Origin::Bank, 1, 0, 1), tx(Origin::Bank, 2, 500, 1)];
        let result = run(&ledger, &bank, &MatchConfig::default()).unwrap();
        assert_eq!(result.pairs.len(), 1);
        assert!(result.leftover_ledger.is_empty());
        assert!(result.leftover_bank.is_empty());
    }

    #[test]
    fn duplicate_row_id_rejected() {
        let ledger = vec![tx(Origin::Ledger, 1, 500, 1), tx(Origin::Ledger, 1, 700, 1)];
        let err = run(&ledger, &[], &MatchConfig::default()).unwrap_err();
        assert_eq!(err.reason(), "duplicate_row_id");
    }

    #[test]
    fn origin_mismatch_rejected() {
        let bank = vec![tx(Origin::Ledger, 1, 500, 1)];
        let err = run(&[], &bank, &MatchConfig::default()).unwrap_err();
        assert_eq!(err.reason(), "origin_mismatch");
    }

    #[test]
    fn invalid_config_rejected() {
        let config = MatchConfig {
            max_candidates: 0,
            ..MatchConfig::default()
        };
        let err = run(&[], &[], &config).unwrap_err();
        assert_eq!(err.reason(), "config_invalid");
    }

    #[test]
    fn bidirectional_finds_bank_splits() {
        let ledger = vec![tx(Origin::Ledger, 1, 100_000, 1)];
        let bank = vec![tx(Origin::Bank, 1, 60_000, 1), tx(Origin::Bank, 2, 40_000, 2)];

        let result = run(&ledger, &bank, &MatchConfig::default()).unwrap();
        assert!(result.approved.is_empty());

        let config = MatchConfig {
            bidirectional_groups: true,
            ..MatchConfig::default()
        };
        let result = run(&ledger, &bank, &config).unwrap();
        assert_eq!(result.approved.len(), 1);
        assert_eq!(result.approved[0].direction, GroupDirection::BankToLedger);
        assert!(result.leftover_bank.is_empty());
        assert!(result.leftover_ledger.is_empty());
    }

    #[test]
    fn observer_sees_every_phase() {
        let ledger = vec![tx(Origin::Ledger, 1, 500, 1)];
        let bank = vec![tx(Origin::Bank, 1, 500, 1)];
        let mut events = Vec::new();
        run_with_observer(&ledger, &bank, &MatchConfig::default(), |e| events.push(e.clone()))
            .unwrap();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], PhaseEvent::RunStart { ledger_rows: 1, bank_rows: 1, .. }));
        assert!(matches!(
            events[1],
            PhaseEvent::PhaseDone { phase: Phase::OneToOne, count: 1, .. }
        ));
        assert!(matches!(events[4], PhaseEvent::PhaseDone { phase: Phase::Closure, count: 0, .. }));
        assert!(matches!(events[5], PhaseEvent::ResultsReady { .. }));
    }

    #[test]
    fn verify_closure_detects_missing_row() {
        let ledger = vec![tx(Origin::Ledger, 1, 500, 1)];
        let bank = vec![tx(Origin::Bank, 1, 700, 1)];
        let mut result = run(&ledger, &bank, &MatchConfig::default()).unwrap();
        result.leftover_bank.clear();
        let err = verify_closure(&ledger, &bank, &result).unwrap_err();
        assert_eq!(err.reason(), "closure_violation");
    }
}
