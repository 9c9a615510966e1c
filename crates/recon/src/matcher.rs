use std::collections::{BTreeMap, HashSet};

use crate::model::{MatchPair, OneToOneOutput, RowId, Transaction};

/// A same-amount, in-window ledger/bank combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    amount_cents: i64,
    date_diff_days: i64,
    ledger_id: RowId,
    bank_id: RowId,
    ledger_idx: usize,
    bank_idx: usize,
}

/// Pair single ledger rows with single bank rows of identical amount whose
/// dates lie at most `days_window` days apart.
///
/// Candidates come from an equality join on the amount, so the work is
/// proportional to the number of same-amount combinations rather than
/// `ledger.len() * bank.len()`. They are accepted greedily in
/// `(amount, date_diff, ledger_id, bank_id)` order; a row is never claimed twice.
pub fn match_one_to_one(
    ledger: &[Transaction],
    bank: &[Transaction],
    days_window: u32,
) -> OneToOneOutput {
    let mut bank_by_amount: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (bi, b) in bank.iter().enumerate() {
        bank_by_amount.entry(b.amount_cents).or_default().push(bi);
    }

    let window = i64::from(days_window);
    let mut candidates = Vec::new();
    for (li, l) in ledger.iter().enumerate() {
        let Some(bank_indices) = bank_by_amount.get(&l.amount_cents) else {
            continue;
        };
        for &bi in bank_indices {
            let b = &bank[bi];
            let Some(diff) = l.days_from(b) else {
                continue;
            };
            if diff > window {
                continue;
            }
            candidates.push(Candidate {
                amount_cents: l.amount_cents,
                date_diff_days: diff,
                ledger_id: l.row_id,
                bank_id: b.row_id,
                ledger_idx: li,
                bank_idx: bi,
            });
        }
    }

    candidates.sort_unstable();

    let mut used_ledger: HashSet<usize> = HashSet::new();
    let mut used_bank: HashSet<usize> = HashSet::new();
    let mut pairs = Vec::new();

    for c in &candidates {
        if used_ledger.contains(&c.ledger_idx) || used_bank.contains(&c.bank_idx) {
            continue;
        }
        used_ledger.insert(c.ledger_idx);
        used_bank.insert(c.bank_idx);
        pairs.push(MatchPair {
            ledger: ledger[c.ledger_idx].clone(),
            bank: bank[c.bank_idx].clone(),
            date_diff_days: c.date_diff_days,
            amount_cents: c.amount_cents,
        });
    }

    tracing::debug!(
        candidates = candidates.len(),
        pairs = pairs.len(),
        days_window,
        "one-to-one matching done"
    );

    let leftover_ledger = ledger
        .iter()
        .enumerate()
        .filter(|(i, _)| !used_ledger.contains(i))
        .map(|(_, r)| r.clone())
        .collect();
    let leftover_bank = bank
        .iter()
        .enumerate()
        .filter(|(i, _)| !used_bank.contains(i))
        .map(|(_, r)| r.clone())
        .collect();

    OneToOneOutput {
        pairs,
        leftover_ledger,
        leftover_bank,
    }
}
