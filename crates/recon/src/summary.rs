//! Financial totals for both sides and a per-partition breakdown of a result.

use serde::Serialize;

use crate::model::{sum_cents, Group, ReconciliationResult, Transaction};

/// Document text that marks a balance row rather than a movement.
pub const BALANCE_MARKERS: [&str; 2] = ["SALDO INICIAL", "SALDO FINAL"];

pub fn is_balance_marker(text: &str) -> bool {
    let upper = text.to_uppercase();
    BALANCE_MARKERS.iter().any(|m| upper.contains(m))
}

/// Keep only real movements: dated, non-zero, not an opening/closing balance row.
pub fn filter_movements(rows: &[Transaction]) -> Vec<Transaction> {
    rows.iter()
        .filter(|r| r.date.is_some() && r.amount_cents != 0)
        .filter(|r| !is_balance_marker(&r.document))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Opening/closing balances read from balance-marker cells, when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub opening_cents: Option<i64>,
    pub closing_cents: Option<i64>,
}

impl Balances {
    /// Explicit closing balance, else opening (or zero) plus `net`.
    pub fn closing_or_derived(&self, net_cents: i64) -> i64 {
        self.closing_cents
            .unwrap_or_else(|| self.opening_cents.unwrap_or(0).saturating_add(net_cents))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankTotals {
    pub movements: usize,
    /// Outflows, sign-flipped (positive).
    pub debit_cents: i64,
    pub credit_cents: i64,
    /// `credit - debit`.
    pub net_cents: i64,
    pub opening_cents: Option<i64>,
    pub closing_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerTotals {
    pub movements: usize,
    pub income_cents: i64,
    pub expense_cents: i64,
    /// `income - expense`.
    pub net_cents: i64,
    pub opening_cents: Option<i64>,
    pub closing_cents: i64,
}

pub fn bank_totals(rows: &[Transaction], balances: Balances) -> BankTotals {
    let credit_cents = sum_cents(rows.iter().map(|r| r.amount_cents).filter(|a| *a > 0));
    let debit_cents = sum_cents(
        rows.iter()
            .map(|r| r.amount_cents)
            .filter(|a| *a < 0)
            .map(|a| a.saturating_neg()),
    );
    let net_cents = credit_cents.saturating_sub(debit_cents);
    BankTotals {
        movements: rows.len(),
        debit_cents,
        credit_cents,
        net_cents,
        opening_cents: balances.opening_cents,
        closing_cents: balances.closing_or_derived(net_cents),
    }
}

/// Gross income/expense columns win over the net sign when a row carries them.
pub fn ledger_totals(rows: &[Transaction], balances: Balances) -> LedgerTotals {
    let mut income_cents = 0i64;
    let mut expense_cents = 0i64;
    for r in rows {
        match r.gross {
            Some(g) => {
                income_cents = income_cents.saturating_add(g.income_cents);
                expense_cents = expense_cents.saturating_add(g.expense_cents);
            }
            None if r.amount_cents > 0 => income_cents = income_cents.saturating_add(r.amount_cents),
            None => expense_cents = expense_cents.saturating_sub(r.amount_cents),
        }
    }
    let net_cents = income_cents.saturating_sub(expense_cents);
    LedgerTotals {
        movements: rows.len(),
        income_cents,
        expense_cents,
        net_cents,
        opening_cents: balances.opening_cents,
        closing_cents: balances.closing_or_derived(net_cents),
    }
}

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountAmount {
    pub count: usize,
    pub amount_cents: i64,
}

/// Count and amount per partition. A group counts once, valued at its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionBreakdown {
    pub pairs: CountAmount,
    pub approved: CountAmount,
    pub suggested: CountAmount,
    pub leftover_bank: CountAmount,
    pub leftover_ledger: CountAmount,
}

fn groups_breakdown(groups: &[Group]) -> CountAmount {
    CountAmount {
        count: groups.len(),
        amount_cents: sum_cents(groups.iter().map(|g| g.target.amount_cents)),
    }
}

fn rows_breakdown(rows: &[Transaction]) -> CountAmount {
    CountAmount {
        count: rows.len(),
        amount_cents: sum_cents(rows.iter().map(|r| r.amount_cents)),
    }
}

impl PartitionBreakdown {
    pub fn from_result(result: &ReconciliationResult) -> Self {
        Self {
            pairs: CountAmount {
                count: result.pairs.len(),
                amount_cents: sum_cents(result.pairs.iter().map(|p| p.amount_cents)),
            },
            approved: groups_breakdown(&result.approved),
            suggested: groups_breakdown(&result.suggested),
            leftover_bank: rows_breakdown(&result.leftover_bank),
            leftover_ledger: rows_breakdown(&result.leftover_ledger),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub days_window: u32,
    pub bank: BankTotals,
    pub ledger: LedgerTotals,
    /// Bank net minus ledger net.
    pub net_difference_cents: i64,
    pub breakdown: PartitionBreakdown,
}

/// Totals are taken over the movement-filtered tables; the breakdown comes
/// from `result`, which the caller should have computed over the same rows.
pub fn summarize(
    ledger: &[Transaction],
    bank: &[Transaction],
    ledger_balances: Balances,
    bank_balances: Balances,
    result: &ReconciliationResult,
    days_window: u32,
) -> Summary {
    let ledger = filter_movements(ledger);
    let bank = filter_movements(bank);
    let bank_totals = bank_totals(&bank, bank_balances);
    let ledger_totals = ledger_totals(&ledger, ledger_balances);
    let net_difference_cents = bank_totals.net_cents.saturating_sub(ledger_totals.net_cents);

    tracing::debug!(
        bank_net = bank_totals.net_cents,
        ledger_net = ledger_totals.net_cents,
        net_difference_cents,
        "summary computed"
    );

    Summary {
        days_window,
        bank: bank_totals,
        ledger: ledger_totals,
        net_difference_cents,
        breakdown: PartitionBreakdown::from_result(result),
    }
}
