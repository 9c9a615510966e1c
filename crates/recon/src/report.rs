//! Caller-facing views of a reconciliation result.
//!
//! Rows are rendered with ISO-8601 dates and two-decimal amounts. Truncating
//! a view never changes the result it was built from; untruncated counts are
//! carried alongside every list.

use serde::Serialize;

use crate::model::{
    cents_to_f64, sum_cents, Group, GroupDirection, GroupStatus, MatchPair, Origin, Phase,
    ReconciliationResult, Transaction,
};
use crate::summary::PartitionBreakdown;

// ---------------------------------------------------------------------------
// Row-level views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub row_id: u64,
    pub origin: Origin,
    /// `YYYY-MM-DD`, or `None` for dateless rows.
    pub date: Option<String>,
    pub amount: f64,
    pub document: String,
}

impl From<&Transaction> for RowView {
    fn from(tx: &Transaction) -> Self {
        Self {
            row_id: tx.row_id.0,
            origin: tx.origin,
            date: tx.date.map(|d| d.format("%Y-%m-%d").to_string()),
            amount: cents_to_f64(tx.amount_cents),
            document: tx.document.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairView {
    pub ledger: RowView,
    pub bank: RowView,
    pub date_diff_days: i64,
    pub amount: f64,
}

impl From<&MatchPair> for PairView {
    fn from(pair: &MatchPair) -> Self {
        Self {
            ledger: RowView::from(&pair.ledger),
            bank: RowView::from(&pair.bank),
            date_diff_days: pair.date_diff_days,
            amount: cents_to_f64(pair.amount_cents),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub status: GroupStatus,
    pub direction: GroupDirection,
    pub target: RowView,
    pub components: Vec<RowView>,
    pub amount_total: f64,
    pub diff: f64,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        Self {
            status: group.status,
            direction: group.direction,
            target: RowView::from(&group.target),
            components: group.components.iter().map(RowView::from).collect(),
            amount_total: cents_to_f64(group.amount_total_cents),
            diff: cents_to_f64(group.diff_cents),
        }
    }
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

/// One partition, cut to a caller limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Truncated<T> {
    pub total: usize,
    pub truncated: bool,
    pub rows: Vec<T>,
}

impl<T> Truncated<T> {
    fn limited<'a, S: 'a, I>(items: I, total: usize, limit: usize) -> Self
    where
        I: IntoIterator<Item = &'a S>,
        T: From<&'a S>,
    {
        let rows: Vec<T> = items.into_iter().take(limit).map(T::from).collect();
        Self {
            total,
            truncated: rows.len() < total,
            rows,
        }
    }
}

/// Every partition of a result, each truncated to `limit` rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailsView {
    pub limit: usize,
    pub pairs: Truncated<PairView>,
    pub approved: Truncated<GroupView>,
    pub suggested: Truncated<GroupView>,
    pub leftover_bank: Truncated<RowView>,
    pub leftover_ledger: Truncated<RowView>,
}

/// Default number of rows per partition handed to a caller.
pub const DEFAULT_DETAILS_LIMIT: usize = 500;

impl DetailsView {
    pub fn from_result(result: &ReconciliationResult, limit: usize) -> Self {
        Self {
            limit,
            pairs: Truncated::limited(&result.pairs, result.pairs.len(), limit),
            approved: Truncated::limited(&result.approved, result.approved.len(), limit),
            suggested: Truncated::limited(&result.suggested, result.suggested.len(), limit),
            leftover_bank: Truncated::limited(
                &result.leftover_bank,
                result.leftover_bank.len(),
                limit,
            ),
            leftover_ledger: Truncated::limited(
                &result.leftover_ledger,
                result.leftover_ledger.len(),
                limit,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase events
// ---------------------------------------------------------------------------

/// Rows attached to a `PHASE_DONE` event.
pub const EVENT_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Samples {
    Pairs(Vec<PairView>),
    Groups(Vec<GroupView>),
    Rows(Vec<RowView>),
}

/// Plain key/value progress notifications, one per pipeline step. The engine
/// knows nothing about how they are delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseEvent {
    RunStart {
        ledger_rows: usize,
        bank_rows: usize,
        days_window: u32,
    },
    PhaseDone {
        phase: Phase,
        count: usize,
        amount: f64,
        elapsed_ms: f64,
        samples: Samples,
    },
    ResultsReady {
        breakdown: PartitionBreakdown,
        elapsed_ms: f64,
    },
}

impl PhaseEvent {
    pub fn pairs_done(pairs: &[MatchPair], elapsed_ms: f64) -> Self {
        Self::PhaseDone {
            phase: Phase::OneToOne,
            count: pairs.len(),
            amount: cents_to_f64(sum_cents(pairs.iter().map(|p| p.amount_cents))),
            elapsed_ms,
            samples: Samples::Pairs(
                pairs.iter().take(EVENT_SAMPLE_ROWS).map(PairView::from).collect(),
            ),
        }
    }

    pub fn groups_done(phase: Phase, groups: &[Group], elapsed_ms: f64) -> Self {
        Self::PhaseDone {
            phase,
            count: groups.len(),
            amount: cents_to_f64(sum_cents(groups.iter().map(|g| g.target.amount_cents))),
            elapsed_ms,
            samples: Samples::Groups(
                groups.iter().take(EVENT_SAMPLE_ROWS).map(GroupView::from).collect(),
            ),
        }
    }

    /// Leftovers of both sides; `amount` is the bank total minus the ledger total.
    pub fn closure_done(
        leftover_bank: &[Transaction],
        leftover_ledger: &[Transaction],
        elapsed_ms: f64,
    ) -> Self {
        let bank = sum_cents(leftover_bank.iter().map(|t| t.amount_cents));
        let ledger = sum_cents(leftover_ledger.iter().map(|t| t.amount_cents));
        Self::PhaseDone {
            phase: Phase::Closure,
            count: leftover_bank.len() + leftover_ledger.len(),
            amount: cents_to_f64(bank.saturating_sub(ledger)),
            elapsed_ms,
            samples: Samples::Rows(
                leftover_bank
                    .iter()
                    .chain(leftover_ledger.iter())
                    .take(EVENT_SAMPLE_ROWS)
                    .map(RowView::from)
                    .collect(),
            ),
        }
    }
}
