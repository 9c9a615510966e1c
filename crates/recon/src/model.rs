use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Opaque per-load row handle. Unique within its source table; never an index
/// into a different table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Bank,
    Ledger,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bank => write!(f, "bank"),
            Self::Ledger => write!(f, "ledger"),
        }
    }
}

/// Gross columns of a ledger row, kept so summaries can total the original
/// income/expense figures instead of re-deriving them from the net sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GrossAmounts {
    pub income_cents: i64,
    pub expense_cents: i64,
}

/// One movement from either source, normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub row_id: RowId,
    pub origin: Origin,
    pub date: Option<NaiveDate>,
    /// Signed, positive = inflow. Never zero for loader-produced rows.
    pub amount_cents: i64,
    pub document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross: Option<GrossAmounts>,
}

impl Transaction {
    pub fn new(
        row_id: RowId,
        origin: Origin,
        date: Option<NaiveDate>,
        amount_cents: i64,
        document: impl Into<String>,
    ) -> Self {
        Self {
            row_id,
            origin,
            date,
            amount_cents,
            document: document.into(),
            gross: None,
        }
    }

    pub fn with_gross(mut self, gross: GrossAmounts) -> Self {
        self.gross = Some(gross);
        self
    }

    /// Whole days between two rows, if both carry a date.
    pub fn days_from(&self, other: &Transaction) -> Option<i64> {
        match (self.date, other.date) {
            (Some(a), Some(b)) => Some((a - b).num_days().abs()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// One-to-one
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPair {
    pub ledger: Transaction,
    pub bank: Transaction,
    pub date_diff_days: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Default)]
pub struct OneToOneOutput {
    pub pairs: Vec<MatchPair>,
    pub leftover_ledger: Vec<Transaction>,
    pub leftover_bank: Vec<Transaction>,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Approved,
    Suggested,
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Suggested => write!(f, "suggested"),
        }
    }
}

/// Which side supplies the components. `LedgerToBank` = many ledger rows
/// summing to one bank row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDirection {
    LedgerToBank,
    BankToLedger,
}

impl GroupDirection {
    pub fn target_origin(&self) -> Origin {
        match self {
            Self::LedgerToBank => Origin::Bank,
            Self::BankToLedger => Origin::Ledger,
        }
    }

    pub fn component_origin(&self) -> Origin {
        match self {
            Self::LedgerToBank => Origin::Ledger,
            Self::BankToLedger => Origin::Bank,
        }
    }
}

impl fmt::Display for GroupDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LedgerToBank => write!(f, "ledger_to_bank"),
            Self::BankToLedger => write!(f, "bank_to_ledger"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub target: Transaction,
    pub components: Vec<Transaction>,
    pub amount_total_cents: i64,
    /// Component sum minus target amount.
    pub diff_cents: i64,
    pub status: GroupStatus,
    pub direction: GroupDirection,
}

/// Per-pass DFS statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub targets_searched: usize,
    pub targets_without_candidates: usize,
    pub nodes_visited: u64,
    pub cap_hits: usize,
}

impl SearchStats {
    pub fn absorb(&mut self, other: SearchStats) {
        self.targets_searched += other.targets_searched;
        self.targets_without_candidates += other.targets_without_candidates;
        self.nodes_visited += other.nodes_visited;
        self.cap_hits += other.cap_hits;
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    OneToOne,
    GroupsApproved,
    GroupsSuggested,
    Closure,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneToOne => write!(f, "one_to_one"),
            Self::GroupsApproved => write!(f, "groups_approved"),
            Self::GroupsSuggested => write!(f, "groups_suggested"),
            Self::Closure => write!(f, "closure"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// The full partition of both tables.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub pairs: Vec<MatchPair>,
    pub approved: Vec<Group>,
    pub suggested: Vec<Group>,
    pub leftover_bank: Vec<Transaction>,
    pub leftover_ledger: Vec<Transaction>,
    pub timings: Vec<PhaseTiming>,
    pub approved_stats: SearchStats,
    pub suggested_stats: SearchStats,
}

impl ReconciliationResult {
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.approved.iter().chain(self.suggested.iter())
    }

    pub fn timing(&self, phase: Phase) -> Option<Duration> {
        self.timings.iter().find(|t| t.phase == phase).map(|t| t.duration)
    }
}

/// Largest magnitude accepted as a money amount (one trillion).
pub const MAX_AMOUNT: f64 = 1e12;

/// Round a decimal to cents, half away from zero. Non-finite values and
/// magnitudes at or beyond [`MAX_AMOUNT`] are noise and become zero, so
/// loaders drop the row.
pub fn to_cents(value: f64) -> i64 {
    if !value.is_finite() || value.abs() >= MAX_AMOUNT {
        return 0;
    }
    (value * 100.0).round() as i64
}

/// Saturating total, so hand-built tables with extreme amounts cannot overflow.
pub fn sum_cents<I: IntoIterator<Item = i64>>(amounts: I) -> i64 {
    amounts.into_iter().fold(0i64, i64::saturating_add)
}

pub fn cents_to_f64(cents: i64) -> f64 {
    cents as f64 / 100.0
}
