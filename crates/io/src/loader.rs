//! Ledger and bank statement loaders: one sheet in, canonical rows out.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use concilia_recon::model::{GrossAmounts, Origin, RowId, Transaction};
use concilia_recon::summary::Balances;

use crate::error::LoadError;
use crate::grid::{read_grid, Grid};
use crate::normalize::{parse_amount, parse_amount_cell, parse_date, to_cents, Cell};

/// Sheet a ledger export keeps its movements on.
pub const LEDGER_SHEET: &str = "Resumen cuenta bancaria";
/// Sheet a bank statement keeps its movements on.
pub const BANK_SHEET: &str = "principal";

/// Rows searched for the table header.
pub const HEADER_SCAN_ROWS: usize = 50;

static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide, never reused across loads.
fn next_row_id() -> RowId {
    RowId(NEXT_ROW_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Ledger,
    Bank,
}

impl TableKind {
    pub fn origin(self) -> Origin {
        match self {
            Self::Ledger => Origin::Ledger,
            Self::Bank => Origin::Bank,
        }
    }

    fn preferred_sheet(self) -> &'static str {
        match self {
            Self::Ledger => LEDGER_SHEET,
            Self::Bank => BANK_SHEET,
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ledger => write!(f, "ledger"),
            Self::Bank => write!(f, "bank"),
        }
    }
}

/// Canonical rows of one file plus the balances printed in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedTable {
    pub kind: TableKind,
    pub rows: Vec<Transaction>,
    pub balances: Balances,
    pub sheet_name: Option<String>,
    pub header_row: usize,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn load(kind: TableKind, path: &Path) -> Result<LoadedTable, LoadError> {
    let grid = read_grid(path, &[kind.preferred_sheet().to_string()], None)?;
    let table = match kind {
        TableKind::Ledger => ledger_from_grid(&grid),
        TableKind::Bank => bank_from_grid(&grid),
    };
    if table.rows.is_empty() {
        tracing::warn!(
            path = %path.display(),
            kind = %kind,
            sheet = table.sheet_name.as_deref().unwrap_or("-"),
            "no movements loaded; the layout may be misdetected"
        );
    } else {
        tracing::debug!(path = %path.display(), kind = %kind, rows = table.rows.len(), "loaded table");
    }
    Ok(table)
}

pub fn load_ledger(path: &Path) -> Result<LoadedTable, LoadError> {
    load(TableKind::Ledger, path)
}

pub fn load_bank(path: &Path) -> Result<LoadedTable, LoadError> {
    load(TableKind::Bank, path)
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

fn find_col(header: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    header.iter().position(|h| pred(h))
}

/// First header equal to one of `names`, trying names in order.
fn find_named(header: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| header.iter().position(|h| h == name))
}

fn date_col(header: &[String]) -> usize {
    find_named(header, &["FECHA"])
        .or_else(|| find_col(header, |h| h.starts_with("FECHA")))
        .unwrap_or(0)
}

fn data_rows(grid: &Grid, header_row: usize) -> impl Iterator<Item = &[Cell]> {
    (header_row + 1..grid.height()).map(move |r| grid.row(r))
}

fn at(row: &[Cell], col: usize) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    row.get(col).unwrap_or(&EMPTY)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// First row with a `Fecha...` cell and an income, expense or running
/// balance column; row 0 when none qualifies.
pub fn ledger_header_row(grid: &Grid) -> usize {
    (0..grid.height().min(HEADER_SCAN_ROWS))
        .find(|&r| {
            let up = grid.row_upper(r);
            up.iter().any(|c| c.starts_with("FECHA"))
                && up
                    .iter()
                    .any(|c| c.contains("INGRESO") || c.contains("EGRESO") || c.contains("ACUMULADO"))
        })
        .unwrap_or(0)
}

struct LedgerColumns {
    date: usize,
    document: usize,
    income: usize,
    expense: usize,
}

impl LedgerColumns {
    fn locate(header: &[String], width: usize) -> Self {
        // Exports put income/expense at I/J; narrower sheets keep them last.
        let (income_at, expense_at) = if width > 9 {
            (8, 9)
        } else {
            (width.saturating_sub(2), width.saturating_sub(1))
        };
        Self {
            date: date_col(header),
            document: find_col(header, |h| h.contains("DOCUMENTO")).unwrap_or(1),
            income: find_col(header, |h| h.contains("INGRESO")).unwrap_or(income_at),
            expense: find_col(header, |h| h.contains("EGRESO")).unwrap_or(expense_at),
        }
    }
}

/// `amount = income - expense`; rows without a date or with a zero amount
/// are dropped. Gross columns ride along for the summary.
pub fn ledger_from_grid(grid: &Grid) -> LoadedTable {
    let header_row = ledger_header_row(grid);
    let header = grid.row_upper(header_row);
    let cols = LedgerColumns::locate(&header, grid.width());

    let mut rows = Vec::new();
    for row in data_rows(grid, header_row) {
        let Some(date) = parse_date(at(row, cols.date)) else {
            continue;
        };
        let income_cents = to_cents(parse_amount_cell(at(row, cols.income)));
        let expense_cents = to_cents(parse_amount_cell(at(row, cols.expense)));
        let amount_cents = income_cents - expense_cents;
        if amount_cents == 0 {
            continue;
        }
        rows.push(
            Transaction::new(
                next_row_id(),
                Origin::Ledger,
                Some(date),
                amount_cents,
                at(row, cols.document).to_string(),
            )
            .with_gross(GrossAmounts {
                income_cents,
                expense_cents,
            }),
        );
    }

    LoadedTable {
        kind: TableKind::Ledger,
        rows,
        balances: extract_balances(grid),
        sheet_name: grid.sheet_name.clone(),
        header_row,
    }
}

// ---------------------------------------------------------------------------
// Bank
// ---------------------------------------------------------------------------

const BANK_HEADER_LABELS: &[&str] = &[
    "FECHA",
    "COMPROBANTE",
    "CONCEPTO/COD.OP.",
    "CONCEPTO",
    "DETALLE",
    "DESCRIPCION",
    "DESCRIPCIÓN",
    "IMPORTE",
    "MONTO",
    "SALDO",
];

const AMOUNT_LABELS: &[&str] = &["IMPORTE", "IMPORTE EN $", "MONTO"];
const DOCUMENT_LABELS: &[&str] = &["COMPROBANTE", "DESCRIPCIÓN", "DETALLE", "DESCRIPCION"];
const DEBIT_LABELS: &[&str] = &["DEBE", "DÉBITO", "DEBITO"];
const CREDIT_LABELS: &[&str] = &["HABER", "CRÉDITO", "CREDITO"];

/// Score each of the first rows by how many expected labels it carries
/// (a literal `FECHA` counts double). A row qualifies with `FECHA` or two
/// labels; four or more ends the scan. Row 0 when nothing qualifies.
pub fn bank_header_row(grid: &Grid) -> usize {
    let mut best: Option<(usize, usize)> = None;
    for r in 0..grid.height().min(HEADER_SCAN_ROWS) {
        let up = grid.row_upper(r);
        let labels = up
            .iter()
            .filter(|c| BANK_HEADER_LABELS.contains(&c.as_str()))
            .count();
        let has_fecha = up.iter().any(|c| c == "FECHA");
        let score = labels + usize::from(has_fecha);
        if !(has_fecha || score >= 2) {
            continue;
        }
        let better = match best {
            Some((_, s)) => score > s,
            None => true,
        };
        if better {
            best = Some((r, score));
        }
        if score >= 4 {
            break;
        }
    }
    best.map_or(0, |(r, _)| r)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountColumns {
    Single(usize),
    Split { debit: usize, credit: usize },
}

impl AmountColumns {
    fn cents(self, row: &[Cell]) -> i64 {
        match self {
            Self::Single(c) => to_cents(parse_amount_cell(at(row, c))),
            Self::Split { debit, credit } => {
                to_cents(parse_amount_cell(at(row, credit))).abs()
                    - to_cents(parse_amount_cell(at(row, debit))).abs()
            }
        }
    }
}

struct BankColumns {
    date: usize,
    document: usize,
    amount: AmountColumns,
}

impl BankColumns {
    fn locate(header: &[String], width: usize) -> Self {
        let split = match (find_named(header, DEBIT_LABELS), find_named(header, CREDIT_LABELS)) {
            (Some(debit), Some(credit)) => Some(AmountColumns::Split { debit, credit }),
            _ => None,
        };
        let amount = find_named(header, AMOUNT_LABELS)
            .map(AmountColumns::Single)
            .or(split)
            .unwrap_or(AmountColumns::Single(if width > 4 { 4 } else { width.saturating_sub(1) }));
        Self {
            date: date_col(header),
            document: find_named(header, DOCUMENT_LABELS).unwrap_or(if width > 2 { 2 } else { 0 }),
            amount,
        }
    }
}

/// Signed amount from `IMPORTE`/`MONTO`, else `credit - debit`, else a fixed
/// offset. Rows without a date or with a zero amount are dropped.
pub fn bank_from_grid(grid: &Grid) -> LoadedTable {
    let header_row = bank_header_row(grid);
    let header = grid.row_upper(header_row);
    let cols = BankColumns::locate(&header, grid.width());

    let mut rows = Vec::new();
    for row in data_rows(grid, header_row) {
        let Some(date) = parse_date(at(row, cols.date)) else {
            continue;
        };
        let amount_cents = cols.amount.cents(row);
        if amount_cents == 0 {
            continue;
        }
        rows.push(Transaction::new(
            next_row_id(),
            Origin::Bank,
            Some(date),
            amount_cents,
            at(row, cols.document).to_string(),
        ));
    }

    LoadedTable {
        kind: TableKind::Bank,
        rows,
        balances: extract_balances(grid),
        sheet_name: grid.sheet_name.clone(),
        header_row,
    }
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

fn amount_in(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Number(n) => Some(to_cents(*n)),
        Cell::Text(s) if has_digit(s) => Some(to_cents(parse_amount(s))),
        _ => None,
    }
}

/// Value belonging to a balance label at `(r, c)`: text after the last `:`
/// in the same cell, else the next non-empty cell to the right.
fn balance_value(grid: &Grid, r: usize, c: usize, text: &str) -> Option<i64> {
    if let Some((_, tail)) = text.rsplit_once(':') {
        if has_digit(tail) {
            return Some(to_cents(parse_amount(tail)));
        }
    }
    grid.row(r)
        .iter()
        .skip(c + 1)
        .find(|cell| !cell.is_empty())
        .and_then(amount_in)
}

/// Opening/closing balances from `SALDO INICIAL` / `SALDO FINAL` cells.
/// The first labelled cell with a readable value wins.
pub fn extract_balances(grid: &Grid) -> Balances {
    let mut balances = Balances::default();
    for r in 0..grid.height() {
        for (c, cell) in grid.row(r).iter().enumerate() {
            let Cell::Text(text) = cell else {
                continue;
            };
            let up = text.to_uppercase();
            let slot = if up.contains("SALDO INICIAL") {
                &mut balances.opening_cents
            } else if up.contains("SALDO FINAL") {
                &mut balances.closing_cents
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = balance_value(grid, r, c, text);
            }
        }
    }
    balances
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
