//! Layout sniffer: classify a sheet as bank statement or ledger export and
//! pull out the bank/account identity and the period it covers.
//!
//! Every heuristic is a small pure function over a [`Grid`]. Classification
//! runs them in a fixed order and the first one that answers wins.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::grid::{read_grid, Grid};
use crate::normalize::{parse_date_cell_loose, parse_date_loose};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAccount {
    /// Full account number as printed on statements.
    pub account: String,
    /// Short bank key (`ciudad`, `santander`, ...).
    pub bank: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankHint {
    /// Upper-case text searched for in the header excerpt.
    pub keyword: String,
    pub bank: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SniffConfig {
    pub accounts: Vec<KnownAccount>,
    /// Checked in order; put longer keywords first.
    pub bank_hints: Vec<BankHint>,
    /// Lower-case sheet names typical of ledger exports.
    pub ledger_sheet_names: Vec<String>,
    pub header_rows: usize,
    pub header_cols: usize,
    /// Rows read for the brute-force date scan.
    pub scan_rows: usize,
    /// Consecutive empty/unparsable cells that end the date-column scan.
    pub empty_run_stop: usize,
    pub preview_rows: usize,
}

impl Default for SniffConfig {
    fn default() -> Self {
        let account = |account: &str, bank: &str, display: &str| KnownAccount {
            account: account.into(),
            bank: bank.into(),
            display: display.into(),
        };
        let hint = |keyword: &str, bank: &str| BankHint {
            keyword: keyword.into(),
            bank: bank.into(),
        };
        Self {
            accounts: vec![
                account("3-111-0100026005-5", "ciudad", "Banco Ciudad - CC $"),
                account("100-393300535-000", "patagonia", "Banco Patagonia - CC $"),
                account("163-0-015508/3", "santander", "Banco Santander - CC $"),
            ],
            bank_hints: vec![
                hint("BANCO CIUDAD", "ciudad"),
                hint("BANCO SANTANDER", "santander"),
                hint("SANTANDER", "santander"),
                hint("BANCO PATAGONIA", "patagonia"),
                hint("PATAGONIA", "patagonia"),
            ],
            ledger_sheet_names: vec!["archivo contable".into(), "contable".into(), "resumen".into()],
            header_rows: 20,
            header_cols: 12,
            scan_rows: 30_000,
            empty_run_stop: 20,
            preview_rows: 10,
        }
    }
}

impl SniffConfig {
    pub fn find_account(&self, account: &str) -> Option<&KnownAccount> {
        let account = account.trim();
        self.accounts.iter().find(|a| a.account == account)
    }

    /// Map a short ledger account fragment (`26005/5`) to the single known
    /// full account whose digits end with, or contain near the end, the
    /// fragment's digits. Ambiguous fragments stay unresolved.
    pub fn map_short_account(&self, short: &str) -> Option<&KnownAccount> {
        let short_digits = digits_only(short);
        if short_digits.is_empty() {
            return None;
        }
        let mut candidates = self.accounts.iter().filter(|a| {
            let full = digits_only(&a.account);
            let tail_start = full.len().saturating_sub(12);
            full.ends_with(&short_digits) || full[tail_start..].contains(&short_digits)
        });
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Ledger,
    BankMovements,
    Unknown,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ledger => write!(f, "ledger"),
            Self::BankMovements => write!(f, "bank_movements"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Column names plus the first data rows, as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TablePreview {
    pub header_row: Option<usize>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// What a caller still has to supply by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Needs {
    pub bank: bool,
    pub period_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SniffReport {
    pub kind: DocumentKind,
    /// Name of the heuristic that decided `kind`.
    pub matched_by: Option<&'static str>,
    pub bank: Option<String>,
    /// Account text as found in the file.
    pub account: Option<String>,
    /// Resolved full account number.
    pub account_full: Option<String>,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub header_excerpt: Option<String>,
    pub sheet_name: Option<String>,
    pub preview: TablePreview,
    pub needs: Needs,
    pub error: Option<String>,
}

impl SniffReport {
    fn failed(error: String) -> Self {
        Self {
            kind: DocumentKind::Unknown,
            matched_by: None,
            bank: None,
            account: None,
            account_full: None,
            period_from: None,
            period_to: None,
            header_excerpt: None,
            sheet_name: None,
            preview: TablePreview::default(),
            needs: Needs {
                bank: true,
                period_range: true,
            },
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static RE_ACCOUNT_ON_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:CC\s*\$|C/C|\bCTA\.?\s*CTE\b|CUENTA\s*CORRIENTE)[^0-9A-Za-z]*([0-9][0-9./ \-]{6,}[0-9])",
    )
    .expect("literal pattern")
});

static RE_SHORT_ACCOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3,6}/\d)\b").expect("literal pattern"));

static RE_SHORT_ACCOUNT_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3,6}/\d$").expect("literal pattern"));

const LEDGER_HEADER_KEYWORDS: &[&str] = &["RESUMEN CUENTA BANCARIA"];

const BANK_HEADER_KEYWORDS: &[&str] = &[
    "EXTRACTO DE CUENTA",
    "TIPO Y NRO. DE CUENTA",
    "DENOMINACIÓN",
    "FECHA DESDE",
    "FECHA HASTA",
];

const TABLE_HEADER_HINTS: &[&str] = &[
    "FECHA DOCUMENTO PRINCIPAL",
    "DOC. COBRO",
    "CONTENEDOR",
    "DETALLE",
    "BENEFICIARIO",
    "INGRESOS",
    "EGRESOS",
    "ACUMULADO",
];

const BALANCE_ROW_MARKERS: &[&str] = &["SALDO INICIAL", "SALDO FINAL"];

fn has_balance_marker(upper: &str) -> bool {
    BALANCE_ROW_MARKERS.iter().any(|m| upper.contains(m))
}

// ---------------------------------------------------------------------------
// Header text
// ---------------------------------------------------------------------------

/// A line that reads like the column header of the movements table.
pub fn looks_like_table_header(line: &str) -> bool {
    let up = line.to_uppercase();
    TABLE_HEADER_HINTS.iter().any(|k| up.contains(k)) || up.split_whitespace().count() >= 10
}

/// Up to three non-empty lines from the top of the sheet, stopping at the
/// movements table.
pub fn header_lines(grid: &Grid, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for r in 0..grid.height().min(limit) {
        let line = grid.line(r);
        if line.is_empty() {
            continue;
        }
        if looks_like_table_header(&line) {
            break;
        }
        lines.push(line);
        if lines.len() >= 3 {
            break;
        }
    }
    lines
}

/// Drop table-header-like and overlong lines; keep at most three.
pub fn compact_header(lines: &[String]) -> Vec<String> {
    let out: Vec<String> = lines
        .iter()
        .filter(|l| !looks_like_table_header(l) && l.chars().count() <= 120)
        .take(3)
        .cloned()
        .collect();
    if out.is_empty() {
        lines.iter().take(1).cloned().collect()
    } else {
        out
    }
}

/// Value of a `label | value` header row: the first non-empty cell to the
/// right of a first-column cell equal to `label` (case-insensitive).
/// `Some("")` when the label is present without a value.
pub fn header_find_value(grid: &Grid, label: &str) -> Option<String> {
    let want = label.to_lowercase();
    for r in 0..grid.height() {
        let row = grid.row(r);
        let Some(first) = row.first() else {
            continue;
        };
        if first.to_string().to_lowercase() != want {
            continue;
        }
        return Some(
            row.iter()
                .skip(1)
                .map(|c| c.to_string())
                .find(|s| !s.is_empty())
                .unwrap_or_default(),
        );
    }
    None
}

fn first_column_labels(grid: &Grid) -> Vec<String> {
    (0..grid.height())
        .map(|r| grid.cell(r, 0).to_string().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Column signatures
// ---------------------------------------------------------------------------

fn upper_columns(columns: &[String]) -> Vec<String> {
    columns.iter().map(|c| c.trim().to_uppercase()).collect()
}

fn has_date_column(up: &[String]) -> bool {
    up.iter().any(|c| c.starts_with("FECHA"))
}

/// Date column, at least two of income/expense/running balance, and a
/// document or counterparty column.
pub fn columns_look_like_ledger(columns: &[String]) -> bool {
    let up = upper_columns(columns);
    let any = |needle: &str| up.iter().any(|c| c.contains(needle));
    let money_cols = [any("INGRESO"), any("EGRESO"), any("ACUMULADO")]
        .iter()
        .filter(|b| **b)
        .count();
    let has_doc = any("DOCUMENTO") || any("DOC.");
    has_date_column(&up) && money_cols >= 2 && (has_doc || any("BENEFICIARIO"))
}

/// Date column plus a description, amount or balance column, and not a ledger.
pub fn columns_look_like_bank(columns: &[String]) -> bool {
    if columns_look_like_ledger(columns) {
        return false;
    }
    let up = upper_columns(columns);
    let any = |needles: &[&str]| up.iter().any(|c| needles.iter().any(|n| c.contains(n)));
    has_date_column(&up)
        && (any(&["DESCRIP", "DETALLE", "CONCEPTO"])
            || any(&["DEBE", "HABER", "DÉBITO", "CRÉDITO", "IMPORTE", "MONTO"])
            || any(&["SALDO"]))
}

// ---------------------------------------------------------------------------
// Classification strategies
// ---------------------------------------------------------------------------

/// Everything the classification heuristics look at.
pub struct SniffInput<'a> {
    /// Top-left corner of the sheet.
    pub header: &'a Grid,
    pub excerpt: &'a str,
    pub columns: &'a [String],
    pub sheet_name: Option<&'a str>,
    pub config: &'a SniffConfig,
}

type KindStrategy = fn(&SniffInput<'_>) -> Option<DocumentKind>;

const KIND_STRATEGIES: &[(&str, KindStrategy)] = &[
    ("ledger_header_keyword", ledger_header_keyword),
    ("short_account", short_account_without_bank_markers),
    ("ledger_sheet_name", ledger_sheet_name),
    ("ledger_columns", ledger_columns),
    ("bank_header_fields", bank_header_fields),
    ("bank_columns", bank_columns),
];

fn ledger_header_keyword(input: &SniffInput<'_>) -> Option<DocumentKind> {
    let up = input.excerpt.to_uppercase();
    LEDGER_HEADER_KEYWORDS
        .iter()
        .any(|k| up.contains(k))
        .then_some(DocumentKind::Ledger)
}

fn short_account_without_bank_markers(input: &SniffInput<'_>) -> Option<DocumentKind> {
    (0..input.header.height())
        .map(|r| input.header.line(r))
        .any(|line| {
            let up = line.to_uppercase();
            RE_SHORT_ACCOUNT.is_match(&line) && !up.contains("CC $") && !up.contains("TIPO Y NRO")
        })
        .then_some(DocumentKind::Ledger)
}

fn ledger_sheet_name(input: &SniffInput<'_>) -> Option<DocumentKind> {
    let name = input.sheet_name?.trim().to_lowercase();
    input
        .config
        .ledger_sheet_names
        .iter()
        .any(|n| n.to_lowercase() == name)
        .then_some(DocumentKind::Ledger)
}

fn ledger_columns(input: &SniffInput<'_>) -> Option<DocumentKind> {
    columns_look_like_ledger(input.columns).then_some(DocumentKind::Ledger)
}

fn bank_header_fields(input: &SniffInput<'_>) -> Option<DocumentKind> {
    let up = input.excerpt.to_uppercase();
    if BANK_HEADER_KEYWORDS.iter().any(|k| up.contains(k)) {
        return Some(DocumentKind::BankMovements);
    }
    first_column_labels(input.header)
        .iter()
        .any(|l| BANK_HEADER_KEYWORDS.contains(&l.as_str()))
        .then_some(DocumentKind::BankMovements)
}

fn bank_columns(input: &SniffInput<'_>) -> Option<DocumentKind> {
    columns_look_like_bank(input.columns).then_some(DocumentKind::BankMovements)
}

/// Run the strategies in order; the first answer wins.
pub fn classify(input: &SniffInput<'_>) -> (DocumentKind, Option<&'static str>) {
    KIND_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(input).map(|kind| (kind, Some(*name))))
        .unwrap_or((DocumentKind::Unknown, None))
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Account number from a `Tipo y Nro. de Cuenta` row, else from an account
/// marker (`CC $`, `C/C`, `CTA CTE`, ...) anywhere in the first lines.
pub fn header_extract_account(header: &Grid) -> Option<String> {
    if let Some(value) = header_find_value(header, "Tipo y Nro. de Cuenta").filter(|v| !v.is_empty()) {
        let line = format!("Tipo y Nro. de Cuenta {value}");
        return Some(
            RE_ACCOUNT_ON_LINE
                .captures(&line)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_else(|| value.trim().to_string()),
        );
    }
    let text = (0..header.height().min(8))
        .map(|r| header.line(r))
        .collect::<Vec<_>>()
        .join("\n");
    RE_ACCOUNT_ON_LINE
        .captures(&text)
        .map(|c| c[1].trim().to_string())
}

/// First short ledger account fragment (`26005/5`) in the header rows.
pub fn short_account(header: &Grid) -> Option<String> {
    (0..header.height()).find_map(|r| {
        RE_SHORT_ACCOUNT
            .captures(&header.line(r))
            .map(|c| c[1].to_string())
    })
}

fn is_short_account(account: &str) -> bool {
    RE_SHORT_ACCOUNT_FULL.is_match(account.trim())
}

struct Identity {
    bank: Option<String>,
    account_full: Option<String>,
}

/// Resolution order: exact known account, short fragment (ledgers only),
/// bank keyword in the header, file name (bank statements only).
fn resolve_identity(
    kind: DocumentKind,
    account: Option<&str>,
    excerpt: &str,
    filename_hint: Option<&str>,
    config: &SniffConfig,
) -> Identity {
    if let Some(known) = account.and_then(|a| config.find_account(a)) {
        return Identity {
            bank: Some(known.bank.clone()),
            account_full: Some(known.account.clone()),
        };
    }

    if kind == DocumentKind::Ledger {
        if let Some(known) = account
            .filter(|a| is_short_account(a))
            .and_then(|a| config.map_short_account(a))
        {
            return Identity {
                bank: Some(known.bank.clone()),
                account_full: Some(known.account.clone()),
            };
        }
    }

    let up = excerpt.to_uppercase();
    if let Some(hint) = config.bank_hints.iter().find(|h| up.contains(&h.keyword.to_uppercase())) {
        return Identity {
            bank: Some(hint.bank.clone()),
            account_full: None,
        };
    }

    if kind == DocumentKind::BankMovements {
        if let Some(name) = filename_hint.map(str::to_lowercase) {
            let bank = config
                .accounts
                .iter()
                .map(|a| a.bank.as_str())
                .find(|b| name.contains(&b.to_lowercase()));
            if let Some(bank) = bank {
                return Identity {
                    bank: Some(bank.to_string()),
                    account_full: None,
                };
            }
        }
    }

    Identity {
        bank: None,
        account_full: None,
    }
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    fn include(&mut self, d: NaiveDate) {
        self.from = Some(self.from.map_or(d, |f| f.min(d)));
        self.to = Some(self.to.map_or(d, |t| t.max(d)));
    }

    fn is_complete(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    /// Fill missing ends from `other`.
    fn or(self, other: DateRange) -> DateRange {
        DateRange {
            from: self.from.or(other.from),
            to: self.to.or(other.to),
        }
    }
}

/// Explicit `Fecha desde` / `Fecha hasta` header fields.
pub fn header_period(header: &Grid) -> DateRange {
    let read = |label: &str| {
        header_find_value(header, label).and_then(|v| parse_date_loose(&v))
    };
    DateRange {
        from: read("Fecha desde"),
        to: read("Fecha hasta"),
    }
}

fn is_date_header(text: &str) -> bool {
    let up = text.trim().to_uppercase();
    up.starts_with("FECHA") && !up.contains("DESDE") && !up.contains("HASTA")
}

fn row_has_balance_marker(grid: &Grid, r: usize) -> bool {
    has_balance_marker(&grid.line(r).to_uppercase())
}

/// Min/max of the date column under the first `Fecha` header cell. Balance
/// rows are skipped; a run of `empty_run_stop` empty or unparsable cells ends
/// the scan.
pub fn column_scan_period(grid: &Grid, config: &SniffConfig) -> DateRange {
    let mut range = DateRange::default();
    let header = (0..grid.height().min(config.header_rows)).find_map(|r| {
        grid.row(r)
            .iter()
            .position(|c| is_date_header(&c.to_string()))
            .map(|c| (r, c))
    });
    let Some((header_row, col)) = header else {
        return range;
    };

    let mut run = 0usize;
    for r in header_row + 1..grid.height() {
        if row_has_balance_marker(grid, r) {
            continue;
        }
        match parse_date_cell_loose(grid.cell(r, col)) {
            Some(d) => {
                range.include(d);
                run = 0;
            }
            None => {
                run += 1;
                if run >= config.empty_run_stop {
                    break;
                }
            }
        }
    }
    range
}

/// Every parseable date anywhere in the first `scan_rows` rows.
pub fn brute_force_period(grid: &Grid, config: &SniffConfig) -> DateRange {
    let mut range = DateRange::default();
    for r in 0..grid.height().min(config.scan_rows) {
        if row_has_balance_marker(grid, r) {
            continue;
        }
        for cell in grid.row(r) {
            if let Some(d) = parse_date_cell_loose(cell) {
                range.include(d);
            }
        }
    }
    range
}

/// Header fields first, then the date column, then the whole sheet; each
/// later source only fills ends the earlier ones left open.
pub fn detect_period(grid: &Grid, header: &Grid, config: &SniffConfig) -> DateRange {
    let mut range = header_period(header);
    if !range.is_complete() {
        range = range.or(column_scan_period(grid, config));
    }
    if !range.is_complete() {
        range = range.or(brute_force_period(grid, config));
    }
    range
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Row holding the movements table's column names: the first row in the
/// header area with a `Fecha...` cell and at least one other label.
pub fn table_header_row(grid: &Grid, max_rows: usize) -> Option<usize> {
    (0..grid.height().min(max_rows)).find(|&r| {
        let row = grid.row(r);
        let filled = row.iter().filter(|c| !c.is_empty()).count();
        filled >= 2 && row.iter().any(|c| is_date_header(&c.to_string()))
    })
}

pub fn table_preview(grid: &Grid, config: &SniffConfig) -> TablePreview {
    let header_row = table_header_row(grid, config.header_rows);
    let columns_at = header_row.unwrap_or(0);
    let columns: Vec<String> = grid.row(columns_at).iter().map(|c| c.to_string()).collect();
    let rows = (columns_at + 1..grid.height())
        .filter(|&r| grid.row(r).iter().any(|c| !c.is_empty()))
        .take(config.preview_rows)
        .map(|r| grid.row(r).iter().map(|c| c.to_string()).collect())
        .collect();
    TablePreview {
        header_row,
        columns,
        rows,
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Classify a sheet. Never fails; anything undetermined is left `None`.
pub fn sniff(
    grid: &Grid,
    preview: &TablePreview,
    config: &SniffConfig,
    filename_hint: Option<&str>,
) -> SniffReport {
    let header = grid.head(config.header_rows, config.header_cols);
    let lines = compact_header(&header_lines(&header, 8));
    let excerpt = lines.join("\n");

    let input = SniffInput {
        header: &header,
        excerpt: &excerpt,
        columns: &preview.columns,
        sheet_name: grid.sheet_name.as_deref(),
        config,
    };
    let (mut kind, mut matched_by) = classify(&input);

    let mut account = header_extract_account(&header);
    if account.is_none() && kind == DocumentKind::Ledger {
        account = short_account(&header);
    }

    let identity = resolve_identity(kind, account.as_deref(), &excerpt, filename_hint, config);
    let period = detect_period(grid, &header, config);

    if kind == DocumentKind::Unknown && account.as_deref().is_some_and(is_short_account) {
        kind = DocumentKind::Ledger;
        matched_by = Some("short_account_refinement");
    }

    tracing::debug!(
        kind = %kind,
        matched_by = matched_by.unwrap_or("-"),
        bank = identity.bank.as_deref().unwrap_or("-"),
        account = account.as_deref().unwrap_or("-"),
        "sniffed layout"
    );

    SniffReport {
        kind,
        matched_by,
        needs: Needs {
            bank: identity.bank.is_none(),
            period_range: !period.is_complete(),
        },
        bank: identity.bank,
        account,
        account_full: identity.account_full,
        period_from: period.from,
        period_to: period.to,
        header_excerpt: (!excerpt.is_empty()).then_some(excerpt),
        sheet_name: grid.sheet_name.clone(),
        preview: preview.clone(),
        error: None,
    }
}

/// [`sniff`] with the preview derived from the grid itself.
pub fn sniff_grid(grid: &Grid, config: &SniffConfig, filename_hint: Option<&str>) -> SniffReport {
    let preview = table_preview(grid, config);
    sniff(grid, &preview, config, filename_hint)
}

/// Read the first sheet of a file and sniff it. Unreadable files are errors.
pub fn sniff_path(path: &Path, config: &SniffConfig) -> Result<SniffReport, LoadError> {
    let grid = read_grid(path, &[], Some(config.scan_rows))?;
    let filename = path.file_name().and_then(|n| n.to_str());
    Ok(sniff_grid(&grid, config, filename))
}

/// Like [`sniff_path`] but never fails: structural errors come back as an
/// `unknown` report carrying the error text.
pub fn sniff_file(path: &Path, config: &SniffConfig) -> SniffReport {
    match sniff_path(path, config) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(path = %path.display(), reason = e.reason(), "sniff failed: {e}");
            SniffReport::failed(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Two-file checks
// ---------------------------------------------------------------------------

/// Error text when a file uploaded for one role sniffs as something else.
pub fn role_mismatch(expected: DocumentKind, report: &SniffReport) -> Option<String> {
    if report.kind == expected {
        return None;
    }
    let wanted = match expected {
        DocumentKind::BankMovements => "a bank statement",
        DocumentKind::Ledger => "a ledger export",
        DocumentKind::Unknown => return None,
    };
    Some(format!("detected kind '{}', does not look like {wanted}", report.kind))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consensus {
    /// Set only when both files agree.
    pub bank: Option<String>,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
}

/// Bank agreed by both files and the union of their periods.
pub fn consensus(bank: &SniffReport, ledger: &SniffReport) -> Consensus {
    let agreed = match (&bank.bank, &ledger.bank) {
        (Some(a), Some(b)) if a == b => Some(a.clone()),
        _ => None,
    };
    let min = [bank.period_from, ledger.period_from].into_iter().flatten().min();
    let max = [bank.period_to, ledger.period_to].into_iter().flatten().max();
    Consensus {
        bank: agreed,
        period_from: min,
        period_to: max,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
