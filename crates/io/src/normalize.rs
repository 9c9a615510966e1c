//! Money and date normalization for spreadsheet cells.
//!
//! Nothing here fails: unparsable money is `0.0`, unparsable dates are `None`.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

pub use concilia_recon::model::to_cents;

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A typed spreadsheet value as read from xlsx/ods/csv.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Trimmed display text; integers render without a fractional part and dates
/// as `YYYY-MM-DD`.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s.trim()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Parse a locale-ambiguous money string.
///
/// Currency symbols, letters and spaces are dropped. A pair of parentheses or
/// a leading `-` makes the value negative. With both `.` and `,` present the
/// rightmost one is the decimal separator. A lone separator type is the
/// decimal separator when it occurs once and a thousands separator when it
/// repeats (`1.234.567`).
pub fn parse_amount(raw: &str) -> f64 {
    let txt = raw.trim();
    if txt.is_empty() {
        return 0.0;
    }

    let mut negative = txt.contains('(') && txt.contains(')');
    let cleaned: String = txt
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.starts_with('-') {
        negative = true;
    }
    let digits: String = cleaned.chars().filter(|c| *c != '-').collect();
    if digits.is_empty() {
        return 0.0;
    }

    let last_dot = digits.rfind('.');
    let last_comma = digits.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (None, Some(_)) if digits.matches(',').count() > 1 => digits.replace(',', ""),
        (None, Some(_)) => digits.replace(',', "."),
        (Some(_), None) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits,
    };

    let value = normalized.parse::<f64>().unwrap_or(0.0);
    if !value.is_finite() {
        return 0.0;
    }
    if negative {
        -value.abs()
    } else {
        value
    }
}

/// Numbers pass through, text goes through [`parse_amount`], anything else is zero.
pub fn parse_amount_cell(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) if n.is_finite() => *n,
        Cell::Text(s) => parse_amount(s),
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Numeric values in this range are read as Excel serial dates.
pub const EXCEL_SERIAL_MIN: f64 = 20_000.0;
pub const EXCEL_SERIAL_MAX: f64 = 80_000.0;

/// Text date formats, tried in order.
pub const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m-%d-%Y",
];

static RE_DMY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0?[1-9]|[12][0-9]|3[01])[/.\-](0?[1-9]|1[0-2])[/.\-]([12]\d{3})")
        .expect("literal pattern")
});

fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Day part of an Excel serial (1900 date system); the time fraction is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    // 2_958_465 = 9999-12-31
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    excel_epoch().checked_add_signed(Duration::days(serial.floor() as i64))
}

fn plausible(d: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;
    (1900..=2100).contains(&d.year()).then_some(d)
}

/// Parse a typed cell as a calendar date.
///
/// Numbers count only when they are whole and inside the Excel serial range;
/// fractional numbers are far more likely to be money.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => {
            if n.fract() != 0.0 || *n < EXCEL_SERIAL_MIN || *n > EXCEL_SERIAL_MAX {
                return None;
            }
            serial_to_date(*n)
        }
        Cell::Text(s) => parse_date_text(s),
        Cell::Empty => None,
    }
}

/// Parse the date portion (before any space or `T`) of a string against
/// [`DATE_FORMATS`].
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or("");
    if head.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
        .and_then(plausible)
}

/// Day-first search anywhere in free text (`"Fecha desde: 01/09/2025"`),
/// falling back to [`parse_date_text`] on the text after its leading
/// non-digit noise.
pub fn parse_date_loose(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.replace(['\u{feff}', '\u{a0}'], " ");
    let body = cleaned.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
    if body.is_empty() {
        return None;
    }
    if let Some(caps) = RE_DMY.captures(body) {
        let day = caps[1].parse().ok();
        let month = caps[2].parse().ok();
        let year = caps[3].parse().ok();
        if let (Some(d), Some(m), Some(y)) = (day, month, year) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return plausible(date);
            }
        }
    }
    parse_date_text(body)
}

/// [`parse_date`] for typed cells, [`parse_date_loose`] for text.
pub fn parse_date_cell_loose(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => parse_date_loose(s),
        other => parse_date(other),
    }
}
