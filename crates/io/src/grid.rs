//! Raw sheet access: one worksheet (or delimited file) as a grid of typed cells.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::LoadError;
use crate::normalize::{parse_date_text, serial_to_date, Cell};

static EMPTY: Cell = Cell::Empty;

/// One worksheet, row-major, with cells at their absolute positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    /// Name of the sheet the rows came from (`None` for delimited files).
    pub sheet_name: Option<String>,
    /// Every sheet in the workbook, in file order.
    pub sheet_names: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet_name: None,
            sheet_names: Vec::new(),
            rows,
        }
    }

    /// Build a text-only grid; blank strings become empty cells.
    pub fn from_text(rows: &[&[&str]]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::text(*s)).collect())
                .collect(),
        )
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.sheet_names.contains(&name) {
            self.sheet_names.push(name.clone());
        }
        self.sheet_name = Some(name);
        self
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY)
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Upper-cased trimmed text of every cell in a row.
    pub fn row_upper(&self, row: usize) -> Vec<String> {
        self.row(row).iter().map(|c| c.to_string().to_uppercase()).collect()
    }

    /// Non-empty cells of a row joined by single spaces.
    pub fn line(&self, row: usize) -> String {
        self.row(row)
            .iter()
            .map(Cell::to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Top-left corner of the grid.
    pub fn head(&self, max_rows: usize, max_cols: usize) -> Grid {
        Grid {
            sheet_name: self.sheet_name.clone(),
            sheet_names: self.sheet_names.clone(),
            rows: self
                .rows
                .iter()
                .take(max_rows)
                .map(|r| r.iter().take(max_cols).cloned().collect())
                .collect(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(Cell::is_empty))
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// xlsx / xlsm / xlsb / xls / ods, via calamine.
    Workbook,
    /// csv / tsv / txt.
    Delimited,
}

pub fn detect_format(path: &Path) -> Result<FileFormat, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileFormat::Workbook),
        "csv" | "tsv" | "txt" => Ok(FileFormat::Delimited),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Read one sheet of a file.
///
/// For workbooks the first sheet whose trimmed name matches one of
/// `preferred_sheets` (case-insensitive) is used, else the first sheet.
/// `max_rows` bounds how many rows are materialized.
pub fn read_grid(
    path: &Path,
    preferred_sheets: &[String],
    max_rows: Option<usize>,
) -> Result<Grid, LoadError> {
    std::fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let grid = match detect_format(path)? {
        FileFormat::Workbook => read_workbook(path, preferred_sheets, max_rows)?,
        FileFormat::Delimited => read_delimited(path, max_rows)?,
    };

    if grid.is_blank() {
        return Err(LoadError::NoRows {
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(
        path = %path.display(),
        sheet = grid.sheet_name.as_deref().unwrap_or("-"),
        rows = grid.height(),
        cols = grid.width(),
        "grid read"
    );
    Ok(grid)
}

pub fn pick_sheet<'a>(sheet_names: &'a [String], preferred: &[String]) -> Option<&'a String> {
    preferred
        .iter()
        .find_map(|p| {
            let want = p.trim().to_lowercase();
            sheet_names.iter().find(|n| n.trim().to_lowercase() == want)
        })
        .or_else(|| sheet_names.first())
}

fn read_workbook(
    path: &Path,
    preferred_sheets: &[String],
    max_rows: Option<usize>,
) -> Result<Grid, LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet = pick_sheet(&sheet_names, preferred_sheets)
        .cloned()
        .ok_or_else(|| LoadError::NoSheets {
            path: path.to_path_buf(),
        })?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| LoadError::Workbook {
            path: path.to_path_buf(),
            message: format!("sheet '{sheet}': {e}"),
        })?;

    let limit = max_rows.unwrap_or(usize::MAX);
    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let start_row = start_row as usize;
    let start_col = start_col as usize;

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row.min(limit)];
    for row in range.rows() {
        if rows.len() >= limit {
            break;
        }
        let mut cells = vec![Cell::Empty; start_col];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }

    Ok(Grid {
        sheet_name: Some(sheet),
        sheet_names,
        rows,
    })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            serial_to_date(serial).map_or(Cell::Number(serial), Cell::Date)
        }
        Data::DateTimeIso(s) => parse_date_text(s).map_or_else(|| Cell::text(s.as_str()), Cell::Date),
        Data::DurationIso(s) => Cell::text(s.as_str()),
    }
}

fn read_delimited(path: &Path, max_rows: Option<usize>) -> Result<Grid, LoadError> {
    let content = read_file_as_utf8(path)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let delimiter = sniff_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let limit = max_rows.unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    for result in reader.records() {
        if rows.len() >= limit {
            break;
        }
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(Cell::text).collect());
    }

    Ok(Grid::from_rows(rows))
}

/// Delimiters tried, in tie-break order. Semicolon first: local exports use
/// `,` as the decimal mark.
const DELIMITERS: &[u8] = &[b';', b'\t', b',', b'|'];

/// Non-blank lines looked at when picking a delimiter.
const DELIMITER_SAMPLE_LINES: usize = 30;

/// Pick the field delimiter of a delimited export.
///
/// Under each candidate, the sample's records are bucketed by field count and
/// the largest bucket with more than one field is that candidate's table
/// shape. Most lines wins, then most fields. Title and note lines above the
/// table split into a single field and are ignored. Defaults to `,`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(DELIMITER_SAMPLE_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut best = b',';
    let mut best_shape = (0usize, 0usize);
    for &delim in DELIMITERS {
        let shape = table_shape(&sample, delim);
        if shape > best_shape {
            best_shape = shape;
            best = delim;
        }
    }
    best
}

/// `(lines, fields)` of the most common multi-field record width.
fn table_shape(sample: &str, delimiter: u8) -> (usize, usize) {
    let mut widths: HashMap<usize, usize> = HashMap::new();
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes());
    for record in reader.into_records().flatten() {
        if record.len() > 1 {
            *widths.entry(record.len()).or_default() += 1;
        }
    }
    widths
        .into_iter()
        .map(|(fields, lines)| (lines, fields))
        .max()
        .unwrap_or((0, 0))
}

/// Read a file as UTF-8, falling back to Windows-1252 (common for bank exports).
pub fn read_file_as_utf8(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
