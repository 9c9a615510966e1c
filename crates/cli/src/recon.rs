//! `concilia reconcile | summary | details | sniff`

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use concilia_io::loader::{LoadedTable, TableKind};
use concilia_io::sniff::{consensus, role_mismatch, sniff_file, Consensus, DocumentKind, SniffReport};
use concilia_io::{LoadError, TableCache};
use concilia_recon::model::{cents_to_f64, PhaseTiming, SearchStats};
use concilia_recon::report::{DetailsView, PhaseEvent};
use concilia_recon::summary::{filter_movements, summarize, Summary};
use concilia_recon::{run, run_with_observer, MatchConfig, ReconError, ReconciliationResult};

use crate::exit_codes::{EXIT_ENGINE, EXIT_INVALID_CONFIG, EXIT_LOAD, EXIT_USAGE};
use crate::settings::Settings;
use crate::CliError;

/// The two input files plus matching parameters, shared by every run command.
#[derive(Args, Debug, Clone)]
pub struct PairArgs {
    /// Bank statement (xlsx, xlsm, xlsb, xls, ods, csv, tsv, txt)
    #[arg(long)]
    pub bank: PathBuf,

    /// Ledger export
    #[arg(long)]
    pub ledger: PathBuf,

    /// Maximum days between matched rows (overrides the settings file)
    #[arg(long)]
    pub days_window: Option<u32>,

    /// Settings TOML with [matching] and [sniff] tables
    #[arg(long)]
    pub config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn load_err(e: LoadError) -> CliError {
    let hint = match &e {
        LoadError::UnsupportedFormat { .. } => {
            Some("supported: xlsx, xlsm, xlsb, xls, ods, csv, tsv, txt".to_string())
        }
        LoadError::NoRows { .. } | LoadError::NoSheets { .. } => {
            Some("the file is empty or its first sheet has no cells".to_string())
        }
        _ => None,
    };
    CliError {
        code: EXIT_LOAD,
        message: format!("{e} [{}]", e.reason()),
        hint,
    }
}

fn engine_err(e: ReconError) -> CliError {
    let code = match e {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_ENGINE,
    };
    CliError::new(code, format!("{e} [{}]", e.reason()))
}

// ---------------------------------------------------------------------------
// Shared run
// ---------------------------------------------------------------------------

struct Loaded {
    config: MatchConfig,
    bank: LoadedTable,
    ledger: LoadedTable,
}

fn load_pair(args: &PairArgs) -> Result<Loaded, CliError> {
    let settings = Settings::load(args.config.as_deref())?;
    let config = settings.matching_with(args.days_window);
    config.validate().map_err(engine_err)?;

    let cache = TableCache::new();
    let mut bank = cache.get_or_load(TableKind::Bank, &args.bank).map_err(load_err)?;
    let mut ledger = cache.get_or_load(TableKind::Ledger, &args.ledger).map_err(load_err)?;
    // Balance rows are neither matched nor left over.
    bank.rows = filter_movements(&bank.rows);
    ledger.rows = filter_movements(&ledger.rows);
    Ok(Loaded {
        config,
        bank,
        ledger,
    })
}

fn print_event(event: &PhaseEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!("cannot serialize event: {e}"),
    }
}

fn reconcile_loaded(loaded: &Loaded, events: bool) -> Result<ReconciliationResult, CliError> {
    let (ledger, bank) = (&loaded.ledger.rows, &loaded.bank.rows);
    let result = if events {
        run_with_observer(ledger, bank, &loaded.config, print_event)
    } else {
        run(ledger, bank, &loaded.config)
    };
    result.map_err(engine_err)
}

fn summary_of(loaded: &Loaded, result: &ReconciliationResult) -> Summary {
    summarize(
        &loaded.ledger.rows,
        &loaded.bank.rows,
        loaded.ledger.balances,
        loaded.bank.balances,
        result,
        loaded.config.days_window,
    )
}

/// Pretty JSON to `output` and/or stdout.
fn emit_json<T: Serialize>(value: &T, output: Option<&Path>, stdout: bool) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ENGINE, format!("JSON serialization error: {e}")))?;
    if let Some(path) = output {
        std::fs::write(path, &json).map_err(|e| {
            CliError::new(EXIT_USAGE, format!("cannot write {}: {e}", path.display()))
        })?;
        eprintln!("wrote {}", path.display());
    }
    if stdout {
        println!("{json}");
    }
    Ok(())
}

fn money(cents: i64) -> String {
    format!("{:.2}", cents_to_f64(cents))
}

fn print_human_summary(loaded: &Loaded, summary: &Summary) {
    let b = &summary.breakdown;
    eprintln!(
        "reconciled {} bank / {} ledger rows (window {} days): {} pairs, {} approved groups, {} suggested groups",
        loaded.bank.rows.len(),
        loaded.ledger.rows.len(),
        summary.days_window,
        b.pairs.count,
        b.approved.count,
        b.suggested.count,
    );
    eprintln!(
        "left over: {} bank ({}), {} ledger ({})",
        b.leftover_bank.count,
        money(b.leftover_bank.amount_cents),
        b.leftover_ledger.count,
        money(b.leftover_ledger.amount_cents),
    );
    eprintln!(
        "net: bank {} vs ledger {} (difference {})",
        money(summary.bank.net_cents),
        money(summary.ledger.net_cents),
        money(summary.net_difference_cents),
    );
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReconcileOutput<'a> {
    summary: &'a Summary,
    details: DetailsView,
    timings: &'a [PhaseTiming],
    approved_stats: SearchStats,
    suggested_stats: SearchStats,
}

pub fn cmd_reconcile(
    args: PairArgs,
    json: bool,
    output: Option<PathBuf>,
    events: bool,
    limit: usize,
) -> Result<(), CliError> {
    let loaded = load_pair(&args)?;
    let result = reconcile_loaded(&loaded, events)?;
    let summary = summary_of(&loaded, &result);

    if json || output.is_some() {
        let out = ReconcileOutput {
            summary: &summary,
            details: DetailsView::from_result(&result, limit),
            timings: &result.timings,
            approved_stats: result.approved_stats,
            suggested_stats: result.suggested_stats,
        };
        emit_json(&out, output.as_deref(), json)?;
    }

    print_human_summary(&loaded, &summary);
    Ok(())
}

// ---------------------------------------------------------------------------
// summary / details
// ---------------------------------------------------------------------------

pub fn cmd_summary(args: PairArgs, output: Option<PathBuf>) -> Result<(), CliError> {
    let loaded = load_pair(&args)?;
    let result = reconcile_loaded(&loaded, false)?;
    let summary = summary_of(&loaded, &result);
    emit_json(&summary, output.as_deref(), output.is_none())
}

pub fn cmd_details(args: PairArgs, limit: usize, output: Option<PathBuf>) -> Result<(), CliError> {
    let loaded = load_pair(&args)?;
    let result = reconcile_loaded(&loaded, false)?;
    let details = DetailsView::from_result(&result, limit);
    emit_json(&details, output.as_deref(), output.is_none())
}

// ---------------------------------------------------------------------------
// sniff
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SniffedFile {
    path: String,
    role: Option<DocumentKind>,
    #[serde(flatten)]
    report: SniffReport,
    role_error: Option<String>,
}

#[derive(Serialize)]
struct SniffOutput {
    files: Vec<SniffedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consensus: Option<Consensus>,
}

pub fn cmd_sniff(
    files: Vec<PathBuf>,
    bank: Option<PathBuf>,
    ledger: Option<PathBuf>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let settings = Settings::load(config.as_deref())?;

    let mut inputs: Vec<(PathBuf, Option<DocumentKind>)> = Vec::new();
    inputs.extend(bank.map(|p| (p, Some(DocumentKind::BankMovements))));
    inputs.extend(ledger.map(|p| (p, Some(DocumentKind::Ledger))));
    inputs.extend(files.into_iter().map(|p| (p, None)));
    if inputs.is_empty() {
        return Err(CliError::new(EXIT_USAGE, "nothing to sniff")
            .with_hint("pass files, or --bank and/or --ledger"));
    }

    let sniffed: Vec<SniffedFile> = inputs
        .into_iter()
        .map(|(path, role)| {
            let report = sniff_file(&path, &settings.sniff);
            let role_error = role.and_then(|r| role_mismatch(r, &report));
            SniffedFile {
                path: path.display().to_string(),
                role,
                report,
                role_error,
            }
        })
        .collect();

    let by_role = |kind: DocumentKind| sniffed.iter().find(|f| f.role == Some(kind)).map(|f| &f.report);
    let agreed = match (by_role(DocumentKind::BankMovements), by_role(DocumentKind::Ledger)) {
        (Some(b), Some(l)) => Some(consensus(b, l)),
        _ => None,
    };

    for f in &sniffed {
        eprintln!(
            "{}: {} bank={} period={}..{}",
            f.path,
            f.report.kind,
            f.report.bank.as_deref().unwrap_or("?"),
            f.report.period_from.map_or("?".to_string(), |d| d.to_string()),
            f.report.period_to.map_or("?".to_string(), |d| d.to_string()),
        );
    }

    let mismatches: Vec<String> = sniffed
        .iter()
        .filter_map(|f| f.role_error.as_ref().map(|e| format!("{}: {e}", f.path)))
        .collect();

    emit_json(
        &SniffOutput {
            files: sniffed,
            consensus: agreed,
        },
        output.as_deref(),
        output.is_none(),
    )?;

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(CliError::new(EXIT_USAGE, mismatches.join("; "))
            .with_hint("check that --bank and --ledger are not swapped"))
    }
}
