// Concilia CLI - bank statement vs. ledger reconciliation

mod exit_codes;
mod recon;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use concilia_recon::report::DEFAULT_DETAILS_LIMIT;

use exit_codes::EXIT_SUCCESS;
use recon::PairArgs;

#[derive(Parser)]
#[command(name = "concilia")]
#[command(about = "Reconcile a bank statement against a ledger export")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match both files and print a summary
    #[command(after_help = "\
Examples:
  concilia reconcile --bank extracto.xlsx --ledger contable.xlsx
  concilia reconcile --bank extracto.xlsx --ledger contable.xlsx --json
  concilia reconcile --bank extracto.csv --ledger contable.xlsx --days-window 3 --events
  concilia reconcile --bank extracto.xlsx --ledger contable.xlsx --output result.json")]
    Reconcile {
        #[command(flatten)]
        files: PairArgs,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Stream phase events to stdout as JSON lines
        #[arg(long)]
        events: bool,

        /// Rows listed per partition in the JSON details
        #[arg(long, default_value_t = DEFAULT_DETAILS_LIMIT)]
        limit: usize,
    },

    /// Debit/credit totals, balances and partition breakdown as JSON
    #[command(after_help = "\
Examples:
  concilia summary --bank extracto.xlsx --ledger contable.xlsx")]
    Summary {
        #[command(flatten)]
        files: PairArgs,

        /// Write JSON to file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Every pair, group and leftover row as JSON
    #[command(after_help = "\
Examples:
  concilia details --bank extracto.xlsx --ledger contable.xlsx --limit 50")]
    Details {
        #[command(flatten)]
        files: PairArgs,

        /// Rows listed per partition
        #[arg(long, default_value_t = DEFAULT_DETAILS_LIMIT)]
        limit: usize,

        /// Write JSON to file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Detect file kind, bank, account and period
    #[command(after_help = "\
Examples:
  concilia sniff extracto.xlsx
  concilia sniff --bank extracto.xlsx --ledger contable.xlsx")]
    Sniff {
        /// Files to classify without an expected role
        files: Vec<PathBuf>,

        /// File expected to be a bank statement
        #[arg(long)]
        bank: Option<PathBuf>,

        /// File expected to be a ledger export
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Settings TOML with a [sniff] table
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write JSON to file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("CONCILIA_REVISION"), ")",
        "\nengine:  concilia-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("CONCILIA_TARGET"),
    )
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile {
            files,
            json,
            output,
            events,
            limit,
        } => recon::cmd_reconcile(files, json, output, events, limit),
        Commands::Summary { files, output } => recon::cmd_summary(files, output),
        Commands::Details {
            files,
            limit,
            output,
        } => recon::cmd_details(files, limit, output),
        Commands::Sniff {
            files,
            bank,
            ledger,
            config,
            output,
        } => recon::cmd_sniff(files, bank, ledger, config, output),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
