// End-to-end tests for the `concilia` binary.
// Run with: cargo test -p concilia-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

fn concilia() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_concilia"));
    cmd.env_remove("RUST_LOG");
    cmd
}

const LEDGER_CSV: &str = "\
Fecha;Documento;Ingresos;Egresos
03/09/2025;DI01:6484;5.040.000,00;0
03/09/2025;DI01:6485;5.040.000,00;0
05/09/2025;REC 1;600,00;0
05/09/2025;REC 2;400,50;0
20/09/2025;OP 9;0;75,00
";

const BANK_CSV: &str = "\
Fecha;Concepto;Comprobante;Importe
02/09/2025;TRANSF;6209261;5.040.000,00
02/09/2025;TRANSF;6209264;5.040.000,00
06/09/2025;DEP;777;1.000,00
10/09/2025;COMISION;888;-12,00
";

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("contable.csv"), LEDGER_CSV).unwrap();
        std::fs::write(dir.path().join("extracto.csv"), BANK_CSV).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn ledger(&self) -> PathBuf {
        self.path("contable.csv")
    }

    fn bank(&self) -> PathBuf {
        self.path("extracto.csv")
    }

    fn run(&self, subcommand: &str, extra: &[&str]) -> Output {
        concilia()
            .arg(subcommand)
            .arg("--bank")
            .arg(self.bank())
            .arg("--ledger")
            .arg(self.ledger())
            .args(extra)
            .output()
            .unwrap()
    }
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        )
    })
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

#[test]
fn reconcile_json() {
    let fx = Fixture::new();
    let out = fx.run("reconcile", &["--json"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));

    let json = stdout_json(&out);
    let breakdown = &json["summary"]["breakdown"];
    assert_eq!(breakdown["pairs"]["count"], 2);
    assert_eq!(breakdown["approved"]["count"], 1);
    assert_eq!(breakdown["suggested"]["count"], 0);
    assert_eq!(breakdown["leftover_bank"]["count"], 1);
    assert_eq!(breakdown["leftover_ledger"]["count"], 1);
    assert_eq!(json["summary"]["net_difference_cents"], 6_250);

    let pairs = json["details"]["pairs"]["rows"].as_array().unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(json["details"]["leftover_bank"]["rows"][0]["document"], "888");

    assert!(stderr(&out).contains("2 pairs"));
}

#[test]
fn reconcile_without_json_keeps_stdout_empty() {
    let fx = Fixture::new();
    let out = fx.run("reconcile", &[]);
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
    assert!(stderr(&out).contains("left over: 1 bank"));
}

#[test]
fn reconcile_writes_output_file() {
    let fx = Fixture::new();
    let target = fx.path("result.json");
    let out = fx.run("reconcile", &["--output", target.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(0));
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(written["summary"]["days_window"], 5);
}

#[test]
fn days_window_flag_overrides_default() {
    let fx = Fixture::new();
    let out = fx.run("summary", &["--days-window", "0"]);
    assert_eq!(out.status.code(), Some(0));
    let json = stdout_json(&out);
    assert_eq!(json["days_window"], 0);
    assert_eq!(json["breakdown"]["pairs"]["count"], 0);
}

#[test]
fn events_stream_as_json_lines() {
    let fx = Fixture::new();
    let out = fx.run("reconcile", &["--events"]);
    assert_eq!(out.status.code(), Some(0));

    let lines: Vec<Value> = String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0]["type"], "RUN_START");
    assert_eq!(lines[0]["bank_rows"], 4);
    assert_eq!(lines[1]["phase"], "one_to_one");
    assert_eq!(lines[1]["count"], 2);
    assert_eq!(lines[5]["type"], "RESULTS_READY");
}

// ---------------------------------------------------------------------------
// summary / details
// ---------------------------------------------------------------------------

#[test]
fn summary_totals() {
    let fx = Fixture::new();
    let out = fx.run("summary", &[]);
    assert_eq!(out.status.code(), Some(0));
    let json = stdout_json(&out);
    assert_eq!(json["bank"]["credit_cents"], 1_008_100_000_i64);
    assert_eq!(json["bank"]["debit_cents"], 1_200);
    assert_eq!(json["ledger"]["expense_cents"], 7_500);
    assert_eq!(json["net_difference_cents"], 6_250);
}

#[test]
fn balance_rows_are_not_left_over() {
    let fx = Fixture::new();
    let bank = format!("{BANK_CSV}30/09/2025;SALDO;SALDO FINAL;5.000,00\n");
    std::fs::write(fx.bank(), bank).unwrap();

    let out = fx.run("summary", &[]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let json = stdout_json(&out);
    assert_eq!(json["bank"]["movements"], 4);
    assert_eq!(json["bank"]["credit_cents"], 1_008_100_000_i64);
    assert_eq!(json["breakdown"]["leftover_bank"]["count"], 1);
    assert_eq!(json["breakdown"]["leftover_bank"]["amount_cents"], -1_200);
    assert_eq!(json["net_difference_cents"], 6_250);

    let out = fx.run("reconcile", &["--events"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let first: Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(first["bank_rows"], 4);
}

#[test]
fn details_respects_limit() {
    let fx = Fixture::new();
    let out = fx.run("details", &["--limit", "1"]);
    assert_eq!(out.status.code(), Some(0));
    let json = stdout_json(&out);
    assert_eq!(json["limit"], 1);
    assert_eq!(json["pairs"]["total"], 2);
    assert_eq!(json["pairs"]["truncated"], true);
    assert_eq!(json["pairs"]["rows"].as_array().unwrap().len(), 1);
    assert_eq!(json["pairs"]["rows"][0]["bank"]["date"], "2025-09-02");
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

#[test]
fn missing_path_is_usage_error() {
    let fx = Fixture::new();
    let out = concilia()
        .args(["reconcile", "--bank"])
        .arg(fx.bank())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn unreadable_file_is_load_error() {
    let fx = Fixture::new();
    let out = concilia()
        .arg("summary")
        .arg("--bank")
        .arg(Path::new("/nonexistent/extracto.xlsx"))
        .arg("--ledger")
        .arg(fx.ledger())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("[io]"));
}

#[test]
fn unsupported_file_is_load_error_with_hint() {
    let fx = Fixture::new();
    let pdf = fx.path("extracto.pdf");
    std::fs::write(&pdf, "%PDF-1.4").unwrap();
    let out = concilia()
        .arg("summary")
        .arg("--bank")
        .arg(&pdf)
        .arg("--ledger")
        .arg(fx.ledger())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("hint:"));
}

#[test]
fn inconsistent_settings_are_config_error() {
    let fx = Fixture::new();
    let settings = fx.path("concilia.toml");
    std::fs::write(&settings, "[matching]\nmax_group_size = 1\n").unwrap();
    let out = fx.run("reconcile", &["--config", settings.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("max_group_size"));
}

#[test]
fn settings_file_is_applied() {
    let fx = Fixture::new();
    let settings = fx.path("concilia.toml");
    std::fs::write(&settings, "[matching]\ndays_window = 0\n").unwrap();
    let out = fx.run("summary", &["--config", settings.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout_json(&out)["breakdown"]["pairs"]["count"], 0);
}

// ---------------------------------------------------------------------------
// sniff
// ---------------------------------------------------------------------------

#[test]
fn sniff_with_roles_reports_consensus() {
    let fx = Fixture::new();
    let out = fx.run("sniff", &[]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let json = stdout_json(&out);
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["kind"], "bank_movements");
    assert_eq!(files[0]["role"], "bank_movements");
    assert_eq!(files[1]["kind"], "ledger");
    assert!(files.iter().all(|f| f["role_error"].is_null()));
    assert_eq!(json["consensus"]["period_from"], "2025-09-02");
    assert_eq!(json["consensus"]["period_to"], "2025-09-20");
}

#[test]
fn sniff_swapped_roles_fail() {
    let fx = Fixture::new();
    let out = concilia()
        .arg("sniff")
        .arg("--bank")
        .arg(fx.ledger())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let json = stdout_json(&out);
    assert!(json["files"][0]["role_error"].as_str().unwrap().contains("ledger"));
    assert!(json.get("consensus").is_none());
}

#[test]
fn sniff_plain_files_and_missing_input() {
    let fx = Fixture::new();
    let out = concilia()
        .arg("sniff")
        .arg(fx.bank())
        .arg(fx.path("missing.xlsx"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    let json = stdout_json(&out);
    assert_eq!(json["files"][0]["kind"], "bank_movements");
    assert_eq!(json["files"][1]["kind"], "unknown");
    assert!(json["files"][1]["error"].is_string());

    let out = concilia().arg("sniff").output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}
