use chrono::NaiveDate;

use concilia_recon::model::{GroupStatus, Origin, RowId, Transaction};
use concilia_recon::report::{DetailsView, PhaseEvent};
use concilia_recon::summary::{summarize, Balances};
use concilia_recon::{run, run_with_observer, MatchConfig};

fn date(s: &str) -> Option<NaiveDate> {
    Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
}

fn ledger(id: u64, d: &str, cents: i64, doc: &str) -> Transaction {
    Transaction::new(RowId(id), Origin::Ledger, date(d), cents, doc)
}

fn bank(id: u64, d: &str, cents: i64, doc: &str) -> Transaction {
    Transaction::new(RowId(id), Origin::Bank, date(d), cents, doc)
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn duplicate_transfers_pair_with_documents_preserved() {
    let l = vec![
        ledger(1, "2025-09-03", 504_000_000, "DI01:6484"),
        ledger(2, "2025-09-03", 504_000_000, "DI01:6485"),
    ];
    let b = vec![
        bank(1, "2025-09-02", 504_000_000, "6209261"),
        bank(2, "2025-09-02", 504_000_000, "6209264"),
    ];
    let result = run(&l, &b, &MatchConfig::default()).unwrap();

    assert_eq!(result.pairs.len(), 2);
    assert!(result.leftover_ledger.is_empty());
    assert!(result.leftover_bank.is_empty());
    assert!(result.approved.is_empty());
    assert!(result.suggested.is_empty());

    let mut docs: Vec<(String, String)> = result
        .pairs
        .iter()
        .map(|p| (p.ledger.document.clone(), p.bank.document.clone()))
        .collect();
    docs.sort();
    // row order breaks the tie: first ledger row takes the first bank row
    assert_eq!(
        docs,
        vec![
            ("DI01:6484".to_string(), "6209261".to_string()),
            ("DI01:6485".to_string(), "6209264".to_string()),
        ]
    );
}

#[test]
fn days_window_boundary() {
    let l = vec![ledger(1, "2025-09-01", 50_000, "x")];
    let b = vec![bank(1, "2025-09-06", 50_000, "y")];

    let five = run(&l, &b, &MatchConfig::default().with_days_window(5)).unwrap();
    assert_eq!(five.pairs.len(), 1);

    let four = run(&l, &b, &MatchConfig::default().with_days_window(4)).unwrap();
    assert!(four.pairs.is_empty());
    assert_eq!(four.leftover_ledger.len(), 1);
    assert_eq!(four.leftover_bank.len(), 1);
}

#[test]
fn group_within_strict_tolerance_is_approved() {
    let l = vec![
        ledger(1, "2025-09-01", 60_000, "a"),
        ledger(2, "2025-09-02", 40_099, "b"),
    ];
    let b = vec![bank(1, "2025-09-03", 100_000, "deposit")];
    let result = run(&l, &b, &MatchConfig::default()).unwrap();

    assert_eq!(result.approved.len(), 1);
    assert!(result.suggested.is_empty());
    let g = &result.approved[0];
    assert_eq!(g.status, GroupStatus::Approved);
    assert_eq!(g.amount_total_cents, 100_099);
    assert_eq!(g.diff_cents, 99);
}

#[test]
fn group_within_lax_tolerance_is_only_suggested() {
    let l = vec![
        ledger(1, "2025-09-01", 60_000, "a"),
        ledger(2, "2025-09-02", 40_300, "b"),
    ];
    let b = vec![bank(1, "2025-09-03", 100_000, "deposit")];
    let result = run(&l, &b, &MatchConfig::default()).unwrap();

    assert!(result.approved.is_empty());
    assert_eq!(result.suggested.len(), 1);
    assert_eq!(result.suggested[0].status, GroupStatus::Suggested);
    assert_eq!(result.suggested[0].diff_cents, 300);
    assert!(result.leftover_ledger.is_empty());
    assert!(result.leftover_bank.is_empty());
}

#[test]
fn zero_amount_rows_are_excluded_everywhere() {
    let l = vec![
        ledger(1, "2025-09-01", 0, "SALDO INICIAL"),
        ledger(2, "2025-09-01", 12_345, "x"),
    ];
    let b = vec![bank(1, "2025-09-01", 0, "marker"), bank(2, "2025-09-30", 999, "y")];
    let result = run(&l, &b, &MatchConfig::default()).unwrap();

    let all_rows = result
        .pairs
        .iter()
        .flat_map(|p| [&p.ledger, &p.bank])
        .chain(result.groups().flat_map(|g| std::iter::once(&g.target).chain(g.components.iter())))
        .chain(result.leftover_bank.iter())
        .chain(result.leftover_ledger.iter());
    for r in all_rows {
        assert_ne!(r.amount_cents, 0, "zero row {} leaked", r.row_id);
    }
    assert_eq!(result.leftover_ledger.len(), 1);
    assert_eq!(result.leftover_bank.len(), 1);
}

#[test]
fn mixed_statement_end_to_end() {
    let l = vec![
        ledger(10, "2025-09-01", 150_000, "REC 1"),
        ledger(11, "2025-09-02", -20_000, "OP 77"),
        ledger(12, "2025-09-03", 35_000, "REC 2"),
        ledger(13, "2025-09-03", 15_000, "REC 3"),
        ledger(14, "2025-09-20", -5_000, "OP 78"),
    ];
    let b = vec![
        bank(20, "2025-09-01", 150_000, "TRF"),
        bank(21, "2025-09-03", -20_000, "DEB"),
        bank(22, "2025-09-04", 50_000, "DEP"),
        bank(23, "2025-09-04", -1_200, "COMISION"),
    ];
    let result = run(&l, &b, &MatchConfig::default()).unwrap();

    assert_eq!(result.pairs.len(), 2);
    assert_eq!(result.approved.len(), 1);
    assert_eq!(result.approved[0].components.len(), 2);
    assert_eq!(result.leftover_ledger.len(), 1);
    assert_eq!(result.leftover_ledger[0].document, "OP 78");
    assert_eq!(result.leftover_bank.len(), 1);
    assert_eq!(result.leftover_bank[0].document, "COMISION");

    let summary = summarize(&l, &b, Balances::default(), Balances::default(), &result, 5);
    assert_eq!(summary.bank.credit_cents, 200_000);
    assert_eq!(summary.bank.debit_cents, 21_200);
    assert_eq!(summary.ledger.income_cents, 200_000);
    assert_eq!(summary.ledger.expense_cents, 25_000);
    assert_eq!(summary.net_difference_cents, 3_800);
    assert_eq!(summary.breakdown.pairs.count, 2);
    assert_eq!(summary.breakdown.pairs.amount_cents, 130_000);
    assert_eq!(summary.breakdown.approved.amount_cents, 50_000);

    let details = DetailsView::from_result(&result, 1);
    assert_eq!(details.pairs.rows.len(), 1);
    assert_eq!(details.pairs.total, 2);
    assert_eq!(details.approved.rows[0].target.date.as_deref(), Some("2025-09-04"));
}

#[test]
fn events_stream_as_json_lines() {
    let l = vec![ledger(1, "2025-09-01", 500, "a")];
    let b = vec![bank(1, "2025-09-01", 500, "b")];
    let mut lines = Vec::new();
    run_with_observer(&l, &b, &MatchConfig::default(), |e: &PhaseEvent| {
        lines.push(serde_json::to_string(e).unwrap());
    })
    .unwrap();

    let types: Vec<String> = lines
        .iter()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        types,
        vec!["RUN_START", "PHASE_DONE", "PHASE_DONE", "PHASE_DONE", "PHASE_DONE", "RESULTS_READY"]
    );
}

#[test]
fn identical_input_identical_output() {
    let l: Vec<Transaction> = (0..30)
        .map(|i| ledger(i, "2025-09-05", 1_000 * (i as i64 % 4 + 1), &format!("L{i}")))
        .collect();
    let b: Vec<Transaction> = (0..20)
        .map(|i| bank(100 + i, "2025-09-06", 2_000 * (i as i64 % 3 + 1), &format!("B{i}")))
        .collect();
    let first = run(&l, &b, &MatchConfig::default()).unwrap();
    let second = run(&l, &b, &MatchConfig::default()).unwrap();
    assert_eq!(first.pairs, second.pairs);
    assert_eq!(first.approved, second.approved);
    assert_eq!(first.suggested, second.suggested);
    assert_eq!(first.leftover_bank, second.leftover_bank);
    assert_eq!(first.leftover_ledger, second.leftover_ledger);
}
