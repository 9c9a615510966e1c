//! `concilia-recon`: bank statement vs. ledger reconciliation engine.
//!
//! Pure engine crate: receives canonical transaction tables, returns the
//! partition into pairs, groups and leftovers. No file I/O.

pub mod config;
pub mod engine;
pub mod error;
pub mod groups;
pub mod matcher;
pub mod model;
pub mod report;
pub mod summary;

pub use config::MatchConfig;
pub use engine::{run, run_with_observer};
pub use error::ReconError;
pub use model::{Origin, ReconciliationResult, RowId, Transaction};
