use thiserror::Error;

use crate::model::{Origin, RowId};

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Inconsistent matching parameters.
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// The same row id appears twice in one input table.
    #[error("{origin} table: duplicate row id {row_id}")]
    DuplicateRowId { origin: Origin, row_id: RowId },

    /// A row was handed to the wrong side of the pipeline.
    #[error("row {row_id} has origin {found}, expected {expected}")]
    OriginMismatch { row_id: RowId, expected: Origin, found: Origin },

    /// A row is missing from, or repeated in, the final partition.
    #[error("closure violated: {0}")]
    ClosureViolation(String),
}

impl ReconError {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "config_parse",
            Self::ConfigValidation(_) => "config_invalid",
            Self::DuplicateRowId { .. } => "duplicate_row_id",
            Self::OriginMismatch { .. } => "origin_mismatch",
            Self::ClosureViolation(_) => "closure_violation",
        }
    }
}
