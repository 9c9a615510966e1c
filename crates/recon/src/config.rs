use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::GroupStatus;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Matching parameters. Every field has a default, so an empty TOML table is a
/// valid config.
///
/// The group search is exponential in the candidate count; `max_candidates`
/// and `max_group_size` bound the work per target, and `max_nodes` is a hard
/// stop on top of both.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Maximum whole-day distance between matched rows.
    pub days_window: u32,
    /// Group tolerance for the approved pass (cents).
    pub strict_tolerance_cents: i64,
    /// Group tolerance for the suggested pass (cents).
    pub lax_tolerance_cents: i64,
    pub approved_min_group_size: usize,
    pub suggested_min_group_size: usize,
    pub max_group_size: usize,
    /// Candidates kept per target after sorting by descending magnitude.
    pub max_candidates: usize,
    /// DFS node budget per target.
    pub max_nodes: u64,
    /// Also search one-ledger-row-to-many-bank-rows groups.
    pub bidirectional_groups: bool,
}

pub const DEFAULT_DAYS_WINDOW: u32 = 5;

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            days_window: DEFAULT_DAYS_WINDOW,
            strict_tolerance_cents: 100,
            lax_tolerance_cents: 500,
            approved_min_group_size: 2,
            suggested_min_group_size: 1,
            max_group_size: 6,
            max_candidates: 20,
            max_nodes: 250_000,
            bidirectional_groups: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Group pass
// ---------------------------------------------------------------------------

/// Parameters for one run of the group search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPass {
    pub days_window: u32,
    pub tolerance_cents: i64,
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub max_candidates: usize,
    pub max_nodes: u64,
    pub status: GroupStatus,
}

impl MatchConfig {
    pub fn approved_pass(&self) -> GroupPass {
        GroupPass {
            days_window: self.days_window,
            tolerance_cents: self.strict_tolerance_cents,
            min_group_size: self.approved_min_group_size,
            max_group_size: self.max_group_size,
            max_candidates: self.max_candidates,
            max_nodes: self.max_nodes,
            status: GroupStatus::Approved,
        }
    }

    pub fn suggested_pass(&self) -> GroupPass {
        GroupPass {
            days_window: self.days_window,
            tolerance_cents: self.lax_tolerance_cents,
            min_group_size: self.suggested_min_group_size,
            max_group_size: self.max_group_size,
            max_candidates: self.max_candidates,
            max_nodes: self.max_nodes,
            status: GroupStatus::Suggested,
        }
    }

    pub fn with_days_window(mut self, days_window: u32) -> Self {
        self.days_window = days_window;
        self
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.strict_tolerance_cents < 0 || self.lax_tolerance_cents < 0 {
            return Err(ReconError::ConfigValidation(
                "tolerances must not be negative".into(),
            ));
        }
        if self.lax_tolerance_cents < self.strict_tolerance_cents {
            return Err(ReconError::ConfigValidation(format!(
                "lax tolerance ({}) is tighter than strict tolerance ({})",
                self.lax_tolerance_cents, self.strict_tolerance_cents
            )));
        }
        for (name, min) in [
            ("approved_min_group_size", self.approved_min_group_size),
            ("suggested_min_group_size", self.suggested_min_group_size),
        ] {
            if min == 0 {
                return Err(ReconError::ConfigValidation(format!("{name} must be at least 1")));
            }
            if min > self.max_group_size {
                return Err(ReconError::ConfigValidation(format!(
                    "{name} ({min}) exceeds max_group_size ({})",
                    self.max_group_size
                )));
            }
        }
        if self.max_candidates == 0 {
            return Err(ReconError::ConfigValidation(
                "max_candidates must be at least 1".into(),
            ));
        }
        if self.max_nodes == 0 {
            return Err(ReconError::ConfigValidation("max_nodes must be at least 1".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
