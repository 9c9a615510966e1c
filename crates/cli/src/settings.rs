//! `--config` settings file.
//!
//! ```toml
//! [matching]
//! days_window = 3
//! strict_tolerance_cents = 100
//!
//! [sniff]
//! preview_rows = 5
//! ```

use std::path::Path;

use serde::Deserialize;

use concilia_io::SniffConfig;
use concilia_recon::MatchConfig;

use crate::exit_codes::EXIT_INVALID_CONFIG;
use crate::CliError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub matching: MatchConfig,
    pub sniff: SniffConfig,
}

impl Settings {
    pub fn from_toml(input: &str) -> Result<Self, CliError> {
        let settings: Settings = toml::from_str(input).map_err(|e| {
            CliError::new(EXIT_INVALID_CONFIG, format!("invalid settings: {e}"))
        })?;
        settings
            .matching
            .validate()
            .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, e.to_string()))?;
        Ok(settings)
    }

    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let input = std::fs::read_to_string(path).map_err(|e| {
            CliError::new(EXIT_INVALID_CONFIG, format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&input)
    }

    /// `--days-window` wins over the file.
    pub fn matching_with(&self, days_window: Option<u32>) -> MatchConfig {
        match days_window {
            Some(days) => self.matching.clone().with_days_window(days),
            None => self.matching.clone(),
        }
    }
}
