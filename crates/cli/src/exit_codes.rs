//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Scripts rely on them; do not renumber.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments, missing file path)       |
//! | 3    | A file could not be loaded (unreadable, no rows)     |
//! | 4    | Invalid configuration                                |
//! | 5    | Engine failure (rejected input, closure violation)   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
/// Same code clap uses for its own parse errors.
pub const EXIT_USAGE: u8 = 2;

/// Structural load failure for one of the input files.
pub const EXIT_LOAD: u8 = 3;

/// Settings file unreadable, malformed or inconsistent.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// The engine rejected the input or broke an invariant.
pub const EXIT_ENGINE: u8 = 5;
