// File I/O: spreadsheet reading, layout sniffing, ledger/bank loaders

pub mod cache;
pub mod error;
pub mod grid;
pub mod loader;
pub mod normalize;
pub mod sniff;

pub use cache::TableCache;
pub use error::LoadError;
pub use grid::{read_grid, Grid};
pub use loader::{load_bank, load_ledger, LoadedTable, TableKind};
pub use sniff::{sniff_file, sniff_path, DocumentKind, SniffConfig, SniffReport};
