//! Parse cache keyed by file identity.
//!
//! A key is `(kind, canonical path, mtime, size)`. Each key owns a slot with
//! its own lock, so concurrent requests for the same file parse it once and
//! the rest wait for that result. Storing a new identity for a path evicts
//! the stale ones. Failed loads are not cached.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::error::LoadError;
use crate::loader::{self, LoadedTable, TableKind};

/// What a file looked like when it was parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub size: u64,
}

impl FileIdentity {
    pub fn of(path: &Path) -> Result<Self, LoadError> {
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = std::fs::canonicalize(path).map_err(io_err)?;
        let meta = std::fs::metadata(&canonical).map_err(io_err)?;
        Ok(Self {
            path: canonical,
            modified: meta.modified().ok(),
            size: meta.len(),
        })
    }
}

type CacheKey = (TableKind, FileIdentity);
type Slot = Arc<Mutex<Option<Arc<LoadedTable>>>>;

#[derive(Debug, Default)]
struct Slots {
    map: HashMap<CacheKey, Slot>,
    /// Insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

impl Slots {
    fn remove_where(&mut self, pred: impl Fn(&CacheKey) -> bool) {
        self.map.retain(|k, _| !pred(k));
        self.order.retain(|k| !pred(k));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub loads: u64,
}

#[derive(Debug, Default)]
pub struct TableCache {
    slots: Mutex<Slots>,
    capacity: Option<usize>,
    hits: AtomicU64,
    loads: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` tables; the oldest entry goes first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Load `path` as `kind`, or return a copy of the table parsed earlier
    /// from the same unchanged file.
    pub fn get_or_load(&self, kind: TableKind, path: &Path) -> Result<LoadedTable, LoadError> {
        self.get_or_load_with(kind, path, loader::load)
    }

    /// [`get_or_load`](Self::get_or_load) with a caller-supplied parser.
    pub fn get_or_load_with<F>(
        &self,
        kind: TableKind,
        path: &Path,
        load: F,
    ) -> Result<LoadedTable, LoadError>
    where
        F: FnOnce(TableKind, &Path) -> Result<LoadedTable, LoadError>,
    {
        let key = (kind, FileIdentity::of(path)?);
        let slot = self.slot_for(&key);

        let mut guard = lock(&slot);
        if let Some(table) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %key.1.path.display(), kind = %kind, "table cache hit");
            return Ok(LoadedTable::clone(table));
        }

        self.loads.fetch_add(1, Ordering::Relaxed);
        match load(kind, &key.1.path) {
            Ok(table) => {
                let table = Arc::new(table);
                *guard = Some(Arc::clone(&table));
                Ok(LoadedTable::clone(&table))
            }
            Err(e) => {
                drop(guard);
                let mut slots = lock(&self.slots);
                if slots.map.get(&key).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    slots.remove_where(|k| *k == key);
                }
                Err(e)
            }
        }
    }

    fn slot_for(&self, key: &CacheKey) -> Slot {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.map.get(key) {
            return Arc::clone(slot);
        }

        let (kind, identity) = key;
        slots.remove_where(|(k, id)| k == kind && id.path == identity.path);

        let slot = Slot::default();
        slots.map.insert(key.clone(), Arc::clone(&slot));
        slots.order.push_back(key.clone());

        if let Some(capacity) = self.capacity {
            while slots.map.len() > capacity {
                let Some(oldest) = slots.order.pop_front() else {
                    break;
                };
                slots.map.remove(&oldest);
            }
        }
        slot
    }

    /// Drop every entry for `path`, whatever its kind or identity.
    pub fn invalidate(&self, path: &Path) {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        lock(&self.slots).remove_where(|(_, id)| id.path == canonical);
    }

    pub fn clear(&self) {
        let mut slots = lock(&self.slots);
        slots.map.clear();
        slots.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: lock(&self.slots).map.len(),
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::time::Duration;

    const BANK_CSV: &str = "Fecha;Detalle;Importe\n01/09/2025;a;100,00\n02/09/2025;b;-5,00\n";

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn second_load_is_a_hit_with_same_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "extracto.csv", BANK_CSV);
        let cache = TableCache::new();

        let a = cache.get_or_load(TableKind::Bank, &path).unwrap();
        let b = cache.get_or_load(TableKind::Bank, &path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rows.len(), 2);
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                loads: 1
            }
        );
    }

    #[test]
    fn kind_is_part_of_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "x.csv", BANK_CSV);
        let cache = TableCache::new();
        cache.get_or_load(TableKind::Bank, &path).unwrap();
        cache.get_or_load(TableKind::Ledger, &path).unwrap();
        assert_eq!(cache.stats().loads, 2);
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn changed_file_reloads_and_evicts_stale_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "extracto.csv", BANK_CSV);
        let cache = TableCache::new();
        cache.get_or_load(TableKind::Bank, &path).unwrap();

        write(&dir, "extracto.csv", &format!("{BANK_CSV}03/09/2025;c;7,00\n"));
        let t = cache.get_or_load(TableKind::Bank, &path).unwrap();
        assert_eq!(t.rows.len(), 3);
        assert_eq!(cache.stats().loads, 2);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "extracto.csv", BANK_CSV);
        let cache = TableCache::new();

        let err = cache
            .get_or_load_with(TableKind::Bank, &path, |_, p| {
                Err(LoadError::NoRows { path: p.to_path_buf() })
            })
            .unwrap_err();
        assert_eq!(err.reason(), "no_rows");
        assert_eq!(cache.stats().entries, 0);

        cache.get_or_load(TableKind::Bank, &path).unwrap();
        assert_eq!(cache.stats().loads, 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let cache = TableCache::new();
        let err = cache
            .get_or_load(TableKind::Ledger, Path::new("/nonexistent/contable.xlsx"))
            .unwrap_err();
        assert_eq!(err.reason(), "io");
    }

    #[test]
    fn concurrent_requests_parse_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "extracto.csv", BANK_CSV);
        let cache = TableCache::new();
        let parses = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let t = cache
                        .get_or_load_with(TableKind::Bank, &path, |kind, p| {
                            parses.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(50));
                            loader::load(kind, p)
                        })
                        .unwrap();
                    assert_eq!(t.rows.len(), 2);
                });
            }
        });

        assert_eq!(parses.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 7);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.csv", BANK_CSV);
        let b = write(&dir, "b.csv", BANK_CSV);
        let cache = TableCache::with_capacity(1);

        cache.get_or_load(TableKind::Bank, &a).unwrap();
        cache.get_or_load(TableKind::Bank, &b).unwrap();
        assert_eq!(cache.stats().entries, 1);

        cache.get_or_load(TableKind::Bank, &a).unwrap();
        assert_eq!(cache.stats().loads, 3);
    }

    #[test]
    fn invalidate_drops_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.csv", BANK_CSV);
        let cache = TableCache::new();
        cache.get_or_load(TableKind::Bank, &path).unwrap();
        cache.invalidate(&path);
        assert_eq!(cache.stats().entries, 0);
        cache.get_or_load(TableKind::Bank, &path).unwrap();
        assert_eq!(cache.stats().loads, 2);
    }
}
