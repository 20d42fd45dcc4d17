// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use alloy::primitives::Address;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One cached `pair key -> pair address` mapping.
pub type PairEntry = (String, Address);

/// Durable backing for the pool address cache. Loaded once at startup and
/// rewritten in full whenever new pairs were resolved.
pub trait PairStore: Send + Sync {
    fn load(&self) -> Result<Vec<PairEntry>, AppError>;
    fn persist(&self, entries: &[PairEntry]) -> Result<(), AppError>;
}

/// JSON list of `[key, address]` entries, e.g. `data/pairs_goerli.cache`.
#[derive(Clone, Debug)]
pub struct JsonFilePairStore {
    path: PathBuf,
}

impl JsonFilePairStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PairStore for JsonFilePairStore {
    fn load(&self) -> Result<Vec<PairEntry>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            AppError::Persistence(format!("{} read failed: {}", self.path.display(), e))
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(String, String)> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Persistence(format!("{} parse failed: {}", self.path.display(), e))
        })?;

        rows.into_iter()
            .map(|(key, addr)| {
                let pair = Address::from_str(&addr)
                    .map_err(|_| AppError::InvalidAddress(addr.clone()))?;
                Ok((key, pair))
            })
            .collect()
    }

    fn persist(&self, entries: &[PairEntry]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("{} mkdir failed: {}", parent.display(), e))
            })?;
        }
        let rows: Vec<(&str, String)> = entries
            .iter()
            .map(|(key, addr)| (key.as_str(), addr.to_string()))
            .collect();
        let body = serde_json::to_string(&rows)
            .map_err(|e| AppError::Persistence(format!("pair cache encode failed: {}", e)))?;

        // Atomic replace: readers never observe a partial file.
        let tmp = self.path.with_extension("cache.tmp");
        fs::write(&tmp, body).map_err(|e| {
            AppError::Persistence(format!("{} write failed: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::Persistence(format!("{} rename failed: {}", self.path.display(), e))
        })
    }
}

/// Process-local store, used by tests and by runs without a writable data dir.
#[derive(Debug, Default)]
pub struct MemoryPairStore {
    entries: Mutex<Vec<PairEntry>>,
    writes: AtomicUsize,
}

impl MemoryPairStore {
    pub fn with_entries(entries: Vec<PairEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> Vec<PairEntry> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl PairStore for MemoryPairStore {
    fn load(&self) -> Result<Vec<PairEntry>, AppError> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| AppError::Persistence("memory pair store poisoned".into()))
    }

    fn persist(&self, entries: &[PairEntry]) -> Result<(), AppError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| AppError::Persistence("memory pair store poisoned".into()))?;
        *guard = entries.to_vec();
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_store_round_trips_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFilePairStore::new(dir.path().join("nested").join("pairs_goerli.cache"));
        assert!(store.load().expect("load missing").is_empty());

        let entries = vec![
            ("0xAB".to_string(), Address::repeat_byte(0x01)),
            ("0xBA".to_string(), Address::repeat_byte(0x01)),
        ];
        store.persist(&entries).expect("persist");
        assert_eq!(store.load().expect("load"), entries);

        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(raw.starts_with("[[\"0xAB\","));
    }

    #[test]
    fn json_store_rejects_bad_address() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pairs.cache");
        fs::write(&path, r#"[["k","0xnothex"]]"#).expect("write");
        let err = JsonFilePairStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::InvalidAddress(_)));
    }

    #[test]
    fn memory_store_counts_writes() {
        let store = MemoryPairStore::default();
        store
            .persist(&[("k".to_string(), Address::ZERO)])
            .expect("persist");
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.load().expect("load").len(), 1);
    }
}
