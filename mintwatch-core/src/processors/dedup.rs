//! At-most-once admission of confirmed events.
//!
//! `DedupCache` holds every canonical id that has been admitted for
//! notification, partitioned by source. [`DedupCache::admit`] is the atomic
//! check-and-set: of any number of concurrent admissions for the same key
//! exactly one returns `true`. Admissions are never rolled back.
//!
//! With a [`DedupStore`] attached, the admitted set is written to a JSON file
//! after each admission and read back at startup, so a restart does not
//! re-notify anything that was already admitted.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::events::{CanonicalId, DedupKey, SourceTag};

/// Prefix marking ledger entries in the dedup file. Unprefixed entries are
/// feed ids.
const LEDGER_PREFIX: &str = "ledger:";

/// Escape for feed ids that would otherwise read as prefixed entries.
const API_PREFIX: &str = "api:";

/// Errors raised while reading or writing the dedup file.
#[derive(Debug, Error)]
pub enum DedupStoreError {
    #[error("failed to access dedup file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dedup file: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// DedupStore
// ---------------------------------------------------------------------------

/// Flat JSON list of admitted ids, in admission order.
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the file to `<name>.bad` so a fresh list can take its place.
    /// Returns the new location.
    pub async fn set_aside(&self) -> Result<PathBuf, DedupStoreError> {
        let mut name = self.path.clone().into_os_string();
        name.push(".bad");
        let target = PathBuf::from(name);
        tokio::fs::rename(&self.path, &target).await?;
        Ok(target)
    }

    /// Read the stored keys. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<DedupKey>, DedupStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let entries: Vec<String> = serde_json::from_str(&content)?;
        Ok(entries.iter().filter_map(|e| decode_entry(e)).collect())
    }

    /// Replace the file contents with `keys`.
    ///
    /// Writes a sibling temp file and renames it over the target so a crash
    /// never leaves a truncated list behind.
    pub async fn save(&self, keys: &[DedupKey]) -> Result<(), DedupStoreError> {
        let entries: Vec<String> = keys.iter().map(encode_entry).collect();
        let json = serde_json::to_string(&entries)?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

fn encode_entry(key: &DedupKey) -> String {
    let id = key.id.as_str();
    match key.source {
        SourceTag::Ledger => format!("{LEDGER_PREFIX}{id}"),
        SourceTag::Api if id.starts_with(LEDGER_PREFIX) || id.starts_with(API_PREFIX) => {
            format!("{API_PREFIX}{id}")
        }
        SourceTag::Api => id.to_string(),
    }
}

fn decode_entry(entry: &str) -> Option<DedupKey> {
    let (source, id) = if let Some(mint) = entry.strip_prefix(LEDGER_PREFIX) {
        (SourceTag::Ledger, mint)
    } else if let Some(id) = entry.strip_prefix(API_PREFIX) {
        (SourceTag::Api, id)
    } else {
        (SourceTag::Api, entry)
    };
    Some(DedupKey {
        source,
        id: CanonicalId::new(id)?,
    })
}

// ---------------------------------------------------------------------------
// DedupCache
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Admitted {
    /// Key -> admission sequence number.
    keys: HashMap<DedupKey, u64>,
    next_seq: u64,
}

impl Admitted {
    fn insert(&mut self, key: DedupKey) -> bool {
        if self.keys.contains_key(&key) {
            return false;
        }
        self.keys.insert(key, self.next_seq);
        self.next_seq += 1;
        true
    }
}

pub struct DedupCache {
    admitted: Mutex<Admitted>,
    store: Option<DedupStore>,
    /// Serializes saves so the last write always holds every earlier
    /// admission.
    save_lock: tokio::sync::Mutex<()>,
}

impl DedupCache {
    /// An empty, memory-only cache.
    pub fn in_memory() -> Self {
        Self {
            admitted: Mutex::new(Admitted::default()),
            store: None,
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// An empty cache persisted to `store`. Existing file contents are
    /// ignored and overwritten on the first admission.
    pub fn with_store(store: DedupStore) -> Self {
        Self {
            store: Some(store),
            ..Self::in_memory()
        }
    }

    /// A cache seeded from, and persisted to, `store`.
    pub async fn open(store: DedupStore) -> Result<Self, DedupStoreError> {
        let keys = store.load().await?;
        let mut admitted = Admitted::default();
        for key in keys {
            admitted.insert(key);
        }
        info!(
            path = %store.path().display(),
            entries = admitted.keys.len(),
            "Loaded dedup set"
        );

        Ok(Self {
            admitted: Mutex::new(admitted),
            store: Some(store),
            save_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Whether `key` has not been admitted yet. Advisory only: use
    /// [`admit`](Self::admit) to claim a key.
    pub fn is_new(&self, key: &DedupKey) -> bool {
        !self.lock().keys.contains_key(key)
    }

    /// Admit `key`. Returns `true` if this call admitted it and `false` if it
    /// was already present. Idempotent.
    pub fn admit(&self, key: DedupKey) -> bool {
        self.lock().insert(key)
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All admitted keys in admission order.
    pub fn snapshot(&self) -> Vec<DedupKey> {
        let admitted = self.lock();
        let mut keys: Vec<(&DedupKey, &u64)> = admitted.keys.iter().collect();
        keys.sort_by_key(|(_, seq)| **seq);
        keys.into_iter().map(|(key, _)| key.clone()).collect()
    }

    /// Write the current set to the attached store, if any.
    pub async fn persist(&self) -> Result<(), DedupStoreError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().await;
        let keys = self.snapshot();
        store.save(&keys).await?;
        debug!(entries = keys.len(), "Persisted dedup set");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Admitted> {
        self.admitted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::in_memory()
    }
}
