//! Durable per-tag bookkeeping
//!
//! One [`TagRecord`] per mirrored tag, keyed by tag name. The file-backed
//! store keeps the whole table in a single JSON document and rewrites it
//! atomically on every upsert, so a crash mid-cycle loses at most the
//! in-flight tag's write.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::{debug, trace};

/// Current on-disk format version
const STATE_FORMAT_VERSION: u32 = 1;

/// Persisted state for one upstream tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    /// Digest of the last successfully built manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_built_at: Option<DateTime<Utc>>,
}

impl TagRecord {
    /// Record for a build that succeeded for `digest`
    pub fn built(name: impl Into<String>, digest: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            digest: Some(digest.into()),
            updated_at: at,
            last_built_at: Some(at),
        }
    }

    /// Bookkeeping after a failed build: everything from `previous` is kept
    /// except `updated_at`.
    pub fn failed(name: impl Into<String>, previous: Option<&TagRecord>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            digest: previous.and_then(|r| r.digest.clone()),
            updated_at: at,
            last_built_at: previous.and_then(|r| r.last_built_at),
        }
    }

    /// True when this record already reflects `digest`
    pub fn matches_digest(&self, digest: &str) -> bool {
        self.digest.as_deref() == Some(digest)
    }
}

/// Key-value persistence for [`TagRecord`]s
pub trait StateStore: Send + Sync {
    /// Point lookup by tag name
    fn get(&self, tag: &str) -> Result<Option<TagRecord>>;

    /// Insert or replace the record for `record.name`. Must be durable when
    /// this returns.
    fn upsert(&mut self, record: TagRecord) -> Result<()>;

    /// All records, ordered by tag name
    fn records(&self) -> Result<Vec<TagRecord>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    tags: BTreeMap<String, TagRecord>,
}

/// [`StateStore`] backed by a JSON file
#[derive(Debug)]
pub struct FileStateStore {
    path: Utf8PathBuf,
    records: BTreeMap<String, TagRecord>,
}

impl FileStateStore {
    /// Open the store at `path`, creating parent directories. A missing file
    /// is an empty store.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                let doc: StateDocument = serde_json::from_str(&content)?;
                if doc.version > STATE_FORMAT_VERSION {
                    return Err(Error::invalid_config(format!(
                        "State file {} has format version {}, newer than supported {}",
                        path, doc.version, STATE_FORMAT_VERSION
                    )));
                }
                doc.tags
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened state store {} ({} records)", path, records.len());
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lock_path(&self) -> Utf8PathBuf {
        self.path.with_extension("lock")
    }

    /// Write `records` to a temp file and rename it over the state file
    fn persist(&self, records: &BTreeMap<String, TagRecord>) -> Result<()> {
        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        // Released when `lock_file` is dropped
        lock_file.lock_exclusive().map_err(|e| Error::StateLock {
            path: lock_path.to_string(),
            source: e,
        })?;

        let doc = StateDocument {
            version: STATE_FORMAT_VERSION,
            tags: records.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut temp_file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)?;
            temp_file.write_all(json.as_bytes())?;
            temp_file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        trace!("Persisted {} records to {}", records.len(), self.path);
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, tag: &str) -> Result<Option<TagRecord>> {
        Ok(self.records.get(tag).cloned())
    }

    fn upsert(&mut self, record: TagRecord) -> Result<()> {
        let mut next = self.records.clone();
        next.insert(record.name.clone(), record);

        // Only adopt the new table once it is on disk
        self.persist(&next)?;
        self.records = next;
        Ok(())
    }

    fn records(&self) -> Result<Vec<TagRecord>> {
        Ok(self.records.values().cloned().collect())
    }
}
