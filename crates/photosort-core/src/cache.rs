use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::media::MediaFile;

/// Current cache snapshot format version
const CACHE_VERSION: u32 = 1;

/// Snapshot filename inside the target root
pub const CACHE_FILENAME: &str = ".photosort-cache.json";

const CACHE_TEMP_FILENAME: &str = ".photosort-cache.tmp";

/// One cached fingerprint, valid only while `mod_time_millis` still
/// matches the file's modification time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub mod_time_millis: i64,
}

/// On-disk snapshot. Paths are stored relative to the target root so
/// the snapshot survives the collection being moved wholesale.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    updated_at: DateTime<Utc>,
    entries: Vec<(PathBuf, CacheEntry)>,
}

/// Result of comparing the cache against the files currently on disk.
#[derive(Debug, Default)]
pub struct Reconciled {
    /// Entries still valid, in input order.
    pub valid: Vec<(PathBuf, Fingerprint)>,
    /// Relative paths that need re-hashing (new, changed, or touched).
    pub stale: Vec<PathBuf>,
}

/// Persistent fingerprint cache for one target tree.
///
/// Strictly an optimization: a missing, corrupt, or future-version
/// snapshot is a cold start, never an error.
#[derive(Debug)]
pub struct FingerprintCache {
    root: PathBuf,
    entries: HashMap<PathBuf, CacheEntry>,
}

impl FingerprintCache {
    /// Load the snapshot for a target root, empty on any failure.
    pub fn load(root: &Path) -> Self {
        let entries = read_snapshot(&root.join(CACHE_FILENAME))
            .map(|s| s.entries.into_iter().collect())
            .unwrap_or_default();
        Self {
            root: root.to_path_buf(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split the current file set into cache hits and files needing a
    /// re-hash. A stored mtime that no longer matches invalidates the
    /// entry; so does absence from the cache.
    pub fn reconcile(&self, current: &[MediaFile]) -> Reconciled {
        let mut out = Reconciled::default();
        for file in current {
            match self.entries.get(&file.relative) {
                Some(entry) if entry.mod_time_millis == file.mod_time_millis => {
                    out.valid
                        .push((file.relative.clone(), entry.fingerprint.clone()));
                }
                _ => out.stale.push(file.relative.clone()),
            }
        }
        out
    }

    /// Add or update entries for freshly hashed files and drop entries
    /// whose path is no longer present on disk.
    pub fn merge_entries(
        &mut self,
        new_entries: impl IntoIterator<Item = (PathBuf, CacheEntry)>,
        current_paths: &HashSet<PathBuf>,
    ) {
        for (path, entry) in new_entries {
            self.entries.insert(path, entry);
        }
        self.entries.retain(|path, _| current_paths.contains(path));
    }

    /// Record a single entry (used as files are copied into the target).
    pub fn insert(&mut self, relative: PathBuf, entry: CacheEntry) {
        self.entries.insert(relative, entry);
    }

    /// Write the snapshot atomically: temp file first, then rename, so
    /// a partial write never clobbers the previous snapshot.
    pub fn persist(&self) -> anyhow::Result<()> {
        let mut entries: Vec<(PathBuf, CacheEntry)> = self
            .entries
            .iter()
            .map(|(p, e)| (p.clone(), e.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let snapshot = Snapshot {
            version: CACHE_VERSION,
            updated_at: Utc::now(),
            entries,
        };

        let temp_path = self.root.join(CACHE_TEMP_FILENAME);
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        // Surface buffered write errors before renaming; a truncated
        // temp file must never replace the previous snapshot.
        writer.into_inner()?;
        fs::rename(&temp_path, self.root.join(CACHE_FILENAME))?;
        Ok(())
    }

    /// Delete the snapshot, forcing a full rebuild on the next run.
    pub fn invalidate(root: &Path) -> anyhow::Result<()> {
        let path = root.join(CACHE_FILENAME);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Read and validate a snapshot. The version is probed from a generic
/// JSON value first so an unknown future schema reads as "no cache"
/// rather than a parse error.
fn read_snapshot(path: &Path) -> Option<Snapshot> {
    let file = File::open(path).ok()?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file)).ok()?;
    if value.get("version").and_then(|v| v.as_u64()) != Some(CACHE_VERSION as u64) {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    fn entry(fp: &str, mtime: i64) -> CacheEntry {
        CacheEntry {
            fingerprint: Fingerprint::from(fp),
            mod_time_millis: mtime,
        }
    }

    fn media(relative: &str, mtime: i64) -> MediaFile {
        MediaFile {
            path: PathBuf::from("/target").join(relative),
            relative: PathBuf::from(relative),
            kind: MediaKind::Image,
            size: 1,
            mod_time_millis: mtime,
        }
    }

    #[test]
    fn test_load_absent_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FingerprintCache::load(dir.path()).is_empty());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path());
        cache.insert(PathBuf::from("a.jpg"), entry("10-no-exif", 1000));
        cache.insert(PathBuf::from("b.jpg"), entry("20-no-exif", 2000));
        cache.persist().unwrap();

        let reloaded = FingerprintCache::load(dir.path());
        assert_eq!(reloaded.len(), 2);
        assert!(!dir.path().join(CACHE_TEMP_FILENAME).exists());
    }

    #[test]
    fn test_failed_persist_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path());
        cache.insert(PathBuf::from("a.jpg"), entry("10-no-exif", 1000));
        cache.persist().unwrap();

        // A directory squatting on the temp path makes the next write fail
        fs::create_dir(dir.path().join(CACHE_TEMP_FILENAME)).unwrap();
        cache.insert(PathBuf::from("b.jpg"), entry("20-no-exif", 2000));
        assert!(cache.persist().is_err());

        let reloaded = FingerprintCache::load(dir.path());
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_corrupt_snapshot_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CACHE_FILENAME), b"{ not json").unwrap();
        assert!(FingerprintCache::load(dir.path()).is_empty());
    }

    #[test]
    fn test_future_version_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CACHE_FILENAME),
            br#"{"version": 99, "updated_at": "2031-01-01T00:00:00Z", "entries": [], "shiny": true}"#,
        )
        .unwrap();
        assert!(FingerprintCache::load(dir.path()).is_empty());
    }

    #[test]
    fn test_reconcile_splits_valid_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path());
        cache.insert(PathBuf::from("same.jpg"), entry("10-no-exif", 1000));
        cache.insert(PathBuf::from("touched.jpg"), entry("20-no-exif", 2000));

        let files = [
            media("same.jpg", 1000),
            media("touched.jpg", 2001),
            media("new.jpg", 3000),
        ];
        let rec = cache.reconcile(&files);

        assert_eq!(rec.valid.len(), 1);
        assert_eq!(rec.valid[0].0, PathBuf::from("same.jpg"));
        assert_eq!(
            rec.stale,
            vec![PathBuf::from("touched.jpg"), PathBuf::from("new.jpg")]
        );
    }

    #[test]
    fn test_merge_entries_prunes_vanished_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path());
        cache.insert(PathBuf::from("kept.jpg"), entry("10-no-exif", 1000));
        cache.insert(PathBuf::from("deleted.jpg"), entry("20-no-exif", 2000));

        let current: HashSet<PathBuf> =
            [PathBuf::from("kept.jpg"), PathBuf::from("added.jpg")].into();
        cache.merge_entries(
            [(PathBuf::from("added.jpg"), entry("30-no-exif", 3000))],
            &current,
        );

        assert_eq!(cache.len(), 2);
        let rec = cache.reconcile(&[media("deleted.jpg", 2000)]);
        assert_eq!(rec.stale, vec![PathBuf::from("deleted.jpg")]);
    }

    #[test]
    fn test_invalidate_deletes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = FingerprintCache::load(dir.path());
        cache.insert(PathBuf::from("a.jpg"), entry("10-no-exif", 1000));
        cache.persist().unwrap();
        assert!(dir.path().join(CACHE_FILENAME).exists());

        FingerprintCache::invalidate(dir.path()).unwrap();
        assert!(!dir.path().join(CACHE_FILENAME).exists());
        // Invalidating twice is fine
        FingerprintCache::invalidate(dir.path()).unwrap();
    }
}
