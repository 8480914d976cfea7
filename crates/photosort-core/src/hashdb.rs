use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::cache::{CacheEntry, FingerprintCache};
use crate::fingerprint::{self, Fingerprint};
use crate::media::MediaFile;
use crate::ThrottledProgress;

/// Mapping from fingerprint to one representative path within a tree.
/// First-seen wins within a build pass.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    by_fingerprint: HashMap<Fingerprint, PathBuf>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.by_fingerprint.contains_key(fp)
    }

    pub fn get(&self, fp: &Fingerprint) -> Option<&Path> {
        self.by_fingerprint.get(fp).map(|p| p.as_path())
    }

    /// Register a representative unless the fingerprint is already known.
    pub fn insert_first(&mut self, fp: Fingerprint, path: PathBuf) {
        self.by_fingerprint.entry(fp).or_insert(path);
    }
}

/// Output of one build pass over a tree.
pub struct BuildResult {
    pub index: FingerprintIndex,
    /// Per-file fingerprints aligned with the input order.
    /// None marks an unfingerprintable file.
    pub fingerprints: Vec<Option<Fingerprint>>,
    pub warnings: Vec<String>,
}

/// Build the fingerprint index for an enumerated tree.
///
/// With a cache (target trees) only stale files are hashed and the
/// cache is updated in place afterward; without one (source trees)
/// every file is hashed. Hashing runs on the rayon pool; results are
/// collected in input order so the first-seen-wins rule stays
/// deterministic. Unfingerprintable files are dropped from the index
/// with a warning, never an error.
pub fn build_index(
    files: &[MediaFile],
    cache: Option<&mut FingerprintCache>,
    stage: &str,
    progress: &ThrottledProgress,
) -> BuildResult {
    let cached: HashMap<PathBuf, Fingerprint> = match &cache {
        Some(c) => c.reconcile(files).valid.into_iter().collect(),
        None => HashMap::new(),
    };

    let to_hash: Vec<usize> = files
        .iter()
        .enumerate()
        .filter(|(_, f)| !cached.contains_key(&f.relative))
        .map(|(i, _)| i)
        .collect();

    let total = to_hash.len() as u64;
    let counter = AtomicU64::new(0);
    let hashed: Vec<(usize, Option<Fingerprint>)> = to_hash
        .par_iter()
        .map(|&i| {
            let f = &files[i];
            let fp = fingerprint::fingerprint(&f.path, f.kind, f.size);
            let current = counter.fetch_add(1, Ordering::Relaxed);
            progress.report(stage, current, total, "Fingerprinting files");
            (i, fp)
        })
        .collect();

    let mut fingerprints: Vec<Option<Fingerprint>> = files
        .iter()
        .map(|f| cached.get(&f.relative).cloned())
        .collect();
    for (i, fp) in hashed {
        fingerprints[i] = fp;
    }

    let mut index = FingerprintIndex::new();
    let mut warnings = Vec::new();
    for (file, fp) in files.iter().zip(fingerprints.iter()) {
        match fp {
            Some(fp) => index.insert_first(fp.clone(), file.path.clone()),
            None => {
                let msg = format!("cannot fingerprint {}, excluded from dedup", file.path.display());
                log::warn!("{}", msg);
                warnings.push(msg);
            }
        }
    }

    if let Some(cache) = cache {
        let new_entries = files.iter().zip(fingerprints.iter()).filter_map(|(f, fp)| {
            fp.as_ref().map(|fp| {
                (
                    f.relative.clone(),
                    CacheEntry {
                        fingerprint: fp.clone(),
                        mod_time_millis: f.mod_time_millis,
                    },
                )
            })
        });
        let current_paths = files.iter().map(|f| f.relative.clone()).collect();
        cache.merge_entries(new_entries, &current_paths);
    }

    BuildResult {
        index,
        fingerprints,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk;

    fn silent() -> &'static crate::ProgressCallback {
        &|_, _, _, _| {}
    }

    #[test]
    fn test_build_without_cache_hashes_everything() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"aaaa").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"bbbbbb").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let files = walk::walk_media(dir.path()).unwrap();
        let tp = ThrottledProgress::new(silent());
        let result = build_index(&files, None, "hash", &tp);

        // Two images indexed, the text file dropped with a warning
        assert_eq!(result.index.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.index.contains(&Fingerprint::from("4-no-exif")));
        assert!(result.index.contains(&Fingerprint::from("6-no-exif")));
    }

    #[test]
    fn test_first_seen_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"same").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"same").unwrap();

        let files = walk::walk_media(dir.path()).unwrap();
        let tp = ThrottledProgress::new(silent());
        let result = build_index(&files, None, "hash", &tp);

        assert_eq!(result.index.len(), 1);
        let rep = result.index.get(&Fingerprint::from("4-no-exif")).unwrap();
        assert_eq!(rep.file_name().unwrap(), "a.jpg");
    }

    #[test]
    fn test_cache_reuse_and_touch_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"aaaa").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"bbbbbb").unwrap();

        let files = walk::walk_media(dir.path()).unwrap();
        let tp = ThrottledProgress::new(silent());

        let mut cache = FingerprintCache::load(dir.path());
        let first = build_index(&files, Some(&mut cache), "hash", &tp);
        cache.persist().unwrap();

        // Touch one file: different mtime, same content
        let touched = dir.path().join("a.jpg");
        filetime::set_file_mtime(&touched, filetime::FileTime::from_unix_time(1_700_000_000, 0))
            .unwrap();

        let files = walk::walk_media(dir.path()).unwrap();
        let mut cache = FingerprintCache::load(dir.path());
        assert_eq!(cache.reconcile(&files).stale.len(), 1);

        let second = build_index(&files, Some(&mut cache), "hash", &tp);
        // Fingerprint unchanged despite the re-hash
        assert_eq!(first.fingerprints, second.fingerprints);
    }
}
