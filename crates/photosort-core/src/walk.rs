use std::fs::Metadata;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::media::{MediaFile, MediaKind};

/// Files the engine writes into a target root and must not treat as media.
const INTERNAL_PREFIX: &str = ".photosort-cache";

/// Enumerate regular files under a root in a stable, sorted order.
/// Symlinks are not followed; unreadable subtrees are skipped with a
/// warning. An unreadable root is the one fatal case.
pub fn walk_media(root: &Path) -> anyhow::Result<Vec<MediaFile>> {
    anyhow::ensure!(
        root.is_dir(),
        "not a readable directory: {}",
        root.display()
    );

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                log::warn!("skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with(INTERNAL_PREFIX) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                log::warn!("skipping {}: {}", entry.path().display(), err);
                continue;
            }
        };
        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };
        let kind = MediaKind::of(entry.path());
        files.push(MediaFile {
            path: entry.into_path(),
            relative,
            kind,
            size: meta.len(),
            mod_time_millis: mtime_millis(&meta),
        });
    }
    Ok(files)
}

/// Modification time in milliseconds since the epoch, 0 when unreadable.
pub fn mtime_millis(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Stat a path for its mtime in milliseconds.
pub fn mtime_millis_of(path: &Path) -> i64 {
    std::fs::metadata(path).map(|m| mtime_millis(&m)).unwrap_or(0)
}

/// Relative path of `path` under `root`, falling back to the filename.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_sorted_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("sub/c.jpg"), b"c").unwrap();

        let files = walk_media(dir.path()).unwrap();
        let rels: Vec<_> = files
            .iter()
            .map(|f| f.relative.to_string_lossy().into_owned())
            .collect();
        assert_eq!(rels, vec!["a.jpg", "b.jpg", "sub/c.jpg"]);
    }

    #[test]
    fn test_walk_hides_cache_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".photosort-cache.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();

        let files = walk_media(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name(), "a.jpg");
    }

    #[test]
    fn test_walk_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(walk_media(&dir.path().join("nope")).is_err());
    }
}
