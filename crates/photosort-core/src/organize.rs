use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::date;
use crate::media::MediaKind;
use crate::plan;
use crate::walk;
use crate::ThrottledProgress;

/// Outcome of one organize run.
#[derive(Debug, Default)]
pub struct OrganizeReport {
    pub moved: u64,
    pub already_in_place: u64,
    pub dateless: u64,
    /// Non-media files left untouched.
    pub unrecognized: u64,
    pub errors: u64,
    pub warnings: Vec<String>,
}

/// Relocate dated media under `root` into `YYYY/MM/YYYY-MM-DD_NNN.ext`.
///
/// Files without a resolvable date are left where they are and counted.
/// Files already named and placed correctly are not renumbered, so the
/// operation is idempotent. The moved file's mtime is set to the
/// resolved date.
pub fn organize(root: &Path, progress: &ThrottledProgress) -> anyhow::Result<OrganizeReport> {
    let files = walk::walk_media(root)?;
    let mut report = OrganizeReport::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut created_dirs: HashSet<PathBuf> = HashSet::new();

    let total = files.len() as u64;
    for (i, file) in files.iter().enumerate() {
        progress.report("organize", i as u64, total, "Organizing by date");

        if file.kind == MediaKind::Unrecognized {
            report.unrecognized += 1;
            continue;
        }

        let Some(dt) = date::resolve(&file.path, file.kind) else {
            report.dateless += 1;
            continue;
        };
        let day = dt.format("%Y-%m-%d").to_string();
        let sub_dir = root
            .join(dt.format("%Y").to_string())
            .join(dt.format("%m").to_string());

        // Correctly named and placed already: leave it, don't renumber.
        let stem = file.path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if file.path.parent() == Some(sub_dir.as_path())
            && plan::parse_dated_stem(stem).map_or(false, |(d, _)| d == day)
        {
            claimed.insert(file.path.clone());
            report.already_in_place += 1;
            continue;
        }

        if !created_dirs.contains(&sub_dir) {
            if let Err(err) = fs::create_dir_all(&sub_dir) {
                report.errors += 1;
                report
                    .warnings
                    .push(format!("{}: {}", file.path.display(), err));
                continue;
            }
            created_dirs.insert(sub_dir.clone());
        }

        let ext = file.path.extension().and_then(|e| e.to_str());
        let first_name = match ext {
            Some(ext) => format!("{}_001.{}", day, ext.to_lowercase()),
            None => format!("{}_001", day),
        };
        let candidate = sub_dir.join(first_name);

        let dest = {
            let taken = |p: &Path| claimed.contains(p) || p.exists();
            if !taken(&candidate) {
                Ok(candidate)
            } else {
                plan::unique_path(&candidate, &taken)
            }
        };
        let dest = match dest {
            Ok(d) => d,
            Err(err) => {
                report.errors += 1;
                report
                    .warnings
                    .push(format!("{}: {}", file.path.display(), err));
                continue;
            }
        };

        if let Err(err) = fs::rename(&file.path, &dest) {
            report.errors += 1;
            report
                .warnings
                .push(format!("{}: {}", file.path.display(), err));
            continue;
        }

        if let Some(local) = dt.and_local_timezone(chrono::Local).single() {
            let ft = filetime::FileTime::from_unix_time(local.timestamp(), 0);
            filetime::set_file_mtime(&dest, ft).ok();
        }

        claimed.insert(dest);
        report.moved += 1;
    }

    progress.report("organize", total, total, "Organized");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent() -> ThrottledProgress<'static> {
        ThrottledProgress::new(&|_, _, _, _| {})
    }

    #[test]
    fn test_organize_moves_dated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154733.jpg"), b"x").unwrap();

        let report = organize(dir.path(), &silent()).unwrap();
        assert_eq!(report.moved, 1);
        assert!(dir.path().join("2019/05/2019-05-09_001.jpg").exists());
        assert!(!dir.path().join("IMG_20190509_154733.jpg").exists());
    }

    #[test]
    fn test_organize_resolves_name_collisions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154733.jpg"), b"one").unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154734.jpg"), b"two!").unwrap();

        let report = organize(dir.path(), &silent()).unwrap();
        assert_eq!(report.moved, 2);
        assert!(dir.path().join("2019/05/2019-05-09_001.jpg").exists());
        assert!(dir.path().join("2019/05/2019-05-09_002.jpg").exists());
    }

    #[test]
    fn test_organize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154733.jpg"), b"x").unwrap();

        organize(dir.path(), &silent()).unwrap();
        let second = organize(dir.path(), &silent()).unwrap();
        assert_eq!(second.moved, 0);
        assert_eq!(second.already_in_place, 1);
        assert!(dir.path().join("2019/05/2019-05-09_001.jpg").exists());
    }

    #[test]
    fn test_organize_continues_past_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file squatting on the year directory name makes
        // every 2019 destination uncreatable.
        std::fs::write(dir.path().join("2019"), b"squatter").unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154733.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("IMG_20200101_101010.jpg"), b"y").unwrap();

        let report = organize(dir.path(), &silent()).unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings.len(), 1);
        // The unrelated file still gets moved
        assert_eq!(report.moved, 1);
        assert!(dir.path().join("2020/01/2020-01-01_001.jpg").exists());
        assert!(dir.path().join("IMG_20190509_154733.jpg").exists());
    }

    #[test]
    fn test_organize_counts_unrecognized_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154733.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let report = organize(dir.path(), &silent()).unwrap();
        assert_eq!(report.moved, 1);
        assert_eq!(report.unrecognized, 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_organize_sets_mtime_to_resolved_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_20190509_154733.jpg"), b"x").unwrap();

        organize(dir.path(), &silent()).unwrap();
        let dest = dir.path().join("2019/05/2019-05-09_001.jpg");
        let modified = std::fs::metadata(&dest).unwrap().modified().unwrap();
        let dt: chrono::DateTime<chrono::Local> = modified.into();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2019-05-09");
    }
}
