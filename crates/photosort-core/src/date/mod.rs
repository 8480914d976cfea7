pub mod exif;
pub mod guess;

use std::path::Path;

use chrono::NaiveDateTime;

use crate::media::MediaKind;

/// Resolve a creation timestamp for a file.
///
/// Priority: EXIF (images only), filename patterns, filesystem mtime.
/// Returns None only when even the mtime is unreadable.
pub fn resolve(path: &Path, kind: MediaKind) -> Option<NaiveDateTime> {
    if kind == MediaKind::Image {
        if let Some(dt) = exif::extract_exif_date(path) {
            return Some(dt);
        }
    }

    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(dt) = guess::guess_date_from_filename(name) {
            return Some(dt);
        }
    }

    mtime_date(path)
}

/// Filesystem mtime as a local naive datetime.
fn mtime_date(path: &Path) -> Option<NaiveDateTime> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let dt: chrono::DateTime<chrono::Local> = modified.into();
    Some(dt.naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_prefers_filename_over_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_20190509_154733.mp4");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"x")
            .unwrap();

        let dt = resolve(&path, MediaKind::Video).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2019-05-09");
    }

    #[test]
    fn test_resolve_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.mp4");
        std::fs::File::create(&path).unwrap();

        assert!(resolve(&path, MediaKind::Video).is_some());
    }
}
