use std::path::{Path, PathBuf};

/// Media classification, resolved once per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unrecognized,
}

impl MediaKind {
    /// Classify by extension. GIFs count as video: they carry no EXIF
    /// and their dates come from filename patterns.
    pub fn of(path: &Path) -> Self {
        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("gif"));
        if is_gif {
            return MediaKind::Video;
        }
        let is_mts = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("mts"));
        if is_mts {
            return MediaKind::Video;
        }
        match mime_guess::from_path(path).first() {
            Some(m) if m.type_() == mime_guess::mime::IMAGE => MediaKind::Image,
            Some(m) if m.type_() == mime_guess::mime::VIDEO => MediaKind::Video,
            _ => MediaKind::Unrecognized,
        }
    }
}

/// One file carried through the pipeline.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the scanned root.
    pub relative: PathBuf,
    pub kind: MediaKind,
    /// File size in bytes.
    pub size: u64,
    /// Modification time in milliseconds since the epoch.
    pub mod_time_millis: i64,
}

impl MediaFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }
}
