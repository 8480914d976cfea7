use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag};
use sha2::{Digest, Sha256};

use crate::date::guess;
use crate::media::MediaKind;

/// Hash component used when no capture metadata can be read.
/// Two unreadable files of equal size therefore collide; accepted imprecision.
const NO_EXIF_SENTINEL: &str = "no-exif";

/// Opaque content identity string.
///
/// Images: `<size>-<sha256 of normalized capture metadata>`.
/// Videos: `<size>-video-<YYYY-MM-DD>` with the date taken from the
/// filename only, so the fingerprint stays a pure function of
/// content + name.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Fingerprint(s.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed, ordered subset of capture attributes hashed into image
/// fingerprints. Field order is part of the format; do not reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifSummary {
    pub make: Option<String>,
    pub model: Option<String>,
    pub taken: Option<String>,
    pub orientation: Option<String>,
    pub exposure: Option<String>,
    pub aperture: Option<String>,
    pub iso: Option<String>,
    pub focal_length: Option<String>,
    pub flash: Option<String>,
    pub white_balance: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl ExifSummary {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 12] {
        [
            ("make", &self.make),
            ("model", &self.model),
            ("taken", &self.taken),
            ("orientation", &self.orientation),
            ("exposure", &self.exposure),
            ("aperture", &self.aperture),
            ("iso", &self.iso),
            ("focal", &self.focal_length),
            ("flash", &self.flash),
            ("wb", &self.white_balance),
            ("width", &self.width),
            ("height", &self.height),
        ]
    }

    /// Canonical string form: fixed field order, absent fields omitted.
    pub fn normalized(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.fields() {
            if let Some(v) = value {
                out.push_str(name);
                out.push('=');
                out.push_str(v);
                out.push('\n');
            }
        }
        out
    }
}

/// Read the capture metadata subset from a file. Returns None when the
/// container has no readable EXIF segment; never errors past this point.
pub fn read_exif_summary(path: &Path) -> Option<ExifSummary> {
    let file = File::open(path).ok()?;
    let reader = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    let get = |tag: Tag| -> Option<String> {
        reader
            .get_field(tag, In::PRIMARY)
            .map(|f| f.display_value().to_string())
    };

    let summary = ExifSummary {
        make: get(Tag::Make),
        model: get(Tag::Model),
        taken: get(Tag::DateTimeOriginal).or_else(|| get(Tag::DateTime)),
        orientation: get(Tag::Orientation),
        exposure: get(Tag::ExposureTime),
        aperture: get(Tag::FNumber),
        iso: get(Tag::PhotographicSensitivity),
        focal_length: get(Tag::FocalLength),
        flash: get(Tag::Flash),
        white_balance: get(Tag::WhiteBalance),
        width: get(Tag::PixelXDimension),
        height: get(Tag::PixelYDimension),
    };

    if summary.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// Compute the content fingerprint for one file.
///
/// Returns None for files excluded from dedup entirely: unrecognized
/// types and videos whose filename yields no calendar date.
pub fn fingerprint(path: &Path, kind: MediaKind, size: u64) -> Option<Fingerprint> {
    match kind {
        MediaKind::Image => {
            let hash_part = match read_exif_summary(path) {
                Some(summary) => hex::encode(Sha256::digest(summary.normalized().as_bytes())),
                None => NO_EXIF_SENTINEL.to_string(),
            };
            Some(Fingerprint(format!("{}-{}", size, hash_part)))
        }
        MediaKind::Video => {
            let name = path.file_name().and_then(|n| n.to_str())?;
            let date = guess::guess_calendar_date(name)?;
            Some(Fingerprint(format!(
                "{}-video-{}",
                size,
                date.format("%Y-%m-%d")
            )))
        }
        MediaKind::Unrecognized => None,
    }
}
