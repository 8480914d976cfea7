use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag};

/// Extract date from a file's EXIF data.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn extract_exif_date(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let reader = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    let tags = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

    for tag in &tags {
        if let Some(field) = reader.get_field(*tag, In::PRIMARY) {
            let val = field.display_value().to_string();
            if let Some(dt) = parse_exif_datetime(&val) {
                return Some(dt);
            }
        }
    }

    None
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(d) = chrono::NaiveDate::parse_from_str(&cleaned.split(' ').next()?, "%Y:%m:%d") {
        return Some(d.and_hms_opt(0, 0, 0)?);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exif_datetime_variants() {
        assert!(parse_exif_datetime("2021:06:01 12:30:00").is_some());
        assert!(parse_exif_datetime("2021-06-01 12:30:00").is_some());
        assert!(parse_exif_datetime("2021/06/01").is_some());
        assert!(parse_exif_datetime("not a date").is_none());
    }

    #[test]
    fn test_extract_from_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();
        assert!(extract_exif_date(&path).is_none());
    }
}
