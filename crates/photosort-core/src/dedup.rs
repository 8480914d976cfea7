use std::collections::{HashMap, HashSet};
use std::path::Path;

use unicode_normalization::UnicodeNormalization;

use crate::fingerprint::Fingerprint;
use crate::media::MediaFile;

/// Survivor selection policy for duplicate groups.
///
/// A configured suffix marks manually edited/re-exported copies
/// ("IMG_001-edited.jpg"); when any group member carries it, the oldest
/// suffixed member survives. Otherwise the oldest member overall does.
#[derive(Debug, Clone, Default)]
pub struct TieBreakPolicy {
    pub preferred_suffix: Option<String>,
}

impl TieBreakPolicy {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            preferred_suffix: Some(suffix.into()),
        }
    }

    fn matches(&self, stem: &str) -> bool {
        match &self.preferred_suffix {
            Some(suffix) => normalize(stem).ends_with(&normalize(suffix)),
            None => false,
        }
    }
}

/// NFC + lowercase, as filename comparisons must be.
fn normalize(s: &str) -> String {
    s.nfc().collect::<String>().to_lowercase()
}

fn stem_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
}

/// Outcome for one duplicate group: exactly one survivor, indices into
/// the caller's file slice.
#[derive(Debug, PartialEq, Eq)]
pub struct Resolution {
    pub keep: usize,
    pub remove: Vec<usize>,
}

/// Pick the survivor of a group sharing one grouping key.
pub fn resolve_group(
    files: &[MediaFile],
    group: &[usize],
    policy: &TieBreakPolicy,
) -> Resolution {
    debug_assert!(!group.is_empty());

    let suffixed: Vec<usize> = group
        .iter()
        .copied()
        .filter(|&i| policy.matches(stem_of(&files[i].path)))
        .collect();
    let candidates = if suffixed.is_empty() {
        group
    } else {
        suffixed.as_slice()
    };

    // Oldest wins; index order breaks exact mtime ties.
    let keep = candidates
        .iter()
        .copied()
        .min_by_key(|&i| (files[i].mod_time_millis, i))
        .unwrap_or(group[0]);

    Resolution {
        keep,
        remove: group.iter().copied().filter(|&i| i != keep).collect(),
    }
}

/// Grouping key for the filename-keyed pass: stem with the preferred
/// suffix stripped, plus the extension, both normalized.
fn filename_key(file: &MediaFile, policy: &TieBreakPolicy) -> (String, String) {
    let mut stem = normalize(stem_of(&file.path));
    if let Some(suffix) = &policy.preferred_suffix {
        let suffix = normalize(suffix);
        if let Some(trimmed) = stem.strip_suffix(&suffix) {
            stem = trimmed.to_string();
        }
    }
    let ext = file
        .path
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize)
        .unwrap_or_default();
    (stem, ext)
}

/// Filename-keyed pass: loser indices across all groups, sorted.
pub fn filename_pass(files: &[MediaFile], policy: &TieBreakPolicy) -> Vec<usize> {
    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (i, file) in files.iter().enumerate() {
        groups.entry(filename_key(file, policy)).or_default().push(i);
    }
    collect_losers(files, groups.into_values(), policy)
}

/// Fingerprint-keyed pass over the files not already removed by an
/// earlier pass. Unfingerprintable files never join a group.
pub fn fingerprint_pass(
    files: &[MediaFile],
    fingerprints: &[Option<Fingerprint>],
    excluded: &HashSet<usize>,
    policy: &TieBreakPolicy,
) -> Vec<usize> {
    let mut groups: HashMap<&Fingerprint, Vec<usize>> = HashMap::new();
    for (i, fp) in fingerprints.iter().enumerate() {
        if excluded.contains(&i) {
            continue;
        }
        if let Some(fp) = fp {
            groups.entry(fp).or_default().push(i);
        }
    }
    collect_losers(files, groups.into_values(), policy)
}

fn collect_losers(
    files: &[MediaFile],
    groups: impl Iterator<Item = Vec<usize>>,
    policy: &TieBreakPolicy,
) -> Vec<usize> {
    let mut losers = Vec::new();
    for group in groups {
        if group.len() < 2 {
            continue;
        }
        losers.extend(resolve_group(files, &group, policy).remove);
    }
    losers.sort_unstable();
    losers
}
