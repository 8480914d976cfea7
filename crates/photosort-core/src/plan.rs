use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::fingerprint::Fingerprint;
use crate::hashdb::FingerprintIndex;
use crate::media::MediaFile;

/// Stems produced by the organize stage: `YYYY-MM-DD_NNN`.
static DATED_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<date>\d{4}-\d{2}-\d{2})_(?P<counter>\d{3})$").unwrap());

/// Hard ceiling for collision counter probing.
const MAX_NAME_ATTEMPTS: u32 = 9999;

/// Parse a `YYYY-MM-DD_NNN` stem into its date prefix and counter.
pub fn parse_dated_stem(stem: &str) -> Option<(&str, u32)> {
    let caps = DATED_STEM_RE.captures(stem)?;
    let date = caps.name("date")?.as_str();
    let counter = caps.name("counter")?.as_str().parse().ok()?;
    Some((date, counter))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Content already present in the target.
    Duplicate,
    /// No fingerprint could be derived; never merged automatically.
    Unfingerprintable,
}

/// One planned merge step. Planning is pure decision-making over the
/// two indices plus existence checks for naming; no copies happen here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Skip {
        source: PathBuf,
        reason: SkipReason,
    },
    Copy {
        source: PathBuf,
        dest: PathBuf,
    },
    CopyRenamed {
        source: PathBuf,
        /// The colliding path the source would have mirrored to.
        intended: PathBuf,
        dest: PathBuf,
    },
}

impl Action {
    pub fn source(&self) -> &Path {
        match self {
            Action::Skip { source, .. }
            | Action::Copy { source, .. }
            | Action::CopyRenamed { source, .. } => source,
        }
    }

    pub fn dest(&self) -> Option<&Path> {
        match self {
            Action::Skip { .. } => None,
            Action::Copy { dest, .. } | Action::CopyRenamed { dest, .. } => Some(dest),
        }
    }
}

#[derive(Debug, Default)]
pub struct Plan {
    pub actions: Vec<Action>,
    /// Per-file planning failures (collision ceiling). The merge
    /// continues with the remaining files.
    pub failures: Vec<String>,
}

/// Decide per source file: skip, copy, or copy under a collision-free
/// name. Fingerprints of planned copies are recorded into the target
/// index immediately so later source files cannot duplicate them.
pub fn plan_merge(
    source_files: &[MediaFile],
    source_fingerprints: &[Option<Fingerprint>],
    target_index: &mut FingerprintIndex,
    target_root: &Path,
) -> Plan {
    let mut plan = Plan::default();
    let mut planned: HashSet<PathBuf> = HashSet::new();

    for (file, fp) in source_files.iter().zip(source_fingerprints.iter()) {
        let Some(fp) = fp else {
            plan.actions.push(Action::Skip {
                source: file.path.clone(),
                reason: SkipReason::Unfingerprintable,
            });
            continue;
        };

        if target_index.contains(fp) {
            plan.actions.push(Action::Skip {
                source: file.path.clone(),
                reason: SkipReason::Duplicate,
            });
            continue;
        }

        let intended = target_root.join(&file.relative);
        let resolved = {
            let taken = |p: &Path| planned.contains(p) || p.exists();
            if !taken(&intended) {
                Ok(None)
            } else {
                unique_path(&intended, &taken).map(Some)
            }
        };

        match resolved {
            Ok(None) => {
                planned.insert(intended.clone());
                target_index.insert_first(fp.clone(), intended.clone());
                plan.actions.push(Action::Copy {
                    source: file.path.clone(),
                    dest: intended,
                });
            }
            Ok(Some(dest)) => {
                planned.insert(dest.clone());
                target_index.insert_first(fp.clone(), dest.clone());
                plan.actions.push(Action::CopyRenamed {
                    source: file.path.clone(),
                    intended,
                    dest,
                });
            }
            Err(err) => plan
                .failures
                .push(format!("{}: {}", file.path.display(), err)),
        }
    }

    plan
}

/// Unique-Filename Rule. `YYYY-MM-DD_NNN` stems keep their date prefix
/// and bump the counter; anything else gets `_NNN` appended before the
/// extension. Bounded: fails past MAX_NAME_ATTEMPTS probes.
pub fn unique_path(colliding: &Path, taken: &dyn Fn(&Path) -> bool) -> anyhow::Result<PathBuf> {
    let dir = colliding.parent().unwrap_or_else(|| Path::new(""));
    let stem = colliding
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = colliding.extension().and_then(|s| s.to_str());

    let (prefix, mut counter) = match DATED_STEM_RE.captures(stem) {
        Some(caps) => (
            caps.name("date").unwrap().as_str().to_string(),
            caps.name("counter").unwrap().as_str().parse::<u32>()?,
        ),
        None => (stem.to_string(), 0),
    };

    for _ in 0..MAX_NAME_ATTEMPTS {
        counter += 1;
        let name = match ext {
            Some(ext) => format!("{}_{:03}.{}", prefix, counter, ext),
            None => format!("{}_{:03}", prefix, counter),
        };
        let candidate = dir.join(name);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    anyhow::bail!("too many conflicts for {}", colliding.display())
}
