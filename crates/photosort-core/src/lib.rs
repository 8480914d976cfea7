pub mod cache;
pub mod date;
pub mod dedup;
pub mod fingerprint;
pub mod hashdb;
pub mod media;
pub mod organize;
pub mod plan;
pub mod walk;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;

pub use cache::{CacheEntry, FingerprintCache};
pub use dedup::TieBreakPolicy;
pub use fingerprint::Fingerprint;
pub use organize::{organize, OrganizeReport};
pub use plan::{Action, SkipReason};

/// Type alias for progress callback
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter — emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(Instant::now() - std::time::Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap();
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Batch of newly available files.
    pub source: PathBuf,
    /// Destination tree accumulating merged files across runs.
    pub target: PathBuf,
    /// Suffix marking manually edited copies, e.g. "-edited".
    pub preferred_suffix: Option<String>,
}

#[derive(Debug, Default)]
pub struct MergeReport {
    pub files_considered: u64,
    pub copied: u64,
    pub renamed: u64,
    pub skipped_duplicates: u64,
    pub unfingerprintable: u64,
    pub errors: u64,
    pub warnings: Vec<String>,
}

/// Merge a source batch into a target tree.
///
/// Stages run to completion before the next begins: hash target
/// (cache-assisted), hash source, filename-dedup the source set, plan,
/// apply, update cache. Per-file failures are counted and reported;
/// only unreadable roots abort the run.
pub fn merge(
    options: &MergeOptions,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<MergeReport> {
    let tp = ThrottledProgress::new(progress_callback);
    let mut report = MergeReport::default();

    anyhow::ensure!(
        options.source.is_dir(),
        "source is not a readable directory: {}",
        options.source.display()
    );
    fs::create_dir_all(&options.target)?;

    // Stage 1: target index, cache-assisted
    let target_files = walk::walk_media(&options.target)?;
    let mut cache = FingerprintCache::load(&options.target);
    let mut target_build = hashdb::build_index(&target_files, Some(&mut cache), "hash-target", &tp);
    report.warnings.append(&mut target_build.warnings);

    // Stage 2: source index, no cache
    let source_files = walk::walk_media(&options.source)?;
    report.files_considered = source_files.len() as u64;
    let mut source_build = hashdb::build_index(&source_files, None, "hash-source", &tp);
    report.warnings.append(&mut source_build.warnings);

    // Stage 3: pre-merge filename-keyed dedup of the source batch.
    // Losers are only excluded from the plan, never deleted from disk.
    let policy = TieBreakPolicy {
        preferred_suffix: options.preferred_suffix.clone(),
    };
    let filename_losers: HashSet<usize> =
        dedup::filename_pass(&source_files, &policy).into_iter().collect();
    report.skipped_duplicates += filename_losers.len() as u64;

    let mut kept_files = Vec::with_capacity(source_files.len());
    let mut kept_fps = Vec::with_capacity(source_files.len());
    for (i, (file, fp)) in source_files
        .iter()
        .zip(source_build.fingerprints.iter())
        .enumerate()
    {
        if !filename_losers.contains(&i) {
            kept_files.push(file.clone());
            kept_fps.push(fp.clone());
        }
    }

    // Stage 4: plan
    let plan = plan::plan_merge(&kept_files, &kept_fps, &mut target_build.index, &options.target);
    report.errors += plan.failures.len() as u64;
    for failure in plan.failures {
        log::warn!("{}", failure);
        report.warnings.push(failure);
    }
    for action in &plan.actions {
        if let Action::Skip { reason, .. } = action {
            match reason {
                SkipReason::Duplicate => report.skipped_duplicates += 1,
                SkipReason::Unfingerprintable => report.unfingerprintable += 1,
            }
        }
    }

    // Stage 5: apply. Planning guaranteed distinct destination paths,
    // so copies can run in parallel across them.
    let fp_by_source: HashMap<&Path, &Fingerprint> = kept_files
        .iter()
        .zip(kept_fps.iter())
        .filter_map(|(f, fp)| fp.as_ref().map(|fp| (f.path.as_path(), fp)))
        .collect();

    let copies: Vec<&Action> = plan
        .actions
        .iter()
        .filter(|a| a.dest().is_some())
        .collect();
    for action in &copies {
        if let Some(parent) = action.dest().and_then(|d| d.parent()) {
            // A failure here surfaces as that file's copy error below
            if let Err(err) = fs::create_dir_all(parent) {
                log::warn!("create {}: {}", parent.display(), err);
            }
        }
    }

    let total = copies.len() as u64;
    let counter = AtomicU64::new(0);
    let applied: Vec<Result<(bool, PathBuf), String>> = copies
        .par_iter()
        .map(|action| {
            let source = action.source();
            let dest = action.dest().unwrap();
            let result = fs::copy(source, dest)
                .map(|_| {
                    let renamed = matches!(action, Action::CopyRenamed { .. });
                    (renamed, dest.to_path_buf())
                })
                .map_err(|err| format!("copy {} -> {}: {}", source.display(), dest.display(), err));
            let current = counter.fetch_add(1, Ordering::Relaxed);
            tp.report("apply", current, total, "Copying files");
            result
        })
        .collect();

    for (action, outcome) in copies.iter().zip(applied) {
        match outcome {
            Ok((renamed, dest)) => {
                if renamed {
                    report.renamed += 1;
                } else {
                    report.copied += 1;
                }
                // Record the copy so the next run's reconcile sees it fresh
                if let Some(fp) = fp_by_source.get(action.source()) {
                    cache.insert(
                        walk::relative_to(&dest, &options.target),
                        CacheEntry {
                            fingerprint: (*fp).clone(),
                            mod_time_millis: walk::mtime_millis_of(&dest),
                        },
                    );
                }
            }
            Err(err) => {
                log::warn!("{}", err);
                report.errors += 1;
                report.warnings.push(err);
            }
        }
    }

    // Stage 6: persist cache. Failure is a warning; the copies stand.
    if let Err(err) = cache.persist() {
        let msg = format!("cache write failed for {}: {}", options.target.display(), err);
        log::warn!("{}", msg);
        report.warnings.push(msg);
    }

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct DedupOptions {
    pub root: PathBuf,
    pub preferred_suffix: Option<String>,
}

#[derive(Debug, Default)]
pub struct DedupReport {
    pub files_considered: u64,
    pub removed: u64,
    pub errors: u64,
    pub warnings: Vec<String>,
}

/// Standalone dedup over one tree: filename-keyed pass first, then a
/// fingerprint-keyed pass over the survivors. Losers are deleted.
pub fn dedup_tree(
    options: &DedupOptions,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<DedupReport> {
    let tp = ThrottledProgress::new(progress_callback);
    let mut report = DedupReport::default();

    let files = walk::walk_media(&options.root)?;
    report.files_considered = files.len() as u64;

    let mut cache = FingerprintCache::load(&options.root);
    let mut build = hashdb::build_index(&files, Some(&mut cache), "hash", &tp);
    report.warnings.append(&mut build.warnings);

    let policy = TieBreakPolicy {
        preferred_suffix: options.preferred_suffix.clone(),
    };
    let mut losers = dedup::filename_pass(&files, &policy);
    let excluded: HashSet<usize> = losers.iter().copied().collect();
    losers.extend(dedup::fingerprint_pass(
        &files,
        &build.fingerprints,
        &excluded,
        &policy,
    ));
    losers.sort_unstable();
    losers.dedup();

    let total = losers.len() as u64;
    for (n, &i) in losers.iter().enumerate() {
        tp.report("remove", n as u64, total, "Removing duplicates");
        match fs::remove_file(&files[i].path) {
            Ok(()) => report.removed += 1,
            Err(err) => {
                let msg = format!("remove {}: {}", files[i].path.display(), err);
                log::warn!("{}", msg);
                report.errors += 1;
                report.warnings.push(msg);
            }
        }
    }

    // Prune removed paths from the cache before persisting
    let removed_set: HashSet<usize> = losers.into_iter().collect();
    let survivors: HashSet<PathBuf> = files
        .iter()
        .enumerate()
        .filter(|(i, _)| !removed_set.contains(i))
        .map(|(_, f)| f.relative.clone())
        .collect();
    cache.merge_entries(std::iter::empty(), &survivors);
    if let Err(err) = cache.persist() {
        let msg = format!("cache write failed for {}: {}", options.root.display(), err);
        log::warn!("{}", msg);
        report.warnings.push(msg);
    }

    Ok(report)
}

/// Delete the target's fingerprint cache, forcing a full re-hash next run.
pub fn clear_cache(target: &Path) -> anyhow::Result<()> {
    FingerprintCache::invalidate(target)
}
