use std::path::PathBuf;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(
    name = "photosort",
    version,
    about = "Organize and merge photo/video collections by creation date"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a batch of files into a collection, skipping duplicate content
    Merge {
        /// Directory with newly available files
        source: PathBuf,
        /// Collection directory accumulating merged files
        target: PathBuf,
        /// Filename suffix marking manually edited copies (e.g. "-edited")
        #[arg(long)]
        preferred_suffix: Option<String>,
    },
    /// Relocate files into a YYYY/MM/YYYY-MM-DD_NNN.ext hierarchy
    Organize {
        /// Collection directory to reorganize in place
        root: PathBuf,
    },
    /// Remove duplicate files within one collection
    Dedup {
        /// Collection directory to deduplicate in place
        root: PathBuf,
        /// Filename suffix marking manually edited copies (e.g. "-edited")
        #[arg(long)]
        preferred_suffix: Option<String>,
    },
    /// Delete a collection's fingerprint cache, forcing a full re-hash
    ClearCache {
        /// Collection directory whose cache should be dropped
        target: PathBuf,
    },
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{msg:32} [{bar:40}] {pos}/{len}")
            .expect("static template")
            .progress_chars("=> "),
    );
    pb
}

fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("warning: {}", w);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    match cli.command {
        Command::Merge {
            source,
            target,
            preferred_suffix,
        } => {
            let options = photosort_core::MergeOptions {
                source,
                target,
                preferred_suffix,
            };
            let pb = progress_bar();
            let report = photosort_core::merge(&options, &{
                let pb = pb.clone();
                move |stage: &str, current: u64, total: u64, message: &str| {
                    if pb.length() != Some(total) {
                        pb.set_length(total);
                    }
                    pb.set_position((current + 1).min(total));
                    pb.set_message(format!("[{}] {}", stage, message));
                }
            })?;
            pb.finish_and_clear();
            print_warnings(&report.warnings);
            eprintln!(
                "Done! {} files considered, {} copied, {} renamed, {} duplicates skipped, {} unfingerprintable, {} errors ({:.2}s)",
                report.files_considered,
                report.copied,
                report.renamed,
                report.skipped_duplicates,
                report.unfingerprintable,
                report.errors,
                t_total.elapsed().as_secs_f64()
            );
        }
        Command::Organize { root } => {
            let pb = progress_bar();
            let report = {
                let pb = pb.clone();
                let cb = move |stage: &str, current: u64, total: u64, message: &str| {
                    if pb.length() != Some(total) {
                        pb.set_length(total);
                    }
                    pb.set_position((current + 1).min(total));
                    pb.set_message(format!("[{}] {}", stage, message));
                };
                let tp = photosort_core::ThrottledProgress::new(&cb);
                photosort_core::organize(&root, &tp)?
            };
            pb.finish_and_clear();
            print_warnings(&report.warnings);
            eprintln!(
                "Done! {} moved, {} already in place, {} without a date, {} unrecognized, {} errors ({:.2}s)",
                report.moved,
                report.already_in_place,
                report.dateless,
                report.unrecognized,
                report.errors,
                t_total.elapsed().as_secs_f64()
            );
        }
        Command::Dedup {
            root,
            preferred_suffix,
        } => {
            let options = photosort_core::DedupOptions {
                root,
                preferred_suffix,
            };
            let pb = progress_bar();
            let report = photosort_core::dedup_tree(&options, &{
                let pb = pb.clone();
                move |stage: &str, current: u64, total: u64, message: &str| {
                    if pb.length() != Some(total) {
                        pb.set_length(total);
                    }
                    pb.set_position((current + 1).min(total));
                    pb.set_message(format!("[{}] {}", stage, message));
                }
            })?;
            pb.finish_and_clear();
            print_warnings(&report.warnings);
            eprintln!(
                "Done! {} files considered, {} duplicates removed, {} errors ({:.2}s)",
                report.files_considered,
                report.removed,
                report.errors,
                t_total.elapsed().as_secs_f64()
            );
        }
        Command::ClearCache { target } => {
            photosort_core::clear_cache(&target)?;
            eprintln!("Cache cleared for {}", target.display());
        }
    }

    Ok(())
}
