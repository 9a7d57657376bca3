use ignore::{DirEntry, WalkBuilder};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::scanner::FileScanner;
use crate::config::{DecodeMode, SearchQuery};
use crate::errors::ScanError;
use crate::metrics::ScanMetrics;
use crate::results::{FileResult, SearchOutput};

/// Searches every regular file under `root` with default decoding
pub fn search(root: &Path, query: &SearchQuery) -> SearchOutput {
    search_with(root, query, DecodeMode::default())
}

/// Fans `query` out over every regular file under `root`.
///
/// Each file is scanned end to end by one task on a pool of `query.workers`
/// threads. A file that cannot be read contributes what it matched before
/// the failure, and a task that panics contributes nothing; neither stops
/// the other tasks. Records from different files come back in no particular
/// order.
pub fn search_with(root: &Path, query: &SearchQuery, decode_mode: DecodeMode) -> SearchOutput {
    info!(
        "Starting search in {} with criteria: {:?}",
        root.display(),
        query.criteria
    );
    let started = Instant::now();

    let files = collect_files(root);
    debug!("Found {} files to scan", files.len());

    if files.is_empty() {
        debug!("No files to scan, returning empty result");
        return SearchOutput::new();
    }

    let metrics = ScanMetrics::new();
    let scanner = FileScanner::new(query.matcher())
        .with_max_results(query.max_results_per_file)
        .with_decode_mode(decode_mode)
        .with_metrics(metrics.clone());

    let file_results = fan_out(&files, query.workers.get(), |path| scanner.scan(path));

    let mut output = SearchOutput::new();
    for file_result in file_results {
        output.add_file_result(file_result);
    }
    output.elapsed = started.elapsed();

    metrics.log_stats();
    info!(
        "Search complete. Found {} matches in {} of {} files ({} failed) in {:.4}s",
        output.total_matches(),
        output.files_with_matches,
        output.files_scanned,
        output.files_failed,
        output.elapsed_seconds()
    );

    output
}

/// Lists regular files under `root`, recursively, without any ignore rules.
/// Symlinks to files are included; symlinked directories are not entered.
pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut walker = WalkBuilder::new(root);
    walker
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false);

    walker
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(is_regular_file)
        .map(DirEntry::into_path)
        .collect()
}

fn is_regular_file(entry: &DirEntry) -> bool {
    match entry.file_type() {
        Some(ft) if ft.is_file() => true,
        Some(ft) if ft.is_symlink() => entry.path().is_file(),
        _ => false,
    }
}

/// Runs `scan` once per file on a dedicated pool of `workers` threads.
///
/// Rayon's work queue feeds the fixed set of workers, so no per-file thread
/// or task object is created up front. Each call is isolated with
/// `catch_unwind`; a panic becomes a failed [`FileResult`] with no records.
pub(crate) fn fan_out<F>(files: &[PathBuf], workers: usize, scan: F) -> Vec<FileResult>
where
    F: Fn(&Path) -> FileResult + Sync,
{
    let run = || {
        files
            .par_iter()
            .with_max_len(1)
            .map(|path| isolate(path, &scan))
            .collect::<Vec<_>>()
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("flowscan-worker-{}", i))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!("Could not build a {}-thread pool, using the global pool: {}", workers, e);
            run()
        }
    }
}

fn isolate<F>(path: &Path, scan: &F) -> FileResult
where
    F: Fn(&Path) -> FileResult,
{
    match catch_unwind(AssertUnwindSafe(|| scan(path))) {
        Ok(result) => result,
        Err(payload) => {
            let err = ScanError::task_panicked(path, panic_message(payload.as_ref()));
            warn!("Dropping contribution of {}: {}", path.display(), err);
            FileResult::failed(path, err.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
