//! Batch compression over a directory tree.
//!
//! Walks an input directory for decodable images, mirrors the tree under an
//! output directory, and compresses every file with the same request.
//!
//! ## Output Structure
//!
//! ```text
//! photos/                       out/
//! ├── 001-dawn.jpg        →     ├── 001-dawn.jpg
//! ├── scans/                    ├── scans/
//! │   └── page.png        →     │   └── page.jpg      # extension follows the format
//! └── notes.txt                 └── (skipped: not an image)
//! ```
//!
//! ## Parallel Processing
//!
//! Jobs run on a dedicated [rayon](https://docs.rs/rayon) pool sized by
//! [`effective_workers`](crate::config::effective_workers). Workers never
//! talk to the caller directly: each finished job is sent as a
//! [`BatchEvent`] over a channel that the calling thread drains, and the
//! [`BatchReport`] is assembled on the calling thread in input order.

use crate::imaging::rust_backend::supported_input_extensions;
use crate::imaging::{CompressError, CompressOutcome, CompressRequest, ImageBackend, OutputFormat, compress_file};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),
    #[error("A batch worker panicked")]
    WorkerPanicked,
}

/// One file to compress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Progress message sent from a worker as each job finishes.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Compressed {
        /// 1-based position in the job list.
        index: usize,
        source: PathBuf,
        output: PathBuf,
        outcome: CompressOutcome,
    },
    Failed {
        index: usize,
        source: PathBuf,
        code: &'static str,
        message: String,
    },
}

/// Result of one job, kept in input order.
#[derive(Debug)]
pub struct JobReport {
    pub job: BatchJob,
    pub result: Result<CompressOutcome, CompressError>,
}

/// Everything a batch did.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.len() - self.succeeded()
    }

    /// Total input and output bytes over successful jobs.
    pub fn byte_totals(&self) -> (u64, u64) {
        self.jobs
            .iter()
            .filter_map(|j| j.result.as_ref().ok())
            .fold((0, 0), |(i, o), r| (i + r.bytes_in, o + r.bytes_out))
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| supported_input_extensions().contains(&e.as_str()))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// Collect jobs for every supported image under `input_dir`.
///
/// Files are visited in sorted order so job indices are stable. The output
/// directory is skipped when it sits inside the input tree. When two sources
/// map to the same output name (`a.png` and `a.jpg` → `a.jpg`), the later
/// one keeps its original extension in the stem (`a-png.jpg`), with a
/// numeric suffix if that name is taken too (`a-png-2.jpg`).
pub fn collect_jobs(
    input_dir: &Path,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<Vec<BatchJob>, ProcessError> {
    if !input_dir.is_dir() {
        return Err(ProcessError::InputNotFound(input_dir.to_path_buf()));
    }

    let mut jobs = Vec::new();
    let mut claimed = HashSet::new();

    // Compared canonically so `.`, `..` and symlinked spellings all match
    let output_canonical = std::fs::canonicalize(output_dir).ok();
    let is_output_dir = |entry: &walkdir::DirEntry| {
        entry.file_type().is_dir()
            && output_canonical.is_some()
            && std::fs::canonicalize(entry.path()).ok() == output_canonical
    };

    let walker = WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || (!is_hidden(e.file_name()) && !is_output_dir(e)));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
            continue;
        }
        let source = entry.path().to_path_buf();
        let relative = source.strip_prefix(input_dir).unwrap_or(&source);

        let natural = output_dir.join(relative).with_extension(format.extension());
        let output = if claimed.contains(&natural) {
            let renamed = unclaimed_name(&natural, relative, format, &claimed);
            warn!(source = %source.display(), output = %renamed.display(), "output name taken, renamed");
            renamed
        } else {
            natural
        };
        claimed.insert(output.clone());

        jobs.push(BatchJob { source, output });
    }

    debug!(count = jobs.len(), dir = %input_dir.display(), "collected jobs");
    Ok(jobs)
}

/// First free sibling of `taken`: `stem-ext.out`, then `stem-ext-2.out`, ...
fn unclaimed_name(
    taken: &Path,
    relative: &Path,
    format: OutputFormat,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let lossy = |s: Option<&std::ffi::OsStr>| {
        s.map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let base = format!(
        "{}-{}",
        lossy(relative.file_stem()),
        lossy(relative.extension())
    );
    let ext = format.extension();

    let mut candidate = taken.with_file_name(format!("{base}.{ext}"));
    let mut n = 2;
    while claimed.contains(&candidate) {
        candidate = taken.with_file_name(format!("{base}-{n}.{ext}"));
        n += 1;
    }
    candidate
}

/// Run `jobs` on a pool of `workers` threads.
///
/// `on_event` is called on the calling thread, once per job, in completion
/// order. The returned report is in input order. A failing job is recorded
/// and does not stop the others.
pub fn run_batch(
    backend: &impl ImageBackend,
    jobs: &[BatchJob],
    request: &CompressRequest,
    workers: usize,
    mut on_event: impl FnMut(&BatchEvent),
) -> Result<BatchReport, ProcessError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("pixpress-worker-{i}"))
        .build()?;
    info!(jobs = jobs.len(), workers = pool.current_num_threads(), "starting batch");

    let (tx, rx) = mpsc::channel();

    let joined = std::thread::scope(|scope| {
        let handle = scope.spawn(move || {
            pool.install(|| {
                jobs.par_iter()
                    .enumerate()
                    .map_with(tx, |tx, (i, job)| {
                        let result = compress_file(backend, &job.source, &job.output, request);
                        let event = match &result {
                            Ok(outcome) => BatchEvent::Compressed {
                                index: i + 1,
                                source: job.source.clone(),
                                output: job.output.clone(),
                                outcome: *outcome,
                            },
                            Err(e) => {
                                warn!(source = %job.source.display(), code = e.code(), "{e}");
                                BatchEvent::Failed {
                                    index: i + 1,
                                    source: job.source.clone(),
                                    code: e.code(),
                                    message: e.to_string(),
                                }
                            }
                        };
                        // The receiver outlives every sender
                        let _ = tx.send(event);
                        result
                    })
                    .collect::<Vec<_>>()
            })
        });

        // Ends once the last worker's sender is dropped
        for event in rx {
            on_event(&event);
        }
        handle.join()
    });

    let results = joined.map_err(|_| ProcessError::WorkerPanicked)?;
    let report = BatchReport {
        jobs: jobs
            .iter()
            .cloned()
            .zip(results)
            .map(|(job, result)| JobReport { job, result })
            .collect(),
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{SourceFormat, SourceImageInfo};
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
    }

    // =========================================================================
    // collect_jobs tests
    // =========================================================================

    #[test]
    fn collect_jobs_mirrors_tree_and_filters_extensions() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        touch(&input.join("b.JPG"));
        touch(&input.join("a.png"));
        touch(&input.join("nested/c.webp"));
        touch(&input.join("notes.txt"));
        touch(&input.join(".hidden/d.jpg"));

        let out = tmp.path().join("out");
        let jobs = collect_jobs(&input, &out, OutputFormat::Jpeg).unwrap();

        let sources: Vec<_> = jobs
            .iter()
            .map(|j| j.source.strip_prefix(&input).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            sources,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.JPG"),
                PathBuf::from("nested/c.webp"),
            ]
        );
        assert_eq!(jobs[0].output, out.join("a.jpg"));
        assert_eq!(jobs[2].output, out.join("nested/c.jpg"));
    }

    #[test]
    fn collect_jobs_uses_format_extension() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("in/photo.jpg"));
        let jobs = collect_jobs(
            &tmp.path().join("in"),
            &tmp.path().join("out"),
            OutputFormat::Webp,
        )
        .unwrap();
        assert_eq!(jobs[0].output, tmp.path().join("out/photo.webp"));
    }

    #[test]
    fn collect_jobs_renames_colliding_outputs() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        touch(&input.join("a.jpg"));
        touch(&input.join("a.png"));

        let jobs = collect_jobs(&input, &tmp.path().join("out"), OutputFormat::Jpeg).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].output, tmp.path().join("out/a.jpg"));
        assert_eq!(jobs[1].output, tmp.path().join("out/a-png.jpg"));
    }

    #[test]
    fn collect_jobs_renamed_output_never_reuses_a_name() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        touch(&input.join("a-png.jpg"));
        touch(&input.join("a.jpg"));
        touch(&input.join("a.png"));

        let out = tmp.path().join("out");
        let jobs = collect_jobs(&input, &out, OutputFormat::Jpeg).unwrap();
        let outputs: Vec<_> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![out.join("a-png.jpg"), out.join("a.jpg"), out.join("a-png-2.jpg")]
        );
        let unique: HashSet<_> = outputs.iter().collect();
        assert_eq!(unique.len(), outputs.len());
    }

    #[test]
    fn collect_jobs_renames_around_existing_names() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        // `c-png.jpg` sorts before `c.png`, so the first rename is taken
        touch(&input.join("b.jpg"));
        touch(&input.join("b.png"));
        touch(&input.join("c-png.jpg"));
        touch(&input.join("c.jpg"));
        touch(&input.join("c.png"));
        touch(&input.join("c.tif"));

        let out = tmp.path().join("out");
        let jobs = collect_jobs(&input, &out, OutputFormat::Jpeg).unwrap();
        let outputs: Vec<_> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                out.join("b.jpg"),
                out.join("b-png.jpg"),
                out.join("c-png.jpg"),
                out.join("c.jpg"),
                out.join("c-png-2.jpg"),
                out.join("c-tif.jpg"),
            ]
        );
    }

    #[test]
    fn collect_jobs_skips_output_dir_spelled_differently() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.jpg"));
        touch(&tmp.path().join("out/a.jpg"));
        fs::create_dir_all(tmp.path().join("sub")).unwrap();

        // Same directory as the output, reached through `sub/..`
        let input = tmp.path().join("sub").join("..");
        let jobs = collect_jobs(&input, &tmp.path().join("out"), OutputFormat::Jpeg).unwrap();
        assert_eq!(jobs.len(), 1);

        let input = tmp.path().join(".");
        let jobs = collect_jobs(&input, &tmp.path().join("sub/../out"), OutputFormat::Jpeg).unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn collect_jobs_skips_nested_output_dir() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().to_path_buf();
        touch(&input.join("a.jpg"));
        touch(&input.join("out/a.jpg"));

        let jobs = collect_jobs(&input, &input.join("out"), OutputFormat::Jpeg).unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn collect_jobs_missing_input_errors() {
        let tmp = TempDir::new().unwrap();
        let result = collect_jobs(&tmp.path().join("nope"), tmp.path(), OutputFormat::Jpeg);
        assert!(matches!(result, Err(ProcessError::InputNotFound(_))));
    }

    // =========================================================================
    // run_batch tests
    // =========================================================================

    fn jobs_in(tmp: &Path, count: usize) -> Vec<BatchJob> {
        (0..count)
            .map(|i| {
                let source = tmp.join(format!("in/{i:03}.jpg"));
                touch(&source);
                BatchJob {
                    source,
                    output: tmp.join(format!("out/{i:03}.jpg")),
                }
            })
            .collect()
    }

    #[test]
    fn run_batch_reports_in_input_order() {
        let tmp = TempDir::new().unwrap();
        let jobs = jobs_in(tmp.path(), 8);
        let sources = vec![SourceImageInfo::new(800, 600, SourceFormat::Jpeg); 8];
        let backend = MockBackend::with_sources(sources);

        let mut events = Vec::new();
        let report = run_batch(&backend, &jobs, &CompressRequest::default(), 4, |e| {
            events.push(e.clone())
        })
        .unwrap();

        assert_eq!(report.jobs.len(), 8);
        assert_eq!(report.succeeded(), 8);
        for (job, entry) in jobs.iter().zip(&report.jobs) {
            assert_eq!(&entry.job, job);
            assert!(job.output.exists());
        }
        assert_eq!(events.len(), 8);
        let mut indices: Vec<usize> = events
            .iter()
            .map(|e| match e {
                BatchEvent::Compressed { index, .. } | BatchEvent::Failed { index, .. } => *index,
            })
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn run_batch_continues_past_failures() {
        let tmp = TempDir::new().unwrap();
        let jobs = jobs_in(tmp.path(), 3);
        // Only two probe results: one job fails with a decode error
        let backend = MockBackend::with_sources(vec![
            SourceImageInfo::new(800, 600, SourceFormat::Jpeg),
            SourceImageInfo::new(800, 600, SourceFormat::Jpeg),
        ]);

        let mut failures = Vec::new();
        let report = run_batch(&backend, &jobs, &CompressRequest::default(), 2, |e| {
            if let BatchEvent::Failed { code, .. } = e {
                failures.push(*code);
            }
        })
        .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(failures, vec!["decode_error"]);
    }

    #[test]
    fn run_batch_byte_totals() {
        let tmp = TempDir::new().unwrap();
        let jobs = jobs_in(tmp.path(), 2);
        let backend = MockBackend::with_sources(vec![
            SourceImageInfo::new(100, 100, SourceFormat::Jpeg);
            2
        ]);
        let report =
            run_batch(&backend, &jobs, &CompressRequest::default(), 1, |_| {}).unwrap();
        // Fast path copies the 4-byte stub
        assert_eq!(report.byte_totals(), (8, 8));
        let probes = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Probe(_)))
            .count();
        assert_eq!(probes, 2);
    }

    #[test]
    fn run_batch_empty_job_list() {
        let backend = MockBackend::new();
        let mut calls = 0;
        let report =
            run_batch(&backend, &[], &CompressRequest::default(), 4, |_| calls += 1).unwrap();
        assert!(report.jobs.is_empty());
        assert_eq!(calls, 0);
    }
}
