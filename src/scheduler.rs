//! Periodic folder scan scheduler.
//!
//! A [`FolderScanScheduler`] owns its own state (folder, interval, running or
//! stopped). `start` validates the folder, performs one scan right away and
//! then one per interval until `stop`. Each scan lists `*.csv` files in the
//! folder (non-recursive) and imports them one by one; a failing file is
//! recorded in the [`ScanReport`] and the rest of the scan carries on.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::csv_parser;
use crate::error::{PipelineError, Result};
use crate::models::ImportSummary;
use crate::pipeline::Pipeline;

// ---

pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;

/// Longest accepted scan interval (one year).
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Observable lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Stopped,
    Running { folder: PathBuf, interval: Duration },
}

/// Result of one file within a scan.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Imported {
        path: PathBuf,
        summary: ImportSummary,
    },
    Failed {
        path: PathBuf,
        kind: &'static str,
        message: String,
    },
}

/// Per-file outcomes of a single scan tick.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub folder: PathBuf,
    pub files: Vec<FileOutcome>,
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Imported { path, .. } | FileOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

impl ScanReport {
    pub fn imported(&self) -> usize {
        self.files.iter().filter(|f| !f.is_failure()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.is_failure()).count()
    }

    pub fn new_records(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f {
                FileOutcome::Imported { summary, .. } => summary.new_records,
                FileOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

struct RunningScan {
    folder: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared bookkeeping written by the background task.
#[derive(Default)]
struct ScanStats {
    ticks: AtomicU64,
    last_report: Mutex<Option<ScanReport>>,
}

pub struct FolderScanScheduler {
    pipeline: Arc<Pipeline>,
    running: Mutex<Option<RunningScan>>,
    stats: Arc<ScanStats>,
}

impl FolderScanScheduler {
    // ---
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            running: Mutex::new(None),
            stats: Arc::new(ScanStats::default()),
        }
    }

    /// Start scanning `folder` every `interval_minutes`.
    pub async fn start(&self, folder: impl AsRef<Path>, interval_minutes: u64) -> bool {
        self.start_with_interval(folder, Duration::from_secs(interval_minutes.saturating_mul(60)))
            .await
    }

    /// Start scanning `folder` every `interval`.
    ///
    /// Returns `false` if the folder does not exist, or the interval is zero
    /// or longer than [`MAX_INTERVAL`].
    /// A schedule that is already running is replaced.
    pub async fn start_with_interval(&self, folder: impl AsRef<Path>, interval: Duration) -> bool {
        // ---
        let folder = folder.as_ref().to_path_buf();

        match tokio::fs::metadata(&folder).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                error!(folder = %folder.display(), "Folder not found");
                return false;
            }
        }
        if interval.is_zero() {
            warn!("Refusing to start folder scan with a zero interval");
            return false;
        }
        if interval > MAX_INTERVAL {
            warn!(
                interval_secs = interval.as_secs(),
                max_secs = MAX_INTERVAL.as_secs(),
                "Refusing to start folder scan with an oversized interval"
            );
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.pipeline),
            folder.clone(),
            interval,
            cancel.clone(),
            Arc::clone(&self.stats),
        ));

        let previous = self.lock_running().replace(RunningScan {
            folder: folder.clone(),
            interval,
            cancel,
            handle,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
            info!(folder = %previous.folder.display(), "Replaced previous folder scan");
        }

        info!(
            folder = %folder.display(),
            interval_secs = interval.as_secs(),
            "Started periodic folder scan"
        );
        true
    }

    /// Cancel the recurring scan. No-op when already stopped.
    ///
    /// A scan that is already in progress runs to completion; no new tick
    /// starts after this returns.
    pub fn stop(&self) {
        // ---
        if let Some(running) = self.lock_running().take() {
            running.cancel.cancel();
            info!(folder = %running.folder.display(), "Stopped periodic folder scan");
        }
    }

    /// Stop and wait for an in-flight scan to finish.
    pub async fn shutdown(&self) {
        // ---
        let running = self.lock_running().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "Folder scan task panicked");
            }
            info!("Folder scan shut down");
        }
    }

    pub fn status(&self) -> ScanState {
        match self.lock_running().as_ref() {
            Some(r) => ScanState::Running {
                folder: r.folder.clone(),
                interval: r.interval,
            },
            None => ScanState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Number of scan ticks finished so far, successful or not.
    pub fn ticks_completed(&self) -> u64 {
        self.stats.ticks.load(Ordering::SeqCst)
    }

    /// Report of the most recent scan whose folder could be listed.
    pub fn last_report(&self) -> Option<ScanReport> {
        lock(&self.stats.last_report).clone()
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<RunningScan>> {
        lock(&self.running)
    }
}

impl Drop for FolderScanScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// A panic while holding one of these locks cannot leave the data half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_schedule(
    pipeline: Arc<Pipeline>,
    folder: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
    stats: Arc<ScanStats>,
) {
    // ---
    // The first scan runs even if the schedule is cancelled right after start.
    run_tick(&pipeline, &folder, &stats).await;

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => run_tick(&pipeline, &folder, &stats).await,
        }
    }
}

async fn run_tick(pipeline: &Pipeline, folder: &Path, stats: &ScanStats) {
    // ---
    let scan_id = Uuid::new_v4();
    let span = tracing::info_span!("scan", %scan_id, folder = %folder.display());

    async {
        match scan_folder(pipeline, folder, scan_id).await {
            Ok(report) => {
                info!(
                    files = report.files.len(),
                    imported = report.imported(),
                    failed = report.failed(),
                    new_records = report.new_records(),
                    "Folder scan complete"
                );
                *lock(&stats.last_report) = Some(report);
            }
            Err(e) => error!(error = %e, "Error scanning folder"),
        }
    }
    .instrument(span)
    .await;

    stats.ticks.fetch_add(1, Ordering::SeqCst);
}

/// Import every `*.csv` file directly inside `folder`, in name order.
///
/// Fails only if the folder itself cannot be listed; per-file failures are
/// recorded in the report.
pub async fn scan_folder(pipeline: &Pipeline, folder: &Path, scan_id: Uuid) -> Result<ScanReport> {
    // ---
    let files = list_csv_files(folder).await?;
    let mut report = ScanReport {
        scan_id,
        folder: folder.to_path_buf(),
        files: Vec::with_capacity(files.len()),
    };

    for path in files {
        let outcome = match import_file(pipeline, &path).await {
            Ok(summary) => FileOutcome::Imported { path, summary },
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error processing file");
                FileOutcome::Failed {
                    path,
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };
        report.files.push(outcome);
    }

    Ok(report)
}

async fn import_file(pipeline: &Pipeline, path: &Path) -> Result<ImportSummary> {
    let records = csv_parser::parse_file(path).await?;
    pipeline.import(&records).await
}

async fn list_csv_files(folder: &Path) -> Result<Vec<PathBuf>> {
    // ---
    let mut entries = tokio::fs::read_dir(folder).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            PipelineError::NotFound(format!("folder {}", folder.display()))
        }
        _ => PipelineError::Io(e),
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
