/// Reaper: age-based janitor for the scratch directory.
///
/// Knows nothing about the archive: any file whose last modification is
/// older than `max_age` is deleted. Per-file failures are logged and the
/// sweep carries on.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

use crate::config::MIN_INTERVAL;
use crate::metrics::GuardMetrics;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Regular files inspected.
    pub scanned: usize,
    /// Files deleted by this sweep.
    pub removed: usize,
    /// Files that could not be inspected or deleted.
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct Reaper {
    dir: PathBuf,
    max_age: Duration,
}

impl Reaper {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Sweep against the wall clock.
    pub async fn sweep(&self) -> ReapReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Sweep as if the current time were `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> ReapReport {
        let mut report = ReapReport::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), "reaper: cannot read scratch dir: {e}");
                report.errors += 1;
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("reaper: directory iteration failed: {e}");
                    report.errors += 1;
                    break;
                }
            };
            let path = entry.path();

            let modified = match entry.metadata().await {
                Ok(meta) if !meta.is_file() => continue,
                Ok(meta) => meta.modified(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => Err(e),
            };
            report.scanned += 1;

            let modified = match modified {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "reaper: no mtime: {e}");
                    report.errors += 1;
                    continue;
                }
            };

            // Future mtimes (clock skew) are never old enough.
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };
            if age <= self.max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), age_secs = age.as_secs(), "reaper: removed");
                    report.removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "reaper: file vanished");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "reaper: remove failed: {e}");
                    report.errors += 1;
                }
            }
        }

        report
    }

    /// Run the sweep every `interval` until the task is aborted.
    pub fn spawn(self, interval: Duration, metrics: Arc<GuardMetrics>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            // Skip the immediate first tick
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = self.sweep().await;
                metrics.files_reaped.inc_by(report.removed as u64);
                if report.removed > 0 || report.errors > 0 {
                    tracing::info!(
                        scanned = report.scanned,
                        removed = report.removed,
                        errors = report.errors,
                        "reaper: sweep done"
                    );
                }
            }
        })
    }
}
