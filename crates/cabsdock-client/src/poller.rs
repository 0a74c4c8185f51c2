//! Result polling: check job status pages and download finished archives.
//!
//! A pass walks the pending set once, in order, one request at a time. Jobs that
//! reach `error` or `done` leave the set and are never polled again; everything
//! else stays for the next pass. Only a failed status-page fetch is retried.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cabsdock_common::{CabsError, Result, SandboxClient};

use crate::download::Downloader;
use crate::request::JobHandle;
use crate::status::{parse_status, JobStatus};

/// Job handles not yet resolved, in input order and without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingJobSet {
    jobs: Vec<JobHandle>,
}

impl PendingJobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle unless it is already pending.
    pub fn insert(&mut self, handle: JobHandle) -> bool {
        if self.jobs.contains(&handle) {
            return false;
        }
        self.jobs.push(handle);
        true
    }

    pub fn remove(&mut self, handle: &JobHandle) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|h| h != handle);
        self.jobs.len() != before
    }

    pub fn contains(&self, handle: &JobHandle) -> bool {
        self.jobs.contains(handle)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobHandle> {
        self.jobs.iter()
    }
}

impl FromIterator<JobHandle> for PendingJobSet {
    fn from_iter<I: IntoIterator<Item = JobHandle>>(iter: I) -> Self {
        let mut set = Self::new();
        for handle in iter {
            set.insert(handle);
        }
        set
    }
}

impl IntoIterator for PendingJobSet {
    type Item = JobHandle;
    type IntoIter = std::vec::IntoIter<JobHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

/// What one status check did to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Running,
    /// Status page could not be fetched; retried next pass.
    Retry { reason: String },
    /// Status value matched no known state. The job stays pending.
    Unrecognized(String),
    Failed,
    /// Job is done but its archive could not be downloaded.
    DownloadFailed { reason: String },
    Completed { archive: PathBuf },
}

impl PollOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            PollOutcome::Failed | PollOutcome::DownloadFailed { .. } | PollOutcome::Completed { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between passes (default: 60).
    pub interval_secs: u64,
    /// Stop after this many passes even if jobs remain (default: unlimited).
    pub max_passes: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_passes: None,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Waits between polling passes.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Totals after the driving loop stops.
#[derive(Debug, Default)]
pub struct PollSummary {
    pub passes: u32,
    pub completed: Vec<(JobHandle, PathBuf)>,
    /// Jobs that finished with errors or whose archive download failed.
    pub failed: Vec<JobHandle>,
    /// Non-empty only when `max_passes` ran out or a pass was aborted.
    pub pending: PendingJobSet,
    /// Error that stopped polling mid-pass. Outcomes recorded before it are kept.
    pub aborted: Option<CabsError>,
}

/// Partial result of one pass; `error` is set when a job stopped it early.
struct Pass {
    pending: PendingJobSet,
    outcomes: Vec<(JobHandle, PollOutcome)>,
    error: Option<CabsError>,
}

pub struct ResultPoller {
    client: SandboxClient,
    downloader: Downloader,
    output_dir: PathBuf,
}

impl ResultPoller {
    pub fn new<P: AsRef<Path>>(client: SandboxClient, output_dir: P) -> Self {
        Self {
            downloader: Downloader::new(client.clone()),
            client,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// One pass over `pending`; returns the jobs that are still unresolved.
    pub async fn drain(&self, pending: PendingJobSet) -> Result<PendingJobSet> {
        let (pending, _) = self.drain_pass(pending).await?;
        Ok(pending)
    }

    /// Like [`drain`](Self::drain), also returning each job's outcome.
    pub async fn drain_pass(
        &self,
        pending: PendingJobSet,
    ) -> Result<(PendingJobSet, Vec<(JobHandle, PollOutcome)>)> {
        let pass = self.run_pass(pending).await;
        match pass.error {
            Some(e) => Err(e),
            None => Ok((pass.pending, pass.outcomes)),
        }
    }

    async fn run_pass(&self, mut pending: PendingJobSet) -> Pass {
        let snapshot: Vec<JobHandle> = pending.iter().cloned().collect();
        let mut outcomes = Vec::with_capacity(snapshot.len());

        for handle in snapshot {
            match self.poll_job(&handle).await {
                Ok(outcome) => {
                    if outcome.is_resolved() {
                        pending.remove(&handle);
                    }
                    outcomes.push((handle, outcome));
                }
                Err(e) => {
                    return Pass {
                        pending,
                        outcomes,
                        error: Some(e),
                    }
                }
            }
        }

        Pass {
            pending,
            outcomes,
            error: None,
        }
    }

    /// Check one job, downloading its archive if it is done.
    ///
    /// A page without a `Status:` marker is an error, not a retry.
    #[instrument(skip(self, handle), fields(job = %handle))]
    pub async fn poll_job(&self, handle: &JobHandle) -> Result<PollOutcome> {
        let url = handle.as_str();
        let response = match self.client.get(url)?.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Error fetching job {}. ({})", url, e);
                return Ok(PollOutcome::Retry { reason: e.to_string() });
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Error fetching job {}. ({})", url, status.as_u16());
            return Ok(PollOutcome::Retry {
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let page = match response.text().await {
            Ok(page) => page,
            Err(e) => {
                warn!("Error reading job page {}. ({})", url, e);
                return Ok(PollOutcome::Retry { reason: e.to_string() });
            }
        };

        match parse_status(&page, url)? {
            JobStatus::Running => {
                info!("{} still running.", url);
                Ok(PollOutcome::Running)
            }
            JobStatus::Error => {
                warn!("{} finished with errors.", url);
                Ok(PollOutcome::Failed)
            }
            JobStatus::Done => {
                info!("{} done, download started...", url);
                let archive_url = archive_url(handle);
                match self.downloader.download_into(&archive_url, &self.output_dir).await {
                    Ok(archive) => {
                        info!("{} results download finished.", url);
                        Ok(PollOutcome::Completed { archive })
                    }
                    Err(e) if e.is_transient() => {
                        warn!("Results download for {} failed: {}", url, e);
                        Ok(PollOutcome::DownloadFailed { reason: e.to_string() })
                    }
                    Err(e) => Err(e),
                }
            }
            JobStatus::Unknown(value) => {
                warn!("{} reports unrecognized status '{}'; leaving it pending", url, value);
                Ok(PollOutcome::Unrecognized(value))
            }
        }
    }

    /// Drain repeatedly, sleeping between passes, until nothing is pending or
    /// `max_passes` is reached. A fatal error ends polling with the error in
    /// [`PollSummary::aborted`].
    pub async fn run_until_empty(
        &self,
        mut pending: PendingJobSet,
        settings: &PollSettings,
        sleeper: &dyn Sleeper,
    ) -> PollSummary {
        let mut summary = PollSummary::default();

        while !pending.is_empty() {
            if settings.max_passes.is_some_and(|max| summary.passes >= max) {
                warn!(
                    "Giving up after {} passes with {} jobs still pending",
                    summary.passes,
                    pending.len()
                );
                break;
            }

            info!("Retrieving results for {} jobs...", pending.len());
            let pass = self.run_pass(pending).await;
            summary.passes += 1;
            pending = pass.pending;

            for (handle, outcome) in pass.outcomes {
                match outcome {
                    PollOutcome::Completed { archive } => summary.completed.push((handle, archive)),
                    PollOutcome::Failed | PollOutcome::DownloadFailed { .. } => {
                        summary.failed.push(handle)
                    }
                    _ => {}
                }
            }

            if let Some(e) = pass.error {
                warn!("Polling stopped with {} jobs still pending: {}", pending.len(), e);
                summary.aborted = Some(e);
                break;
            }

            let more_passes = settings.max_passes.map_or(true, |max| summary.passes < max);
            if !pending.is_empty() && more_passes {
                debug!("Sleeping {:?} before next pass", settings.interval());
                sleeper.sleep(settings.interval()).await;
            }
        }

        summary.pending = pending;
        summary
    }
}

/// `.../job/<id>/` becomes `.../job/CABSdock_<id>.zip`.
pub fn archive_url(handle: &JobHandle) -> String {
    let url = handle.as_str().replace("/job/", "/job/CABSdock_");
    let stem = url.strip_suffix('/').unwrap_or(&url);
    format!("{}.zip", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(url: &str) -> JobHandle {
        JobHandle::new(url).unwrap()
    }

    #[test]
    fn test_archive_url() {
        assert_eq!(
            archive_url(&handle("http://host/job/abc123/")),
            "http://host/job/CABSdock_abc123.zip"
        );
        assert_eq!(
            archive_url(&handle("http://biocomp.chem.uw.edu.pl/CABSdock/job/46af2d4a0b1c/")),
            "http://biocomp.chem.uw.edu.pl/CABSdock/job/CABSdock_46af2d4a0b1c.zip"
        );
    }

    #[test]
    fn test_archive_url_without_trailing_slash_keeps_id() {
        assert_eq!(
            archive_url(&handle("http://host/job/abc123")),
            "http://host/job/CABSdock_abc123.zip"
        );
    }

    #[test]
    fn test_pending_set_deduplicates() {
        let set: PendingJobSet = ["http://h/job/a/", "http://h/job/b/", "http://h/job/a/"]
            .into_iter()
            .map(handle)
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&handle("http://h/job/b/")));
    }

    #[test]
    fn test_pending_set_remove() {
        let mut set: PendingJobSet = ["http://h/job/a/", "http://h/job/b/"].into_iter().map(handle).collect();
        assert!(set.remove(&handle("http://h/job/a/")));
        assert!(!set.remove(&handle("http://h/job/a/")));
        assert_eq!(set.iter().map(JobHandle::as_str).collect::<Vec<_>>(), ["http://h/job/b/"]);
    }

    #[test]
    fn test_download_failure_resolves_job() {
        assert!(PollOutcome::DownloadFailed { reason: "HTTP 404".into() }.is_resolved());
        assert!(!PollOutcome::Retry { reason: "HTTP 404".into() }.is_resolved());
        assert!(!PollOutcome::Unrecognized("queued".into()).is_resolved());
    }

    #[test]
    fn test_default_settings_poll_every_minute_forever() {
        let settings = PollSettings::default();
        assert_eq!(settings.interval(), Duration::from_secs(60));
        assert!(settings.max_passes.is_none());
    }

    #[test]
    fn test_only_terminal_outcomes_resolve() {
        assert!(PollOutcome::Failed.is_resolved());
        assert!(PollOutcome::Completed { archive: PathBuf::from("a.zip") }.is_resolved());
        assert!(!PollOutcome::Running.is_resolved());
        assert!(!PollOutcome::Unrecognized("queued".into()).is_resolved());
        assert!(!PollOutcome::Retry { reason: "HTTP 503".into() }.is_resolved());
    }
}
