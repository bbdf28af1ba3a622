//! Scheduled update job: prepare -> refresh -> detect -> commit + push -> merge + push.
//!
//! Only the financial-data directory is inspected and staged. A run with no
//! changes under it commits nothing and merges nothing.

use crate::domain::{DomainError, JobOutcome};
use crate::ports::{CommitIdentity, RefreshPort, VcsPort};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const COMMIT_MESSAGE_PREFIX: &str = "Update financial data";

/// `Update financial data - 2024-03-01 06:00:12 UTC`
pub fn commit_message(at: DateTime<Utc>) -> String {
    format!(
        "{} - {}",
        COMMIT_MESSAGE_PREFIX,
        at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub struct UpdateJob {
    refresh: Arc<dyn RefreshPort>,
    vcs: Arc<dyn VcsPort>,
    data_dir: PathBuf,
    dev_branch: String,
    stable_branch: String,
    identity: CommitIdentity,
}

impl UpdateJob {
    pub fn new(
        refresh: Arc<dyn RefreshPort>,
        vcs: Arc<dyn VcsPort>,
        data_dir: impl Into<PathBuf>,
        dev_branch: impl Into<String>,
        stable_branch: impl Into<String>,
        identity: CommitIdentity,
    ) -> Self {
        Self {
            refresh,
            vcs,
            data_dir: data_dir.into(),
            dev_branch: dev_branch.into(),
            stable_branch: stable_branch.into(),
            identity,
        }
    }

    pub async fn run(&self) -> Result<JobOutcome, DomainError> {
        self.run_at(Utc::now()).await
    }

    /// Run the job, stamping any commit with `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobOutcome, DomainError> {
        self.vcs.prepare(&self.dev_branch).await?;

        info!(step = %self.refresh.describe(), "refreshing data");
        let report = self.refresh.refresh().await?;
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            files_written = ?report.files_written,
            "refresh finished"
        );

        let changed = self.vcs.changed_paths(&self.data_dir).await?;
        if changed.is_empty() {
            info!(dir = %self.data_dir.display(), "no changes to commit");
            return Ok(JobOutcome::default());
        }
        info!(files = changed.len(), "changes detected");

        self.vcs.stage(&self.data_dir).await?;
        let message = commit_message(now);
        let commit = self
            .vcs
            .commit(&self.data_dir, &message, &self.identity)
            .await?;
        info!(commit = %commit, message = %message, "committed");
        self.vcs.push(&self.dev_branch).await?;

        self.vcs
            .merge(&self.dev_branch, &self.stable_branch, &self.identity)
            .await?;
        info!(from = %self.dev_branch, into = %self.stable_branch, "stable branch updated");

        Ok(JobOutcome {
            changed: true,
            commit: Some(commit),
            merged: true,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use chrono::TimeZone;

    fn job(vcs: &Arc<FakeVcs>, writes: Option<&str>, fail: bool) -> UpdateJob {
        let refresh = Arc::new(FakeRefresh {
            vcs: Arc::clone(vcs),
            writes: writes.map(str::to_string),
            fail,
        });
        UpdateJob::new(
            refresh,
            Arc::clone(vcs) as Arc<dyn VcsPort>,
            "data/financial",
            "dev",
            "main",
            identity(),
        )
    }

    #[test]
    fn test_commit_message_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 12).unwrap();
        assert_eq!(
            commit_message(at),
            "Update financial data - 2024-03-01 06:00:12 UTC"
        );
    }

    #[tokio::test]
    async fn test_new_file_commits_and_merges_once() {
        let vcs = Arc::new(FakeVcs::default());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let outcome = job(&vcs, Some("data/financial/yfinance/USO.csv"), false)
            .run_at(now)
            .await
            .unwrap();

        assert!(outcome.changed);
        assert!(outcome.merged);
        assert_eq!(outcome.commit.as_deref(), Some("c0ffee"));

        let calls = vcs.calls();
        assert_eq!(
            calls,
            vec![
                "prepare dev",
                "status data/financial",
                "add data/financial",
                "commit data/financial [github-actions[bot]] Update financial data - 2024-03-01 06:00:00 UTC",
                "push dev",
                "merge dev -> main",
            ]
        );
        assert!(calls[3].contains("2024-03-01"));
    }

    #[tokio::test]
    async fn test_no_changes_skips_commit_and_merge() {
        let vcs = Arc::new(FakeVcs::default());
        let outcome = job(&vcs, None, false).run().await.unwrap();
        assert_eq!(outcome, JobOutcome::default());
        assert_eq!(vcs.calls(), vec!["prepare dev", "status data/financial"]);
    }

    #[tokio::test]
    async fn test_repeated_identical_dispatch_is_noop() {
        let vcs = Arc::new(FakeVcs::default());
        let first = job(&vcs, Some("data/financial/yfinance/UNG.csv"), false)
            .run()
            .await
            .unwrap();
        assert!(first.changed);
        // Second dispatch: refresh produces byte-identical files, so nothing is pending.
        let second = job(&vcs, None, false).run().await.unwrap();
        assert!(!second.changed);
        let commits = vcs.calls().iter().filter(|c| c.starts_with("commit")).count();
        let merges = vcs.calls().iter().filter(|c| c.starts_with("merge")).count();
        assert_eq!((commits, merges), (1, 1));
    }

    #[tokio::test]
    async fn test_refresh_failure_aborts_before_detection() {
        let vcs = Arc::new(FakeVcs::default());
        let err = job(&vcs, None, true).run().await.unwrap_err();
        assert!(matches!(err, DomainError::Refresh(_)));
        assert_eq!(vcs.calls(), vec!["prepare dev"]);
    }

    #[tokio::test]
    async fn test_merge_failure_is_job_failure() {
        let vcs = Arc::new(FakeVcs {
            fail_merge: true,
            ..Default::default()
        });
        let err = job(&vcs, Some("data/financial/x.csv"), false)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Vcs { .. }));
    }
}
