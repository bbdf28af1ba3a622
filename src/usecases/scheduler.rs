//! Cron scheduler for the update job.
//!
//! Ticks every 30 seconds and runs the job when a scheduled instant lies in
//! `(last_run, now]`. The last run comes from StatePort, so a restart does not
//! fire a run that already happened. Runs are sequential, one attempt each.

use crate::domain::{DomainError, JobRecord};
use crate::ports::StatePort;
use crate::usecases::update_job::UpdateJob;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
/// Look-back used when no run was ever recorded.
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Accept 5-field crontab syntax by prepending a seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    }
}

pub fn parse_schedule(expr: &str) -> Result<Schedule, DomainError> {
    Schedule::from_str(&normalize_cron(expr))
        .map_err(|e| DomainError::Config(format!("invalid cron expression '{}': {}", expr, e)))
}

/// True when a scheduled instant falls after `last_run` (or the look-back) and not after `now`.
pub fn is_due(schedule: &Schedule, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let since = last_run.unwrap_or_else(|| now - Duration::hours(DEFAULT_LOOKBACK_HOURS));
    schedule.after(&since).take(1).any(|next| next <= now)
}

pub struct JobScheduler {
    schedule: Schedule,
    job: Arc<UpdateJob>,
    state: Arc<dyn StatePort>,
}

impl JobScheduler {
    pub fn new(
        cron_expr: &str,
        job: Arc<UpdateJob>,
        state: Arc<dyn StatePort>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            schedule: parse_schedule(cron_expr)?,
            job,
            state,
        })
    }

    pub fn next_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }

    /// Run the job once if due at `now`. Returns the recorded run, if any.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Option<JobRecord>, DomainError> {
        let last = self.state.last_run().await?.map(|r| r.started_at);
        if !is_due(&self.schedule, last, now) {
            return Ok(None);
        }
        info!("update job is due");
        let record = match self.job.run().await {
            Ok(outcome) => {
                info!(changed = outcome.changed, merged = outcome.merged, "scheduled run completed");
                JobRecord {
                    started_at: now,
                    finished_at: Utc::now(),
                    outcome: Some(outcome),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "scheduled run failed");
                JobRecord {
                    started_at: now,
                    finished_at: Utc::now(),
                    outcome: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.state.record_run(record.clone()).await?;
        if let Some(next) = self.next_run(Utc::now()) {
            info!(next = %next, "next scheduled run");
        }
        Ok(Some(record))
    }

    /// Loop until Ctrl-C.
    pub async fn run(&self) -> Result<(), DomainError> {
        match self.next_run(Utc::now()) {
            Some(next) => info!(next = %next, "scheduler started"),
            None => info!("scheduler started (no upcoming run)"),
        }
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("scheduler stopped");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::StateJson;
    use crate::ports::VcsPort;
    use crate::usecases::update_job::fakes::{FakeRefresh, FakeVcs, identity};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("0 6 * * *"), "0 0 6 * * *");
        assert_eq!(normalize_cron(" 0 0 6 * * * "), "0 0 6 * * *");
        assert!(parse_schedule("0 6 * * *").is_ok());
        assert!(matches!(
            parse_schedule("not a cron"),
            Err(DomainError::Config(_))
        ));
    }

    #[test]
    fn test_is_due_window() {
        let daily = parse_schedule("0 6 * * *").unwrap();
        // Already ran today at 06:00.
        assert!(!is_due(&daily, Some(at(6, 0)), at(12, 0)));
        // Last run yesterday, 06:00 today has passed.
        assert!(is_due(&daily, Some(at(6, 0) - Duration::days(1)), at(6, 0)));
        assert!(!is_due(&daily, Some(at(6, 0) - Duration::days(1)), at(5, 59)));
        // No record: look back 24 h.
        assert!(is_due(&daily, None, at(7, 0)));
    }

    #[tokio::test]
    async fn test_tick_records_run_and_does_not_refire() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(StateJson::new(dir.path().join("state.json")));
        let vcs = Arc::new(FakeVcs::default());
        let refresh = Arc::new(FakeRefresh {
            vcs: Arc::clone(&vcs),
            writes: Some("data/financial/yfinance/XLE.csv".into()),
            fail: false,
        });
        let job = Arc::new(UpdateJob::new(
            refresh,
            Arc::clone(&vcs) as Arc<dyn VcsPort>,
            "data/financial",
            "dev",
            "main",
            identity(),
        ));
        let scheduler = JobScheduler::new("0 6 * * *", job, state.clone()).unwrap();

        let first = scheduler.tick(at(6, 0)).await.unwrap().unwrap();
        assert!(first.outcome.unwrap().changed);
        assert!(scheduler.tick(at(6, 1)).await.unwrap().is_none());
        assert_eq!(state.last_run().await.unwrap().unwrap().started_at, at(6, 0));
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(StateJson::new(dir.path().join("state.json")));
        let vcs = Arc::new(FakeVcs::default());
        let refresh = Arc::new(FakeRefresh {
            vcs: Arc::clone(&vcs),
            writes: None,
            fail: true,
        });
        let job = Arc::new(UpdateJob::new(
            refresh,
            vcs as Arc<dyn VcsPort>,
            "data/financial",
            "dev",
            "main",
            identity(),
        ));
        let scheduler = JobScheduler::new("0 6 * * *", job, state).unwrap();
        let record = scheduler.tick(at(6, 0)).await.unwrap().unwrap();
        assert!(record.outcome.is_none());
        assert!(record.error.unwrap().contains("Refresh failed"));
    }
}
