//! Implements StatePort using a JSON file.
//!
//! Tracks the last update-job run so the scheduler does not re-fire after a restart.

use super::atomic::write_atomic;
use crate::domain::{DomainError, JobRecord};
use crate::ports::StatePort;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateData {
    last_run: Option<JobRecord>,
}

/// JSON file-based job state.
pub struct StateJson {
    path: std::path::PathBuf,
    cache: tokio::sync::RwLock<StateData>,
}

impl StateJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: tokio::sync::RwLock::new(StateData::default()),
        }
    }

    /// Load state from disk. A missing or unreadable file starts empty.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => StateData::default(),
        };
        *self.cache.write().await = data;
        Ok(())
    }

    async fn save(&self) -> Result<(), DomainError> {
        let data = self.cache.read().await;
        let json =
            serde_json::to_string_pretty(&*data).map_err(|e| DomainError::State(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DomainError::State(format!("create state dir: {}", e)))?;
            }
        }
        write_atomic(&self.path, json.as_bytes())
            .await
            .map_err(|e| DomainError::State(format!("atomic write failed: {}", e)))
    }
}

#[async_trait::async_trait]
impl StatePort for StateJson {
    async fn last_run(&self) -> Result<Option<JobRecord>, DomainError> {
        Ok(self.cache.read().await.last_run.clone())
    }

    async fn record_run(&self, record: JobRecord) -> Result<(), DomainError> {
        {
            let mut cache = self.cache.write().await;
            cache.last_run = Some(record);
        }
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobOutcome;
    use chrono::Utc;

    #[tokio::test]
    async fn test_record_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/job_state.json");
        let state = StateJson::new(&path);
        state.load().await.unwrap();
        assert!(state.last_run().await.unwrap().is_none());

        let record = JobRecord {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcome: Some(JobOutcome {
                changed: true,
                commit: Some("abc123".into()),
                merged: true,
            }),
            error: None,
        };
        state.record_run(record.clone()).await.unwrap();

        let reloaded = StateJson::new(&path);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.last_run().await.unwrap(), Some(record));
    }
}
