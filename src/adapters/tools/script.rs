//! External refresh command. Implements RefreshPort.
//!
//! Runs a configured shell command (e.g. `python scripts/update_yfinance_data.py`)
//! in the repository directory. Output is forwarded to the log.

use crate::domain::{DomainError, RefreshReport};
use crate::ports::RefreshPort;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

pub struct ExternalScriptRefresher {
    command: String,
    work_dir: PathBuf,
}

impl ExternalScriptRefresher {
    pub fn new(command: impl Into<String>, work_dir: impl AsRef<Path>) -> Self {
        Self {
            command: command.into(),
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RefreshPort for ExternalScriptRefresher {
    fn describe(&self) -> String {
        format!("external command `{}`", self.command)
    }

    async fn refresh(&self) -> Result<RefreshReport, DomainError> {
        info!(command = %self.command, dir = %self.work_dir.display(), "running refresh command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.work_dir)
            .output()
            .await
            .map_err(|e| DomainError::Refresh(format!("spawn `{}`: {}", self.command, e)))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(target: "refresh", "{}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!(target: "refresh", "{}", line);
        }

        if !output.status.success() {
            return Err(DomainError::Refresh(format!(
                "`{}` exited with {}",
                self.command, output.status
            )));
        }
        Ok(RefreshReport::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = ExternalScriptRefresher::new("echo ok > out.txt", dir.path());
        let report = refresher.refresh().await.unwrap();
        assert!(report.files_written.is_none());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap().trim(),
            "ok"
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_refresh_error() {
        let dir = tempfile::tempdir().unwrap();
        let refresher = ExternalScriptRefresher::new("exit 3", dir.path());
        let err = refresher.refresh().await.unwrap_err();
        assert!(matches!(err, DomainError::Refresh(_)));
    }
}
