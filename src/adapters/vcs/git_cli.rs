//! Implements VcsPort by running the `git` command line against the repository.
//!
//! Every command runs as `git -C <repo_dir> ...`; a non-zero exit becomes
//! `DomainError::Vcs` carrying the subcommand and stderr.

use crate::domain::DomainError;
use crate::ports::{CommitIdentity, VcsPort};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct GitCli {
    repo_dir: PathBuf,
    remote: String,
    push_enabled: bool,
}

impl GitCli {
    pub fn new(repo_dir: impl AsRef<Path>, remote: impl Into<String>, push_enabled: bool) -> Self {
        Self {
            repo_dir: repo_dir.as_ref().to_path_buf(),
            remote: remote.into(),
            push_enabled,
        }
    }

    async fn git(&self, args: &[String]) -> Result<String, DomainError> {
        let command = subcommand(args);
        debug!(args = ?args, "git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()
            .await
            .map_err(|e| DomainError::Vcs {
                command: command.clone(),
                message: format!("spawn failed: {}", e),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(DomainError::Vcs {
                command,
                message: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// True while a merge is stopped on conflicts.
    async fn merge_in_progress(&self) -> bool {
        self.git(&args(["rev-parse", "-q", "--verify", "MERGE_HEAD"]))
            .await
            .is_ok()
    }

    async fn abort_merge(&self) -> Result<(), DomainError> {
        if self.merge_in_progress().await {
            self.git(&args(["merge", "--abort"])).await?;
            info!("unfinished merge aborted");
        }
        Ok(())
    }

    /// Pull, merge and push with `into` already checked out.
    async fn merge_checked_out(
        &self,
        from: &str,
        into: &str,
        identity: &CommitIdentity,
    ) -> Result<(), DomainError> {
        if self.push_enabled {
            self.git(&args(["pull", "--ff-only", &self.remote, into]))
                .await?;
        }
        let mut cmd = identity_args(identity);
        cmd.extend(args(["merge", "--no-edit", from]));
        self.git(&cmd).await?;
        self.push(into).await
    }
}

/// Git subcommand of an argument list, skipping `-c key=value` pairs.
pub fn subcommand(args: &[String]) -> String {
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        if arg == "-c" {
            it.next();
            continue;
        }
        return arg.clone();
    }
    String::new()
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// `-c user.name=.. -c user.email=..` prefix so the bot identity never touches repo config.
pub fn identity_args(identity: &CommitIdentity) -> Vec<String> {
    vec![
        "-c".to_string(),
        format!("user.name={}", identity.name),
        "-c".to_string(),
        format!("user.email={}", identity.email),
    ]
}

/// Paths listed by `git status --porcelain`. Renames yield the new path.
pub fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            path.trim_matches('"').to_string()
        })
        .collect()
}

#[async_trait::async_trait]
impl VcsPort for GitCli {
    async fn prepare(&self, branch: &str) -> Result<(), DomainError> {
        if self.merge_in_progress().await {
            warn!("working copy is mid-merge, aborting it");
            self.abort_merge().await?;
        }
        self.git(&args(["checkout", branch])).await?;
        if self.push_enabled {
            self.git(&args(["pull", "--ff-only", &self.remote, branch]))
                .await?;
        }
        info!(branch, "working copy ready");
        Ok(())
    }

    async fn changed_paths(&self, path: &Path) -> Result<Vec<String>, DomainError> {
        let path = path.to_string_lossy();
        let out = self
            .git(&args(["status", "--porcelain", "--untracked-files=all", "--", &path]))
            .await?;
        Ok(parse_porcelain(&out))
    }

    async fn stage(&self, path: &Path) -> Result<(), DomainError> {
        let path = path.to_string_lossy();
        self.git(&args(["add", "--all", "--", &path])).await?;
        Ok(())
    }

    async fn commit(
        &self,
        path: &Path,
        message: &str,
        identity: &CommitIdentity,
    ) -> Result<String, DomainError> {
        let path = path.to_string_lossy();
        let mut cmd = identity_args(identity);
        cmd.extend(args(["commit", "-m", message, "--", &path]));
        self.git(&cmd).await?;
        let id = self.git(&args(["rev-parse", "HEAD"])).await?;
        Ok(id.trim().to_string())
    }

    async fn push(&self, branch: &str) -> Result<(), DomainError> {
        if !self.push_enabled {
            info!(branch, "push disabled, skipping");
            return Ok(());
        }
        self.git(&args(["push", &self.remote, branch])).await?;
        info!(branch, remote = %self.remote, "pushed");
        Ok(())
    }

    async fn merge(
        &self,
        from: &str,
        into: &str,
        identity: &CommitIdentity,
    ) -> Result<(), DomainError> {
        self.git(&args(["checkout", into])).await?;
        if let Err(e) = self.merge_checked_out(from, into, identity).await {
            warn!(from, into, error = %e, "merge failed, restoring working copy");
            if let Err(abort) = self.abort_merge().await {
                warn!(error = %abort, "merge --abort failed");
            }
            if let Err(checkout) = self.git(&args(["checkout", from])).await {
                warn!(branch = from, error = %checkout, "could not return to branch");
            }
            return Err(e);
        }
        self.git(&args(["checkout", from])).await?;
        info!(from, into, "merged");
        Ok(())
    }
}
