//! Application configuration. Provider credentials, paths, job settings.

use serde::Deserialize;
use std::path::PathBuf;

/// Daily at 06:00 UTC.
pub const DEFAULT_CRON: &str = "0 6 * * *";
pub const DEFAULT_DATA_DIR: &str = "data/financial";
pub const DEFAULT_DATABASE_PATH: &str = "data/database.db";
pub const DEFAULT_BOT_NAME: &str = "github-actions[bot]";
pub const DEFAULT_BOT_EMAIL: &str = "github-actions[bot]@users.noreply.github.com";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Update job (ENERGY_PULSE_*)
    // ─────────────────────────────────────────────────────────────────────────
    /// Repository the job commits into. Read from ENERGY_PULSE_REPO_DIR.
    #[serde(default)]
    pub repo_dir: Option<String>,

    /// Financial-data directory, relative to the repository. Read from ENERGY_PULSE_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    #[serde(default)]
    pub dev_branch: Option<String>,

    #[serde(default)]
    pub stable_branch: Option<String>,

    #[serde(default)]
    pub remote: Option<String>,

    /// Push commits and merges to the remote (default true). Read from ENERGY_PULSE_PUSH.
    #[serde(default)]
    pub push: Option<bool>,

    /// Cron expression for `job schedule` (5, 6 or 7 fields, UTC). Read from ENERGY_PULSE_CRON.
    #[serde(default)]
    pub cron: Option<String>,

    /// External refresh command run through the shell instead of the built-in refresh.
    #[serde(default)]
    pub refresh_command: Option<String>,

    #[serde(default)]
    pub bot_name: Option<String>,

    #[serde(default)]
    pub bot_email: Option<String>,

    /// Where the last job run is recorded. Read from ENERGY_PULSE_STATE_PATH.
    #[serde(default)]
    pub state_path: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Market data refresh
    // ─────────────────────────────────────────────────────────────────────────
    /// History period requested per ticker (default "2y").
    #[serde(default)]
    pub history_period: Option<String>,

    /// Yahoo requests per minute (default 60).
    #[serde(default)]
    pub yahoo_rate_limit: Option<u32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Data providers and storage (unprefixed .env keys)
    // ─────────────────────────────────────────────────────────────────────────
    /// Read from EIA_API_KEY.
    #[serde(default)]
    pub eia_api_key: Option<String>,

    /// Read from ALPHA_VANTAGE_KEY.
    #[serde(default)]
    pub alpha_vantage_key: Option<String>,

    /// Optional cloud storage. Read from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY / AWS_BUCKET_NAME.
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    #[serde(default)]
    pub aws_bucket_name: Option<String>,

    /// SQLite database file. Read from DATABASE_PATH.
    #[serde(default)]
    pub database_path: Option<String>,

    /// Directory for serialized models (default data/models).
    #[serde(default)]
    pub models_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Application metadata and limits
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,

    /// EIA requests per minute. Read from EIA_RATE_LIMIT.
    #[serde(default)]
    pub eia_rate_limit: Option<u32>,

    /// Read from ALPHA_VANTAGE_RATE_LIMIT.
    #[serde(default)]
    pub alpha_vantage_rate_limit: Option<u32>,

    /// Days between model retraining. Read from MODEL_RETRAIN_FREQUENCY.
    #[serde(default)]
    pub model_retrain_frequency: Option<u32>,

    /// Register a freshly fitted forecast model after each pipeline run. Read from AUTO_RETRAIN.
    #[serde(default)]
    pub auto_retrain: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("ENERGY_PULSE").try_parsing(true));
        if let Ok(path) = std::env::var("ENERGY_PULSE_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;

        // Provider keys are read directly (no prefix) so the .env template keeps its names.
        fn string_var(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.trim().is_empty())
        }
        fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
        }
        cfg.eia_api_key = cfg.eia_api_key.or_else(|| string_var("EIA_API_KEY"));
        cfg.alpha_vantage_key = cfg.alpha_vantage_key.or_else(|| string_var("ALPHA_VANTAGE_KEY"));
        cfg.aws_access_key_id = cfg.aws_access_key_id.or_else(|| string_var("AWS_ACCESS_KEY_ID"));
        cfg.aws_secret_access_key = cfg
            .aws_secret_access_key
            .or_else(|| string_var("AWS_SECRET_ACCESS_KEY"));
        cfg.aws_bucket_name = cfg.aws_bucket_name.or_else(|| string_var("AWS_BUCKET_NAME"));
        cfg.database_path = cfg.database_path.or_else(|| string_var("DATABASE_PATH"));
        cfg.app_name = cfg.app_name.or_else(|| string_var("APP_NAME"));
        cfg.app_version = cfg.app_version.or_else(|| string_var("APP_VERSION"));
        if let Some(n) = parsed_var("EIA_RATE_LIMIT") {
            cfg.eia_rate_limit = Some(n);
        }
        if let Some(n) = parsed_var("ALPHA_VANTAGE_RATE_LIMIT") {
            cfg.alpha_vantage_rate_limit = Some(n);
        }
        if let Some(n) = parsed_var("MODEL_RETRAIN_FREQUENCY") {
            cfg.model_retrain_frequency = Some(n);
        }
        if let Some(b) = parsed_var("AUTO_RETRAIN") {
            cfg.auto_retrain = Some(b);
        }
        Ok(cfg)
    }

    pub fn repo_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.repo_dir.as_deref().unwrap_or("."))
    }

    /// Financial-data directory relative to the repository root.
    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    /// Absolute-or-cwd-relative location of the yfinance CSVs.
    pub fn market_dir(&self) -> PathBuf {
        self.repo_dir_or_default()
            .join(self.data_dir_or_default())
            .join("yfinance")
    }

    pub fn dev_branch_or_default(&self) -> String {
        self.dev_branch.clone().unwrap_or_else(|| "dev".to_string())
    }

    pub fn stable_branch_or_default(&self) -> String {
        self.stable_branch.clone().unwrap_or_else(|| "main".to_string())
    }

    pub fn remote_or_default(&self) -> String {
        self.remote.clone().unwrap_or_else(|| "origin".to_string())
    }

    pub fn push_enabled(&self) -> bool {
        self.push.unwrap_or(true)
    }

    pub fn cron_or_default(&self) -> String {
        self.cron.clone().unwrap_or_else(|| DEFAULT_CRON.to_string())
    }

    pub fn bot_name_or_default(&self) -> String {
        self.bot_name
            .clone()
            .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string())
    }

    pub fn bot_email_or_default(&self) -> String {
        self.bot_email
            .clone()
            .unwrap_or_else(|| DEFAULT_BOT_EMAIL.to_string())
    }

    pub fn state_path_or_default(&self) -> PathBuf {
        self.state_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.repo_dir_or_default().join("data").join("job_state.json"))
    }

    pub fn history_period_or_default(&self) -> String {
        self.history_period
            .clone()
            .unwrap_or_else(|| "2y".to_string())
    }

    /// Returns Yahoo requests per minute. Defaults to 60.
    pub fn yahoo_rate_limit_or_default(&self) -> u32 {
        self.yahoo_rate_limit.unwrap_or(60).max(1)
    }

    /// Returns EIA requests per minute. Defaults to 60.
    pub fn eia_rate_limit_or_default(&self) -> u32 {
        self.eia_rate_limit.unwrap_or(60).max(1)
    }

    pub fn database_path_or_default(&self) -> PathBuf {
        PathBuf::from(
            self.database_path
                .as_deref()
                .unwrap_or(DEFAULT_DATABASE_PATH),
        )
    }

    pub fn models_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.models_dir.as_deref().unwrap_or("data/models"))
    }

    pub fn app_name_or_default(&self) -> String {
        self.app_name
            .clone()
            .unwrap_or_else(|| "Energy Pulse".to_string())
    }

    pub fn auto_retrain_enabled(&self) -> bool {
        self.auto_retrain.unwrap_or(false)
    }

    /// Returns true if the EIA key is present.
    pub fn is_eia_configured(&self) -> bool {
        self.eia_api_key.is_some()
    }

    /// Returns true if all three cloud storage settings are present.
    pub fn is_cloud_storage_configured(&self) -> bool {
        self.aws_access_key_id.is_some()
            && self.aws_secret_access_key.is_some()
            && self.aws_bucket_name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.cron_or_default(), "0 6 * * *");
        assert_eq!(cfg.dev_branch_or_default(), "dev");
        assert_eq!(cfg.stable_branch_or_default(), "main");
        assert!(cfg.push_enabled());
        assert_eq!(
            cfg.market_dir(),
            PathBuf::from(".").join("data/financial").join("yfinance")
        );
        assert_eq!(cfg.database_path_or_default(), PathBuf::from("data/database.db"));
        assert!(!cfg.is_eia_configured());
        assert!(!cfg.is_cloud_storage_configured());
    }

    #[test]
    fn test_rate_limits_never_zero() {
        let cfg = AppConfig {
            yahoo_rate_limit: Some(0),
            ..Default::default()
        };
        assert_eq!(cfg.yahoo_rate_limit_or_default(), 1);
        assert_eq!(cfg.eia_rate_limit_or_default(), 60);
    }
}
