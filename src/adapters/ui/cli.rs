//! Command-line interface definitions.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// energy-pulse - refresh energy market data, version it in git, process and forecast it.
#[derive(Parser, Debug)]
#[command(name = "energy-pulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// No subcommand opens the interactive menu
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download daily history for every catalog ticker into the data directory
    Update,

    /// Scheduled update job
    #[command(subcommand)]
    Job(JobCommand),

    /// Energy database maintenance
    #[command(subcommand)]
    Db(DbCommand),

    /// Fetch EIA series into the database (requires EIA_API_KEY)
    Ingest {
        /// First date to fetch (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date to fetch (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Run the processing pipeline for a commodity
    Process {
        /// natural_gas, crude_oil, electricity, or any `<name>` with a `<name>_data` table
        commodity: String,
    },

    /// Fit and run the price forecast for a commodity
    Forecast {
        commodity: String,
        /// Periods ahead (default 30)
        #[arg(long)]
        horizon: Option<usize>,
        /// Do not add the fitted model to the registry
        #[arg(long)]
        no_register: bool,
    },

    /// List registered models
    Models {
        /// Only models whose name starts with this
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Risk metrics for a catalog ticker
    Risk { ticker: String },

    /// Price sanity checks for a catalog ticker
    Validate { ticker: String },
}

/// Subcommands for `energy-pulse job`
#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Run the job once now (manual dispatch)
    Run,
    /// Run the job on its cron schedule until interrupted
    Schedule {
        /// Override the configured cron expression
        #[arg(long)]
        cron: Option<String>,
    },
    /// Show the last recorded run and the next scheduled one
    Status,
}

/// Subcommands for `energy-pulse db`
#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Create the database file and schema
    Init,
    /// Show columns and row count of a table
    Info { table: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_run() {
        let cli = Cli::try_parse_from(["energy-pulse", "job", "run"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Job(JobCommand::Run))));
    }

    #[test]
    fn test_parse_forecast_flags() {
        let cli = Cli::try_parse_from([
            "energy-pulse",
            "forecast",
            "natgas",
            "--horizon",
            "7",
            "--no-register",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Forecast {
                commodity,
                horizon,
                no_register,
            }) => {
                assert_eq!(commodity, "natgas");
                assert_eq!(horizon, Some(7));
                assert!(no_register);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_is_menu() {
        let cli = Cli::try_parse_from(["energy-pulse"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_ingest_dates() {
        let cli =
            Cli::try_parse_from(["energy-pulse", "ingest", "--start", "2024-01-01"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Ingest { start: Some(_), end: None })
        ));
    }
}
