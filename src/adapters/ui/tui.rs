//! Implements InputPort. Inquire-based interactive menu over the use cases.

use super::report;
use crate::domain::{Commodity, DomainError, TICKERS};
use crate::ports::InputPort;
use crate::usecases::{DataPipeline, MarketUpdateService, ModelService, UpdateJob};
use async_trait::async_trait;
use inquire::{Select, Text};
use std::fmt;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Refresh,
    RunJob,
    Process,
    Forecast,
    Models,
    Risk,
    Validate,
    Exit,
}

impl MenuItem {
    const ALL: [MenuItem; 8] = [
        MenuItem::Refresh,
        MenuItem::RunJob,
        MenuItem::Process,
        MenuItem::Forecast,
        MenuItem::Models,
        MenuItem::Risk,
        MenuItem::Validate,
        MenuItem::Exit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::Refresh => "Refresh market data",
            MenuItem::RunJob => "Run update job (commit + merge)",
            MenuItem::Process => "Process commodity data",
            MenuItem::Forecast => "Forecast commodity",
            MenuItem::Models => "List registered models",
            MenuItem::Risk => "Assess ticker risk",
            MenuItem::Validate => "Validate ticker prices",
            MenuItem::Exit => "Exit",
        };
        f.write_str(label)
    }
}

fn prompt_err(e: inquire::InquireError) -> DomainError {
    DomainError::InvalidInput(e.to_string())
}

fn select_ticker() -> Result<String, DomainError> {
    let options: Vec<String> = TICKERS
        .iter()
        .map(|t| format!("{:<6} {}", t.symbol, t.name))
        .collect();
    let choice = Select::new("Ticker", options).prompt().map_err(prompt_err)?;
    Ok(choice
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string())
}

fn ask_commodity() -> Result<Commodity, DomainError> {
    let name = Text::new("Commodity:")
        .with_default("natural_gas")
        .prompt()
        .map_err(prompt_err)?;
    Ok(Commodity::parse(&name))
}

pub struct TuiInputPort {
    market: Arc<MarketUpdateService>,
    job: Arc<UpdateJob>,
    pipeline: Arc<DataPipeline>,
    models: Arc<ModelService>,
}

impl TuiInputPort {
    pub fn new(
        market: Arc<MarketUpdateService>,
        job: Arc<UpdateJob>,
        pipeline: Arc<DataPipeline>,
        models: Arc<ModelService>,
    ) -> Self {
        Self {
            market,
            job,
            pipeline,
            models,
        }
    }

    async fn handle(&self, item: MenuItem) -> Result<(), DomainError> {
        match item {
            MenuItem::Refresh => report::print_refresh(&self.market.update_all().await?),
            MenuItem::RunJob => report::print_job_outcome(&self.job.run().await?),
            MenuItem::Process => {
                let commodity = ask_commodity()?;
                report::print_pipeline(&self.pipeline.run_pipeline(&commodity).await);
            }
            MenuItem::Forecast => {
                let commodity = ask_commodity()?;
                report::print_forecast(&self.models.forecast(&commodity, None, true).await?);
            }
            MenuItem::Models => report::print_models(&self.models.list_models(None).await?),
            MenuItem::Risk => {
                let symbol = select_ticker()?;
                report::print_risk(&symbol, &self.models.assess_ticker_risk(&symbol).await?);
            }
            MenuItem::Validate => {
                let symbol = select_ticker()?;
                report::print_validation(&symbol, &self.models.validate_ticker(&symbol).await?);
            }
            MenuItem::Exit => {}
        }
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let item = Select::new("What next?", MenuItem::ALL.to_vec())
                .prompt()
                .map_err(prompt_err)?;
            if item == MenuItem::Exit {
                return Ok(());
            }
            // A failed action returns to the menu.
            if let Err(e) = self.handle(item).await {
                error!(error = %e, "action failed");
                eprintln!("Error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_ends_with_exit() {
        assert_eq!(MenuItem::ALL.last(), Some(&MenuItem::Exit));
        assert_eq!(MenuItem::Refresh.to_string(), "Refresh market data");
    }
}
