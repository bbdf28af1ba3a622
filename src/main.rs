//! Wiring & DI. Entry point: bootstrap adapters, inject into services, dispatch the command.
//! No business logic here.

use clap::Parser;
use dotenv::dotenv;
use energy_pulse::adapters::market::{EiaAdapter, YahooChartAdapter};
use energy_pulse::adapters::persistence::{CsvDataset, SqliteStore, StateJson};
use energy_pulse::adapters::tools::ExternalScriptRefresher;
use energy_pulse::adapters::ui::cli::{Cli, Commands, DbCommand, JobCommand};
use energy_pulse::adapters::ui::tui::TuiInputPort;
use energy_pulse::adapters::ui::{progress, report};
use energy_pulse::adapters::vcs::GitCli;
use energy_pulse::domain::{Commodity, TICKERS};
use energy_pulse::ports::{
    CommitIdentity, DatasetPort, EnergyStorePort, InputPort, RefreshPort, StatePort,
};
use energy_pulse::shared::config::AppConfig;
use energy_pulse::usecases::{
    DataPipeline, IngestService, JobScheduler, MarketUpdateService, ModelService, PipelineStatus,
    UpdateJob,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cli = Cli::parse();
    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "config could not be loaded, using defaults");
            AppConfig::default()
        }
    };

    let dataset: Arc<dyn DatasetPort> = Arc::new(CsvDataset::new(cfg.market_dir()));

    match cli.command {
        Some(Commands::Update) => {
            let market = market_service(&cfg, Arc::clone(&dataset), true);
            let refreshed = market.update_all().await.map_err(anyhow_err)?;
            report::print_refresh(&refreshed);
        }
        Some(Commands::Job(JobCommand::Run)) => {
            let job = update_job(&cfg, refresh_step(&cfg, Arc::clone(&dataset)));
            let state = open_state(&cfg).await?;
            let started_at = chrono::Utc::now();
            let result = job.run().await;
            let record = energy_pulse::domain::JobRecord {
                started_at,
                finished_at: chrono::Utc::now(),
                outcome: result.as_ref().ok().cloned(),
                error: result.as_ref().err().map(|e| e.to_string()),
            };
            if let Err(e) = state.record_run(record).await {
                warn!(error = %e, "could not record job run");
            }
            let outcome = result.map_err(anyhow_err)?;
            report::print_job_outcome(&outcome);
        }
        Some(Commands::Job(JobCommand::Schedule { cron })) => {
            let job = Arc::new(update_job(&cfg, refresh_step(&cfg, Arc::clone(&dataset))));
            let state = open_state(&cfg).await?;
            let expr = cron.unwrap_or_else(|| cfg.cron_or_default());
            info!(cron = %expr, "scheduling update job");
            let scheduler = JobScheduler::new(&expr, job, state).map_err(anyhow_err)?;
            scheduler.run().await.map_err(anyhow_err)?;
        }
        Some(Commands::Job(JobCommand::Status)) => {
            let state = open_state(&cfg).await?;
            let last = state.last_run().await.map_err(anyhow_err)?;
            let next = energy_pulse::usecases::scheduler::parse_schedule(&cfg.cron_or_default())
                .ok()
                .and_then(|s| s.upcoming(chrono::Utc).next());
            report::print_job_record(last.as_ref(), next);
        }
        Some(Commands::Db(DbCommand::Init)) => {
            let store = open_store(&cfg).await?;
            println!("Database ready at {}", store.path().display());
        }
        Some(Commands::Db(DbCommand::Info { table })) => {
            let store = open_store(&cfg).await?;
            let info = store.table_info(&table).await.map_err(anyhow_err)?;
            report::print_table_info(&table, &info);
        }
        Some(Commands::Ingest { start, end }) => {
            let Some(api_key) = cfg.eia_api_key.clone() else {
                anyhow::bail!("Set EIA_API_KEY (env or .env). Get one at https://www.eia.gov/opendata/");
            };
            let store = open_store(&cfg).await?;
            let eia = Arc::new(EiaAdapter::new(api_key, cfg.eia_rate_limit_or_default()));
            let results = IngestService::new(eia, store).ingest_all(start, end).await;
            report::print_ingest(&results);
            if results.iter().all(|r| r.error.is_some()) {
                anyhow::bail!("every EIA feed failed");
            }
        }
        Some(Commands::Process { commodity }) => {
            let commodity = Commodity::parse(&commodity);
            let store = open_store(&cfg).await?;
            let pipeline_report = DataPipeline::new(store.clone())
                .run_pipeline(&commodity)
                .await;
            report::print_pipeline(&pipeline_report);
            if pipeline_report.status == PipelineStatus::Failed {
                anyhow::bail!("pipeline failed for {}", commodity);
            }
            if cfg.auto_retrain_enabled() {
                let models = model_service(&cfg, store, Arc::clone(&dataset));
                match models.forecast(&commodity, None, true).await {
                    Ok(run) => info!(model_id = ?run.model_id, "model retrained"),
                    Err(e) => warn!(error = %e, "auto-retrain skipped"),
                }
            }
        }
        Some(Commands::Forecast {
            commodity,
            horizon,
            no_register,
        }) => {
            let store = open_store(&cfg).await?;
            let models = model_service(&cfg, store, Arc::clone(&dataset));
            let run = models
                .forecast(&Commodity::parse(&commodity), horizon, !no_register)
                .await
                .map_err(anyhow_err)?;
            report::print_forecast(&run);
        }
        Some(Commands::Models { prefix }) => {
            let store = open_store(&cfg).await?;
            let models = model_service(&cfg, store, Arc::clone(&dataset));
            let list = models
                .list_models(prefix.as_deref())
                .await
                .map_err(anyhow_err)?;
            report::print_models(&list);
        }
        Some(Commands::Risk { ticker }) => {
            let store = open_store(&cfg).await?;
            let models = model_service(&cfg, store, Arc::clone(&dataset));
            let metrics = models
                .assess_ticker_risk(&ticker)
                .await
                .map_err(anyhow_err)?;
            report::print_risk(&ticker.to_uppercase(), &metrics);
        }
        Some(Commands::Validate { ticker }) => {
            let store = open_store(&cfg).await?;
            let models = model_service(&cfg, store, Arc::clone(&dataset));
            let validation = models.validate_ticker(&ticker).await.map_err(anyhow_err)?;
            report::print_validation(&ticker.to_uppercase(), &validation);
        }
        None => {
            energy_pulse::adapters::ui::init_ui(&cfg.app_name_or_default());
            let market = Arc::new(market_service(&cfg, Arc::clone(&dataset), true));
            let job = Arc::new(update_job(&cfg, refresh_step(&cfg, Arc::clone(&dataset))));
            let store = open_store(&cfg).await?;
            let pipeline = Arc::new(DataPipeline::new(store.clone()));
            let models = Arc::new(model_service(&cfg, store, Arc::clone(&dataset)));

            let input_port: Arc<dyn InputPort> =
                Arc::new(TuiInputPort::new(market, job, pipeline, models));
            input_port.run().await.map_err(anyhow_err)?;
        }
    }

    Ok(())
}

fn anyhow_err(e: energy_pulse::domain::DomainError) -> anyhow::Error {
    anyhow::anyhow!("{}", e)
}

fn market_service(
    cfg: &AppConfig,
    dataset: Arc<dyn DatasetPort>,
    with_progress: bool,
) -> MarketUpdateService {
    let yahoo = Arc::new(YahooChartAdapter::new(cfg.yahoo_rate_limit_or_default()));
    let service = MarketUpdateService::new(yahoo, dataset, cfg.history_period_or_default());
    if with_progress {
        service.with_progress(progress::refresh_bar(TICKERS.len()))
    } else {
        service
    }
}

/// External command when ENERGY_PULSE_REFRESH_COMMAND is set, built-in refresh otherwise.
fn refresh_step(cfg: &AppConfig, dataset: Arc<dyn DatasetPort>) -> Arc<dyn RefreshPort> {
    match cfg.refresh_command.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(command) => Arc::new(ExternalScriptRefresher::new(
            command,
            cfg.repo_dir_or_default(),
        )),
        None => Arc::new(market_service(cfg, dataset, false)),
    }
}

fn update_job(cfg: &AppConfig, refresh: Arc<dyn RefreshPort>) -> UpdateJob {
    let vcs = Arc::new(GitCli::new(
        cfg.repo_dir_or_default(),
        cfg.remote_or_default(),
        cfg.push_enabled(),
    ));
    info!(
        repo = %cfg.repo_dir_or_default().display(),
        data_dir = %cfg.data_dir_or_default().display(),
        dev = %cfg.dev_branch_or_default(),
        stable = %cfg.stable_branch_or_default(),
        push = cfg.push_enabled(),
        "update job configured"
    );
    UpdateJob::new(
        refresh,
        vcs,
        cfg.data_dir_or_default(),
        cfg.dev_branch_or_default(),
        cfg.stable_branch_or_default(),
        CommitIdentity {
            name: cfg.bot_name_or_default(),
            email: cfg.bot_email_or_default(),
        },
    )
}

async fn open_state(cfg: &AppConfig) -> anyhow::Result<Arc<dyn StatePort>> {
    let state = StateJson::new(cfg.state_path_or_default());
    state.load().await.map_err(anyhow_err)?;
    Ok(Arc::new(state))
}

async fn open_store(cfg: &AppConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(cfg.database_path_or_default())
        .await
        .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?;
    Ok(Arc::new(store))
}

fn model_service(
    cfg: &AppConfig,
    store: Arc<SqliteStore>,
    dataset: Arc<dyn DatasetPort>,
) -> ModelService {
    let energy: Arc<dyn EnergyStorePort> = store.clone();
    ModelService::new(energy, store, dataset, cfg.models_dir_or_default())
}
