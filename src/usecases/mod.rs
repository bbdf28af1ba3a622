//! Application use cases. Orchestrate domain logic via ports.

pub mod ingest_service;
pub mod market_update;
pub mod model_service;
pub mod pipeline;
pub mod processor;
pub mod scheduler;
pub mod update_job;

pub use ingest_service::IngestService;
pub use market_update::MarketUpdateService;
pub use model_service::ModelService;
pub use pipeline::{DataPipeline, PipelineReport, PipelineStatus};
pub use scheduler::JobScheduler;
pub use update_job::UpdateJob;
