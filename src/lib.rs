//! energy-pulse: scheduled energy-market data refresh, versioned in git, with processing and forecasting.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
