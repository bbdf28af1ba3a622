//! Market and energy data providers.

pub mod eia;
pub mod yahoo;

pub use eia::EiaAdapter;
pub use yahoo::YahooChartAdapter;
