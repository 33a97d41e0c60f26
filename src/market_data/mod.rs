pub mod cache;
pub mod provider;

pub use cache::CandleCache;
pub use provider::{HttpChartProvider, MarketDataProvider, StaticProvider};
