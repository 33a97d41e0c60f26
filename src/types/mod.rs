pub mod audit;
pub mod candle;
pub mod context;
pub mod signal;
pub mod timeframe;
pub mod trade;

pub use audit::{ErrorLog, ErrorSeverity, Heartbeat};
pub use candle::{Candle, CandleSeries};
pub use context::MultiTimeframeContext;
pub use signal::{Direction, Signal};
pub use timeframe::Interval;
pub use trade::{CloseType, Trade, TradeState};
