pub mod h4_strategy;
pub mod sl_tp;

pub use h4_strategy::{H4Strategy, TradeUpdate, TradeUpdateAction};
pub use sl_tp::{Adjustment, AdjustmentKind, MaeMfeStats, SlTpEstimator};
