pub mod atr;
pub mod fvg;
pub mod order_block;
pub mod structure;
pub mod swing;

pub use atr::{atr_last, atr_series};
pub use fvg::{detect_fvgs, Fvg, GapDirection};
pub use order_block::{detect_order_blocks, OrderBlock};
pub use structure::{detect_bos, detect_choch, detect_liquidity_sweep, Bias};
pub use swing::{swing_highs, swing_lows};
