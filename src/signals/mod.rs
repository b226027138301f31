//! Signal detection: classifies 8-K item combinations for predictive M&A
//! value, layers insider trade direction on top, and separately detects
//! standalone insider buying clusters from Form 4 data alone.

pub mod classifier;
pub mod cluster;
pub mod feed;
pub mod trade;

pub use classifier::{classify_signal_level, compute_combined_signal, is_ipo_filing, item_name};
pub use cluster::{BuyerDetail, InsiderClusterEngine, InsiderClusterSignal};
pub use feed::{InsiderContext, SignalFeed, SignalItem, TopInsiderActivity};
pub use trade::{classify_trade, classify_trades_batch, is_bearish_trade, is_bullish_trade};
