// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators shown alongside a
// forecast. None of these functions fail: insufficient history produces a
// neutral default (RSI 50, MACD 0, empty SMA/EMA series) so display never
// blocks on missing data.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod snapshot;

pub use ema::{calculate_ema, current_ema};
pub use macd::{calculate_macd, current_macd};
pub use rsi::{calculate_rsi, current_rsi, DEFAULT_RSI_PERIOD};
pub use sma::{calculate_sma, current_sma};
pub use snapshot::{IndicatorSnapshot, QuoteSummary, Sentiment};
