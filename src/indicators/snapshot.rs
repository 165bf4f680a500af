// =============================================================================
// Indicator Snapshot — display-ready summary of a price series
// =============================================================================
//
// Bundles the headline indicator values shown next to a chart: RSI(14), the
// MACD line, the latest SMA(20), average volume, and a quote summary (last
// close, day-over-day change, sentiment bucket).
//
// Like every indicator function, the snapshot never fails: short histories
// produce the documented neutral defaults.

use serde::Serialize;

use super::macd::current_macd;
use super::rsi::{current_rsi, DEFAULT_RSI_PERIOD};
use super::sma::current_sma;
use crate::types::PriceSeries;

/// SMA window shown in the snapshot.
pub const SNAPSHOT_SMA_PERIOD: usize = 20;

/// Sentiment bucket derived from the latest percentage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sentiment {
    VeryBullish,
    Bullish,
    Neutral,
    Bearish,
    VeryBearish,
}

impl Sentiment {
    pub fn from_change_pct(change_pct: f64) -> Self {
        if change_pct > 2.0 {
            Self::VeryBullish
        } else if change_pct > 0.5 {
            Self::Bullish
        } else if change_pct < -2.0 {
            Self::VeryBearish
        } else if change_pct < -0.5 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryBullish => write!(f, "VERY_BULLISH"),
            Self::Bullish => write!(f, "BULLISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::VeryBearish => write!(f, "VERY_BEARISH"),
        }
    }
}

/// Last close and its change against the previous close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSummary {
    pub last_close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub sentiment: Sentiment,
}

impl QuoteSummary {
    /// Returns `None` with fewer than two bars or a zero previous close.
    pub fn from_series(series: &PriceSeries) -> Option<Self> {
        let bars = series.bars();
        if bars.len() < 2 {
            return None;
        }

        let last_close = bars[bars.len() - 1].close;
        let prev_close = bars[bars.len() - 2].close;
        if prev_close == 0.0 {
            return None;
        }

        let change = last_close - prev_close;
        let change_pct = change / prev_close * 100.0;

        Some(Self {
            last_close,
            change,
            change_pct,
            sentiment: Sentiment::from_change_pct(change_pct),
        })
    }
}

/// Headline indicators for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd: f64,
    /// Latest SMA(20), `0.0` with fewer than 20 bars.
    pub sma20: f64,
    pub average_volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<QuoteSummary>,
}

impl IndicatorSnapshot {
    pub fn compute(series: &PriceSeries) -> Self {
        let closes = series.closes();
        let volumes = series.volumes();

        let average_volume = if volumes.is_empty() {
            0.0
        } else {
            volumes.iter().sum::<f64>() / volumes.len() as f64
        };

        Self {
            rsi: current_rsi(&closes, DEFAULT_RSI_PERIOD),
            macd: current_macd(&closes),
            sma20: current_sma(&closes, SNAPSHOT_SMA_PERIOD).unwrap_or(0.0),
            average_volume,
            quote: QuoteSummary::from_series(series),
        }
    }
}
