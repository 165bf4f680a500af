// =============================================================================
// Shared types used across the Aurora forecasting core
// =============================================================================

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// A single daily OHLCV bar supplied by the market-data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Chronologically ordered price history, validated on construction.
///
/// Bars are strictly ascending by date (no duplicates) and every numeric
/// field is finite and non-negative. The series is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, ForecastError> {
        if bars.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        for (idx, bar) in bars.iter().enumerate() {
            if !bar.is_well_formed() {
                return Err(ForecastError::InvalidSeries(format!(
                    "bar {idx} ({}) has a negative or non-finite field",
                    bar.date
                )));
            }
        }

        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ForecastError::InvalidSeries(format!(
                "dates must be strictly ascending: {} followed by {}",
                w[0].date, w[1].date
            )));
        }

        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn last_close(&self) -> f64 {
        self.bars.last().map(|b| b.close).unwrap_or(0.0)
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars.last().map(|b| b.date).unwrap_or_default()
    }

    /// Calendar dates for a forecast of `horizon` days: last date + 1 ..= horizon.
    pub fn future_dates(&self, horizon: usize) -> Result<Vec<NaiveDate>, ForecastError> {
        let last = self.last_date();
        (1..=horizon as u64)
            .map(|offset| {
                last.checked_add_days(Days::new(offset)).ok_or_else(|| {
                    ForecastError::InvalidSeries(format!(
                        "forecast date overflow {offset} days after {last}"
                    ))
                })
            })
            .collect()
    }
}

// =============================================================================
// Model selection
// =============================================================================

/// The three interchangeable forecasting strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Sequence,
    Linear,
    MovingAverage,
}

impl ModelKind {
    /// Human-readable model label carried in every [`Prediction`].
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Sequence => "LSTM Neural Network",
            Self::Linear => "Linear Regression",
            Self::MovingAverage => "Moving Average",
        }
    }
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::Sequence
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Linear => write!(f, "linear"),
            Self::MovingAverage => write!(f, "moving_average"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" | "lstm" => Ok(Self::Sequence),
            "linear" => Ok(Self::Linear),
            "moving_average" | "movingaverage" | "sma" => Ok(Self::MovingAverage),
            other => Err(ForecastError::InvalidRequest(format!(
                "unknown model '{other}'"
            ))),
        }
    }
}

// =============================================================================
// Forecast output
// =============================================================================

/// Result of one successful forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Forecast values, one per horizon day, all >= 0.
    pub values: Vec<f64>,
    /// Forecast dates, consecutive days starting the day after the series ends.
    pub dates: Vec<NaiveDate>,
    /// Bounded heuristic confidence, in percent.
    pub confidence: f64,
    pub model: ModelKind,
    pub model_name: String,
}

impl Prediction {
    pub fn new(
        model: ModelKind,
        values: Vec<f64>,
        dates: Vec<NaiveDate>,
        confidence: f64,
    ) -> Self {
        Self {
            values,
            dates,
            confidence,
            model,
            model_name: model.display_name().to_string(),
        }
    }

    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// 7-day, 14-day and final-day values with their change vs `last_close`.
    ///
    /// Short horizons collapse onto the final value, so a 5-day forecast
    /// reports day 5 for all three checkpoints. A checkpoint without a
    /// matching date is skipped.
    pub fn checkpoints(&self, last_close: f64) -> Vec<Checkpoint> {
        let Some(last_idx) = self.values.len().checked_sub(1) else {
            return Vec::new();
        };

        [6usize, 13, last_idx]
            .iter()
            .filter_map(|&i| {
                let idx = i.min(last_idx);
                let date = *self.dates.get(idx)?;
                let value = self.values[idx];
                let change_pct = if last_close > 0.0 {
                    (value - last_close) / last_close * 100.0
                } else {
                    0.0
                };
                Some(Checkpoint {
                    day: idx + 1,
                    date,
                    value,
                    change_pct,
                })
            })
            .collect()
    }
}

/// A single horizon checkpoint of a [`Prediction`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkpoint {
    pub day: usize,
    pub date: NaiveDate,
    pub value: f64,
    pub change_pct: f64,
}

/// Per-epoch training notification. Observed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingProgress {
    pub model: ModelKind,
    /// 1-based epoch (or pacing step) index.
    pub epoch: usize,
    pub total_epochs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f64>,
}

impl TrainingProgress {
    pub fn step(model: ModelKind, epoch: usize, total_epochs: usize) -> Self {
        Self {
            model,
            epoch,
            total_epochs,
            loss: None,
            val_loss: None,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total_epochs == 0 {
            return 0.0;
        }
        self.epoch as f64 / self.total_epochs as f64 * 100.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = PriceSeries::new("X", vec![]).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { actual: 0, .. }));
    }

    #[test]
    fn duplicate_dates_rejected() {
        let err = PriceSeries::new("X", vec![bar(day(1), 1.0), bar(day(1), 2.0)]).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSeries(_)));
    }

    #[test]
    fn descending_dates_rejected() {
        let err = PriceSeries::new("X", vec![bar(day(2), 1.0), bar(day(1), 2.0)]).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSeries(_)));
    }

    #[test]
    fn negative_and_nan_values_rejected() {
        assert!(PriceSeries::new("X", vec![bar(day(1), -1.0)]).is_err());
        assert!(PriceSeries::new("X", vec![bar(day(1), f64::NAN)]).is_err());
    }

    #[test]
    fn future_dates_start_after_last_bar() {
        let series = PriceSeries::new("X", vec![bar(day(30), 1.0), bar(day(31), 2.0)]).unwrap();
        let dates = series.future_dates(3).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 4, 3).unwrap(),
            ]
        );
    }

    #[test]
    fn model_kind_parses_aliases() {
        assert_eq!("LSTM".parse::<ModelKind>().unwrap(), ModelKind::Sequence);
        assert_eq!("sma".parse::<ModelKind>().unwrap(), ModelKind::MovingAverage);
        assert_eq!("linear".parse::<ModelKind>().unwrap(), ModelKind::Linear);
        assert!("arima".parse::<ModelKind>().is_err());
    }

    #[test]
    fn model_kind_serde_is_snake_case() {
        let json = serde_json::to_string(&ModelKind::MovingAverage).unwrap();
        assert_eq!(json, "\"moving_average\"");
    }

    #[test]
    fn checkpoints_clamp_to_horizon() {
        let dates: Vec<NaiveDate> = (1..=5).map(day).collect();
        let p = Prediction::new(ModelKind::Linear, vec![10.0, 11.0, 12.0, 13.0, 15.0], dates, 50.0);
        let cps = p.checkpoints(10.0);
        assert_eq!(cps.len(), 3);
        assert!(cps.iter().all(|c| c.day == 5));
        assert!((cps[0].change_pct - 50.0).abs() < 1e-10);
    }

    #[test]
    fn checkpoints_skip_missing_dates() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let dates: Vec<NaiveDate> = (1..=10).map(day).collect();
        let p = Prediction::new(ModelKind::MovingAverage, values, dates, 60.0);
        let cps = p.checkpoints(100.0);
        assert_eq!(cps.len(), 1);
        assert_eq!(cps[0].day, 7);
        assert_eq!(cps[0].date, day(7));
    }

    #[test]
    fn progress_percent() {
        let p = TrainingProgress::step(ModelKind::Sequence, 3, 15);
        assert!((p.percent() - 20.0).abs() < 1e-10);
    }
}
