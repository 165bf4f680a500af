// =============================================================================
// Forecast Configuration — model selection, horizon and training parameters
// =============================================================================
//
// Every tunable of a forecast run lives here. The file is plain JSON and every
// field carries a serde default, so an empty `{}` or an older file missing new
// keys still loads.
//
// Persistence uses an atomic tmp + rename so a crash mid-write never leaves a
// truncated config behind.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ForecastError;
use crate::predictors::SequenceModelSpec;
use crate::types::ModelKind;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_horizon_days() -> usize {
    30
}

fn default_progress_pacing_ms() -> u64 {
    100
}

fn default_demo_symbol() -> String {
    "DEMO".to_string()
}

fn default_demo_days() -> usize {
    100
}

fn default_sequence_length() -> usize {
    10
}

fn default_min_margin() -> usize {
    5
}

fn default_hidden_units() -> usize {
    20
}

fn default_dense_units() -> usize {
    10
}

fn default_epochs() -> usize {
    15
}

fn default_learning_rate() -> f64 {
    0.001
}

fn default_max_batch_size() -> usize {
    8
}

fn default_validation_split() -> f64 {
    0.1
}

// =============================================================================
// SequenceParams
// =============================================================================

/// Architecture and training schedule of the recurrent model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceParams {
    /// Past closes fed to the model per sample.
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    /// Extra closes required beyond `sequence_length` before training.
    #[serde(default = "default_min_margin")]
    pub min_margin: usize,

    #[serde(default = "default_hidden_units")]
    pub hidden_units: usize,

    #[serde(default = "default_dense_units")]
    pub dense_units: usize,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Upper bound on the mini-batch size; half the samples otherwise.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Trailing share of samples held out for validation loss.
    #[serde(default = "default_validation_split")]
    pub validation_split: f64,

    /// Fixes weight init and shuffling; `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            min_margin: default_min_margin(),
            hidden_units: default_hidden_units(),
            dense_units: default_dense_units(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            max_batch_size: default_max_batch_size(),
            validation_split: default_validation_split(),
            seed: None,
        }
    }
}

impl SequenceParams {
    /// Shortest series the sequence model will train on.
    pub fn min_series_len(&self) -> usize {
        self.sequence_length + self.min_margin
    }

    pub fn model_spec(&self) -> SequenceModelSpec {
        SequenceModelSpec {
            sequence_length: self.sequence_length,
            hidden_units: self.hidden_units,
            dense_units: self.dense_units,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

// =============================================================================
// ForecastConfig
// =============================================================================

/// Top-level configuration for forecast runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Model tried first; failures walk the fallback chain from here.
    #[serde(default)]
    pub model: ModelKind,

    /// Days to forecast.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: usize,

    /// When false the sequence predictor reports `ModelUnavailable` and
    /// requests for it fall through to the linear model.
    #[serde(default = "default_true")]
    pub enable_sequence_model: bool,

    /// Delay before each simulated progress step of the linear and
    /// moving-average predictors. 0 disables pacing.
    #[serde(default = "default_progress_pacing_ms")]
    pub progress_pacing_ms: u64,

    /// Symbol label for the generated demo series.
    #[serde(default = "default_demo_symbol")]
    pub demo_symbol: String,

    /// Length of the generated demo series.
    #[serde(default = "default_demo_days")]
    pub demo_days: usize,

    #[serde(default)]
    pub sequence: SequenceParams,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            horizon_days: default_horizon_days(),
            enable_sequence_model: true,
            progress_pacing_ms: default_progress_pacing_ms(),
            demo_symbol: default_demo_symbol(),
            demo_days: default_demo_days(),
            sequence: SequenceParams::default(),
        }
    }
}

impl ForecastConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read forecast config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse forecast config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid forecast config in {}", path.display()))?;

        info!(
            path = %path.display(),
            model = %config.model,
            horizon_days = config.horizon_days,
            "forecast config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` via `.tmp` + rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise forecast config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "forecast config saved (atomic)");
        Ok(())
    }

    /// Reject settings no predictor can run with.
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            bail!("horizon_days must be at least 1");
        }
        let seq = &self.sequence;
        if seq.epochs == 0 {
            bail!("sequence.epochs must be at least 1");
        }
        if seq.sequence_length == 0 || seq.hidden_units == 0 || seq.dense_units == 0 {
            bail!("sequence layer sizes must be non-zero");
        }
        if seq.min_margin == 0 {
            bail!("sequence.min_margin must be at least 1");
        }
        if seq.max_batch_size == 0 {
            bail!("sequence.max_batch_size must be at least 1");
        }
        if !(0.0..1.0).contains(&seq.validation_split) {
            bail!(
                "sequence.validation_split must be in [0, 1), got {}",
                seq.validation_split
            );
        }
        if !(seq.learning_rate.is_finite() && seq.learning_rate > 0.0) {
            bail!("sequence.learning_rate must be positive, got {}", seq.learning_rate);
        }
        Ok(())
    }

    pub fn progress_pacing(&self) -> Duration {
        Duration::from_millis(self.progress_pacing_ms)
    }

    /// The request described by this config.
    pub fn request(&self) -> Result<ForecastRequest, ForecastError> {
        ForecastRequest::new(self.model, self.horizon_days)
    }
}

// =============================================================================
// ForecastRequest
// =============================================================================

/// One caller request: which model to try first and how far ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub model: ModelKind,
    pub horizon_days: usize,
}

impl ForecastRequest {
    pub fn new(model: ModelKind, horizon_days: usize) -> Result<Self, ForecastError> {
        if horizon_days == 0 {
            return Err(ForecastError::InvalidRequest(
                "horizon_days must be at least 1".into(),
            ));
        }
        Ok(Self {
            model,
            horizon_days,
        })
    }
}
