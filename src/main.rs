// =============================================================================
// Aurora Forecast — Demo Entry Point
// =============================================================================
//
// Generates a synthetic daily series, prints its indicator snapshot and runs
// one forecast through the fallback chain, logging progress as it arrives.
// =============================================================================

use anyhow::Context;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use aurora_forecast::forecast::ForecastEvent;
use aurora_forecast::synthetic::generate_demo_series;
use aurora_forecast::{ForecastConfig, ForecastOrchestrator, IndicatorSnapshot, ModelKind};

const CONFIG_PATH: &str = "forecast_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Aurora Forecast — Starting Up                     ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = ForecastConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ForecastConfig::default()
    });

    if let Ok(model) = std::env::var("FORECAST_MODEL") {
        config.model = model
            .parse::<ModelKind>()
            .with_context(|| format!("FORECAST_MODEL={model}"))?;
    }
    if let Ok(horizon) = std::env::var("FORECAST_HORIZON") {
        config.horizon_days = horizon
            .trim()
            .parse()
            .with_context(|| format!("FORECAST_HORIZON={horizon} is not a day count"))?;
    }
    config.validate()?;

    info!(
        model = %config.model,
        horizon_days = config.horizon_days,
        sequence_enabled = config.enable_sequence_model,
        "Forecast configuration"
    );

    // ── 2. Price history ─────────────────────────────────────────────────
    let today = chrono::Local::now().date_naive();
    let series = generate_demo_series(
        &config.demo_symbol,
        config.demo_days,
        config.sequence.seed,
        today,
    )?;

    let snapshot = IndicatorSnapshot::compute(&series);
    info!(
        symbol = series.symbol(),
        bars = series.len(),
        last_close = series.last_close(),
        rsi = %format!("{:.1}", snapshot.rsi),
        macd = %format!("{:.3}", snapshot.macd),
        sma20 = %format!("{:.2}", snapshot.sma20),
        avg_volume = snapshot.average_volume,
        "Indicator snapshot"
    );
    if let Some(quote) = &snapshot.quote {
        info!(
            change = %format!("{:+.2}", quote.change),
            change_pct = %format!("{:+.2}%", quote.change_pct),
            sentiment = %quote.sentiment,
            "Latest quote"
        );
    }

    // ── 3. Orchestrator & event log ──────────────────────────────────────
    let mut orchestrator = ForecastOrchestrator::new(&config);
    let mut events = orchestrator.subscribe();
    orchestrator.set_series(series.clone());

    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ForecastEvent::Started { run_id, model, .. } => {
                    info!(%run_id, model = %model, "Forecast started");
                }
                ForecastEvent::Progress { progress, .. } => {
                    info!(
                        model = %progress.model,
                        epoch = %format!("{}/{}", progress.epoch, progress.total_epochs),
                        percent = %format!("{:.0}", progress.percent()),
                        loss = ?progress.loss,
                        val_loss = ?progress.val_loss,
                        "Training"
                    );
                }
                ForecastEvent::State { state, .. } => {
                    debug!(state = %state, "Forecast state");
                }
                ForecastEvent::Fallback { from, to, reason, .. } => {
                    warn!(from = %from, to = %to, reason = %reason, "Falling back");
                }
                ForecastEvent::Completed { prediction, .. } => {
                    info!(model = %prediction.model_name, "Forecast ready");
                }
                ForecastEvent::Failed { reason, .. } => {
                    warn!(reason = %reason, "Forecast failed");
                }
            }
        }
    });

    // ── 4. Run ───────────────────────────────────────────────────────────
    let request = config.request()?;
    let outcome = orchestrator.run(request).await;
    drop(orchestrator);
    let _ = event_log.await;

    let prediction = outcome.context("forecast run failed")?;

    info!(
        model = %prediction.model_name,
        confidence = %format!("{:.1}%", prediction.confidence),
        "Forecast summary"
    );
    for checkpoint in prediction.checkpoints(series.last_close()) {
        info!(
            day = checkpoint.day,
            date = %checkpoint.date,
            value = %format!("{:.2}", checkpoint.value),
            change_pct = %format!("{:+.2}%", checkpoint.change_pct),
            "Checkpoint"
        );
    }

    Ok(())
}
