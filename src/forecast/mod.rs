// =============================================================================
// Forecast Module
// =============================================================================
//
// Run-level control: the fallback state machine and the orchestrator that
// drives predictors through it.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{ForecastEvent, ForecastOrchestrator, PredictionSlot, SupersedeHandle};
pub use state::{fallback_after, fallback_chain, ForecastState};
