// =============================================================================
// Neural network building blocks
// =============================================================================
//
// Small CPU-only recurrent network used by the sequence predictor. Every
// layer works on one sample at a time; batching happens in `network`, which
// accumulates per-sample gradients before a single Adam step.

pub mod adam;
pub mod dense;
pub mod lstm;
pub mod network;

pub use network::{NdarrayBackend, SequenceNetwork};
