//! Prism Worker Library
//!
//! Ties the key policy, the derivative engine and an object store together
//! into the per-object pipeline run for every trigger record.

pub mod error;
pub mod pipeline;
pub mod telemetry;

// Re-export commonly used types
pub use error::PipelineError;
pub use pipeline::{Orchestrator, ProcessOutcome};
pub use telemetry::init_tracing;
