//! Error taxonomy for the contention engine.

use thiserror::Error;

/// Failures the engine can report.
///
/// There is no partial-failure mode: a tick either completes its transition
/// or the engine reports `InvariantViolation` and the run must halt. An empty
/// round (no device wishing to transmit) is a valid tick, not an error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine detected an inconsistent state after a tick. This is a bug
    /// in the engine itself; callers should abort the run.
    #[error("engine invariant violated: {0}")]
    InvariantViolation(String),

    /// The supplied configuration was rejected at setup time and never
    /// reached the step loop.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
