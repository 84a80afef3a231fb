//! Contention-resolution engine core.
//!
//! Discrete-time simulation of shared-medium access: N devices contend for
//! one medium under either CSMA/CA (backoff before transmit) or CSMA/CD
//! (collision detection and abort). The engine integrates:
//! - The medium arbiter, single source of truth for busy/free state
//! - The backoff scheduler with binary exponential backoff
//! - The two protocol rounds behind one polymorphic interface
//! - The step driver advancing exactly one tick per call
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (devices, records, snapshots, params)
//! - `medium`: The shared medium and its occupancy record
//! - `backoff`: Per-device randomized wait counters
//! - `round`: The `ContentionRound` trait and contender sampling
//! - `ca` / `cd`: The two protocol variants
//! - `driver`: Tick orchestration, invariant checks, snapshots
//! - `error`: The engine error taxonomy
//!
//! ## Public API
//!
//! The main entry point is [`StepDriver`]: build one per simulation run,
//! call `step()` to advance time and `current_state()` to observe.

pub mod backoff;
pub mod ca;
pub mod cd;
pub mod driver;
pub mod error;
pub mod medium;
pub mod round;
pub mod types;

// Re-export the driver and the types observers need
pub use driver::StepDriver;
pub use error::EngineError;
pub use types::{Classification, Device, DeviceId, EventRecord, MediumState, Protocol, Snapshot, TransmissionRecord};
