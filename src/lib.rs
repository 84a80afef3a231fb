//! Discrete-time CSMA/CA and CSMA/CD contention-resolution engine.
//!
//! Simulates N named devices contending for one shared medium, one tick at
//! a time. Each tick the active protocol round senses the medium, assigns
//! or counts down randomized backoff timers, detects collisions, and moves
//! at most one transmission forward; the driver validates the engine's
//! invariants after every tick and hands back an [`EventRecord`] describing
//! what happened.
//!
//! The crate splits into:
//! - [`engine`]: the simulation core (medium, backoff, protocol rounds,
//!   step driver)
//! - [`scenario`]: JSON scenario files describing a run
//! - [`config`]: optional TOML run settings (pacing, duration)
//! - [`runner`]: continuous-run mode on a background thread

pub mod config;
pub mod engine;
pub mod runner;
pub mod scenario;

pub use engine::{
    Classification, Device, DeviceId, EngineError, EventRecord, MediumState, Protocol, Snapshot, StepDriver,
};
pub use runner::AutoRunner;
pub use scenario::Scenario;
