//! Type definitions for the contention engine.
//!
//! Contains the data structures shared across the engine:
//! - Device registry entries and the medium/classification enums
//! - The transmission record occupying the medium
//! - Per-tick event records and read-only snapshots for observers
//! - Protocol selection and per-protocol tuning parameters

use serde::Deserialize;

use super::backoff::BackoffRange;

/// Device identifier. Ids are assigned in registration order starting at 0
/// and fix the deterministic iteration/tie-break order everywhere in the
/// engine.
pub type DeviceId = u32;

/// A registered device. Devices have no persistent protocol state of their
/// own; counters and occupancy live in the scheduler and the arbiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
}

/// Observable state of the shared medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumState {
    Free,
    Busy,
}

/// Outcome tag of a transmission occupying the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A single device holds the medium.
    Success,
    /// Two or more devices asserted simultaneously (CSMA/CD only).
    Collision,
}

/// The devices currently occupying the medium. A success always carries
/// exactly one device; a CSMA/CD collision carries every colliding sender,
/// so observers must be able to render two or more simultaneous occupants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionRecord {
    pub devices: Vec<DeviceId>,
    pub classification: Classification,
}

/// Which collision policy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Carrier-sense with backoff before transmit (collision avoidance).
    CsmaCa,
    /// Carrier-sense with collision detection and abort.
    CsmaCd,
}

impl Protocol {
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::CsmaCa => "CSMA/CA",
            Protocol::CsmaCd => "CSMA/CD",
        }
    }
}

/// Immutable record of what happened in one tick, returned by the driver to
/// the observing collaborator. The log text is produced by the round logic,
/// not by presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// One-based tick number.
    pub tick: u64,
    /// Devices occupying the medium after this tick.
    pub transmitting: Vec<DeviceId>,
    /// Classification of the current occupancy, if any.
    pub classification: Option<Classification>,
    /// Devices holding backoff counters after this tick, ascending by id.
    pub waiting: Vec<(DeviceId, u32)>,
    /// Human-readable description of this tick's transition.
    pub log: String,
}

impl EventRecord {
    /// True for an idle tick: nothing transmitting, nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.transmitting.is_empty() && self.waiting.is_empty()
    }
}

/// Read-only state snapshot for rendering. Taking a snapshot never mutates
/// the engine; two snapshots without an intervening step are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub medium: MediumState,
    pub transmitting: Vec<DeviceId>,
    pub waiting: Vec<(DeviceId, u32)>,
}

/// How many devices contend in a fresh round. Both bounds are inclusive;
/// the draw is uniform in `min..=max`, clamped to the registered device
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContenderRange {
    pub min: usize,
    pub max: usize,
}

/// Tuning parameters of one protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundParams {
    /// Contending-set size drawn at each round start.
    pub contenders: ContenderRange,
    /// Range of the first counter assignment.
    pub initial: BackoffRange,
    /// Range re-drawn after a detected duplicate-counter collision. Always
    /// produces values with a strictly larger upper bound than `initial`.
    pub exponential: BackoffRange,
}

impl RoundParams {
    /// CSMA/CA defaults: initial draw in [2,5], exponential redraw
    /// `uniform(2,6) * 2`.
    pub fn ca() -> Self {
        Self {
            contenders: ContenderRange { min: 1, max: 4 },
            initial: BackoffRange::new(2, 5),
            exponential: BackoffRange::scaled(2, 6, 2),
        }
    }

    /// CSMA/CD defaults: initial draw in [2,6], exponential redraw in
    /// [2,12].
    pub fn cd() -> Self {
        Self {
            contenders: ContenderRange { min: 1, max: 4 },
            initial: BackoffRange::new(2, 6),
            exponential: BackoffRange::new(2, 12),
        }
    }

    pub fn for_protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::CsmaCa => Self::ca(),
            Protocol::CsmaCd => Self::cd(),
        }
    }
}
