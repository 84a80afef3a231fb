//! The shared interface of the two protocol variants.
//!
//! CSMA/CA and CSMA/CD differ only in collision policy; both are driven
//! through [`ContentionRound`] so the step driver never branches on the
//! protocol. All engine randomness flows through the [`RoundContext`] rng:
//! contender sampling here and counter draws in the scheduler, nowhere else.

use rand::seq::IteratorRandom;
use rand::{Rng, RngCore};

use super::backoff::BackoffScheduler;
use super::error::EngineError;
use super::medium::MediumArbiter;
use super::types::{ContenderRange, Device, DeviceId, Protocol};

/// Everything a round transition may read or mutate during one tick.
pub struct RoundContext<'a> {
    pub medium: &'a mut MediumArbiter,
    pub backoff: &'a mut BackoffScheduler,
    pub devices: &'a [Device],
    pub rng: &'a mut dyn RngCore,
    /// Event text for this tick, appended to by the round logic.
    pub log: &'a mut String,
}

impl RoundContext<'_> {
    pub fn device_name(&self, id: DeviceId) -> &str {
        self.devices.get(id as usize).map(|d| d.name.as_str()).unwrap_or("<unknown>")
    }

    /// Comma-separated device names for log lines.
    pub fn name_list(&self, ids: &[DeviceId]) -> String {
        ids.iter().map(|&id| self.device_name(id)).collect::<Vec<_>>().join(", ")
    }
}

/// One protocol variant's per-tick transition logic.
pub trait ContentionRound {
    fn protocol(&self) -> Protocol;

    /// Advance the round by exactly one tick, mutating the medium and the
    /// scheduler at most once each.
    fn resolve(&mut self, ctx: &mut RoundContext<'_>) -> Result<(), EngineError>;

    /// Devices the round currently holds queued for transmission (possibly
    /// without counters yet). Used by the driver's invariant checks.
    fn contenders(&self) -> &[DeviceId];

    /// Clear round-local state back to IDLE.
    fn reset(&mut self);
}

/// Draw a fresh contending set, uniformly `min..=max` devices from the
/// whole registry (fresh arrivals each empty round), sorted ascending so
/// later iteration and tie-breaks are deterministic.
pub fn draw_contenders(devices: &[Device], range: ContenderRange, rng: &mut dyn RngCore) -> Vec<DeviceId> {
    if devices.is_empty() || range.min > range.max {
        return Vec::new();
    }
    let max = range.max.min(devices.len());
    let min = range.min.min(max);
    let count = rng.gen_range(min..=max);
    let mut picked: Vec<DeviceId> = devices.iter().map(|d| d.id).choose_multiple(rng, count);
    picked.sort_unstable();
    picked
}
