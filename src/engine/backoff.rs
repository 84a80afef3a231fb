//! Per-device randomized backoff counters.
//!
//! The scheduler owns the mapping from device id to remaining wait ticks.
//! Counters are drawn uniformly from a [`BackoffRange`], decremented while
//! a device waits, and re-drawn from a wider range when two devices collide
//! by holding the same value (binary exponential backoff). Entries exist
//! only while a device is waiting; a `BTreeMap` keeps iteration in
//! registration order so tie-breaks are reproducible.

use std::collections::{BTreeMap, HashMap};

use rand::{Rng, RngCore};
use serde::Deserialize;

use super::types::DeviceId;

/// An inclusive uniform draw range with an optional post-draw multiplier.
///
/// The multiplier models CSMA/CA's exponential redraw `uniform(2,6) * 2`
/// without a separate code path; plain ranges use `scale == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BackoffRange {
    pub low: u32,
    pub high: u32,
    #[serde(default = "default_scale")]
    pub scale: u32,
}

fn default_scale() -> u32 {
    1
}

impl BackoffRange {
    pub fn new(low: u32, high: u32) -> Self {
        Self { low, high, scale: 1 }
    }

    pub fn scaled(low: u32, high: u32, scale: u32) -> Self {
        Self { low, high, scale }
    }

    pub fn is_valid(&self) -> bool {
        self.low <= self.high && self.scale >= 1
    }

    /// Largest value this range can produce.
    pub fn upper_bound(&self) -> u32 {
        self.high.saturating_mul(self.scale)
    }

    /// Smallest value this range can produce.
    pub fn lower_bound(&self) -> u32 {
        self.low.saturating_mul(self.scale)
    }

    fn draw(&self, rng: &mut dyn RngCore) -> u32 {
        rng.gen_range(self.low..=self.high) * self.scale
    }
}

/// Assigns and decrements per-device wait counters.
#[derive(Debug, Default)]
pub struct BackoffScheduler {
    counters: BTreeMap<DeviceId, u32>,
}

impl BackoffScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh counter for each device. A no-op when the device list
    /// is empty or the range is inverted (`low > high`): an empty round is
    /// valid, not an error.
    pub fn assign(&mut self, devices: &[DeviceId], range: BackoffRange, rng: &mut dyn RngCore) {
        if devices.is_empty() || !range.is_valid() {
            return;
        }
        for &device in devices {
            self.counters.insert(device, range.draw(rng));
        }
    }

    /// Re-draw counters for devices that collided, from the wider
    /// exponential range. Only devices that already hold an entry are
    /// touched; the same empty/inverted guard as `assign` applies.
    pub fn redraw(&mut self, devices: &[DeviceId], range: BackoffRange, rng: &mut dyn RngCore) {
        if devices.is_empty() || !range.is_valid() {
            return;
        }
        for &device in devices {
            if self.counters.contains_key(&device) {
                self.counters.insert(device, range.draw(rng));
            }
        }
    }

    pub fn counter(&self, device: DeviceId) -> Option<u32> {
        self.counters.get(&device).copied()
    }

    pub fn set(&mut self, device: DeviceId, value: u32) {
        self.counters.insert(device, value);
    }

    /// Decrement a device's counter by one, saturating at zero. Returns the
    /// new value, or `None` if the device holds no entry.
    pub fn decrement(&mut self, device: DeviceId) -> Option<u32> {
        let counter = self.counters.get_mut(&device)?;
        *counter = counter.saturating_sub(1);
        Some(*counter)
    }

    pub fn remove(&mut self, device: DeviceId) -> Option<u32> {
        self.counters.remove(&device)
    }

    /// Devices whose counter value is shared with at least one other
    /// distinct device, ascending by id. A shared value is a collision;
    /// whether zero counts as a collidable value is protocol-dependent
    /// (CA includes it, CD ignores it).
    pub fn duplicates(&self, include_zero: bool) -> Vec<DeviceId> {
        let mut value_counts: HashMap<u32, u32> = HashMap::new();
        for &value in self.counters.values() {
            *value_counts.entry(value).or_insert(0) += 1;
        }
        self.counters
            .iter()
            .filter(|&(_, &value)| value_counts[&value] > 1 && (include_zero || value > 0))
            .map(|(&device, _)| device)
            .collect()
    }

    /// Devices whose counter has reached zero, ascending by id.
    pub fn ready(&self) -> Vec<DeviceId> {
        self.counters.iter().filter(|&(_, &value)| value == 0).map(|(&device, _)| device).collect()
    }

    /// All entries as `(device, counter)` pairs, ascending by id.
    pub fn entries(&self) -> Vec<(DeviceId, u32)> {
        self.counters.iter().map(|(&device, &value)| (device, value)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn assign_draws_within_range() {
        let mut scheduler = BackoffScheduler::new();
        let mut rng = rng();
        let devices: Vec<DeviceId> = (0..20).collect();
        scheduler.assign(&devices, BackoffRange::new(2, 5), &mut rng);
        assert_eq!(scheduler.len(), 20);
        for (_, value) in scheduler.entries() {
            assert!((2..=5).contains(&value), "counter {} outside [2,5]", value);
        }
    }

    #[test]
    fn assign_is_a_noop_for_empty_set_or_inverted_range() {
        let mut scheduler = BackoffScheduler::new();
        let mut rng = rng();
        scheduler.assign(&[], BackoffRange::new(2, 5), &mut rng);
        assert!(scheduler.is_empty());
        scheduler.assign(&[0, 1], BackoffRange::new(5, 2), &mut rng);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn scaled_redraw_exceeds_the_initial_upper_bound() {
        // CA exponential backoff: uniform(2,6) * 2 always lands in [4,12]
        // and only on even values.
        let mut scheduler = BackoffScheduler::new();
        let mut rng = rng();
        let devices: Vec<DeviceId> = (0..50).collect();
        scheduler.assign(&devices, BackoffRange::new(3, 3), &mut rng);
        scheduler.redraw(&devices, BackoffRange::scaled(2, 6, 2), &mut rng);
        for (_, value) in scheduler.entries() {
            assert!((4..=12).contains(&value), "redrawn counter {} outside [4,12]", value);
            assert_eq!(value % 2, 0, "scaled draw must be a multiple of the scale");
        }
    }

    #[test]
    fn redraw_only_touches_existing_entries() {
        let mut scheduler = BackoffScheduler::new();
        let mut rng = rng();
        scheduler.assign(&[1], BackoffRange::new(2, 6), &mut rng);
        scheduler.redraw(&[1, 2], BackoffRange::new(2, 12), &mut rng);
        assert!(scheduler.counter(2).is_none());
        assert!(scheduler.counter(1).is_some());
    }

    #[test]
    fn duplicates_respects_the_zero_filter() {
        let mut scheduler = BackoffScheduler::new();
        scheduler.set(0, 3);
        scheduler.set(1, 3);
        scheduler.set(2, 0);
        scheduler.set(3, 0);
        scheduler.set(4, 5);
        assert_eq!(scheduler.duplicates(true), vec![0, 1, 2, 3]);
        assert_eq!(scheduler.duplicates(false), vec![0, 1]);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let mut scheduler = BackoffScheduler::new();
        scheduler.set(0, 1);
        assert_eq!(scheduler.decrement(0), Some(0));
        assert_eq!(scheduler.decrement(0), Some(0));
        assert_eq!(scheduler.decrement(9), None);
    }

    #[test]
    fn ready_lists_zero_counters_in_id_order() {
        let mut scheduler = BackoffScheduler::new();
        scheduler.set(5, 0);
        scheduler.set(1, 0);
        scheduler.set(3, 2);
        assert_eq!(scheduler.ready(), vec![1, 5]);
    }
}
