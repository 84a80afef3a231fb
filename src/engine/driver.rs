//! The step driver: one discrete tick per call, invariants checked after
//! every transition.
//!
//! The driver owns every piece of engine state (device registry, medium,
//! scheduler, round, rng, tick counter); there are no ambient globals.
//! One instance per simulation run; observers read it through
//! [`StepDriver::current_state`] snapshots and the [`EventRecord`]s that
//! `step()` returns. The driver performs no randomness itself: the seeded
//! rng is handed to the round, and all draws happen in contender selection
//! and the backoff scheduler.

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::backoff::BackoffScheduler;
use super::ca::CsmaCa;
use super::cd::CsmaCd;
use super::error::EngineError;
use super::medium::MediumArbiter;
use super::round::{ContentionRound, RoundContext};
use super::types::{Classification, Device, EventRecord, MediumState, Protocol, RoundParams, Snapshot};

/// Upper bound on registered devices. The engine is a teaching-scale
/// simulator; scenarios beyond this are almost certainly misconfigured.
pub const MAX_DEVICES: usize = 256;

pub struct StepDriver {
    devices: Vec<Device>,
    medium: MediumArbiter,
    backoff: BackoffScheduler,
    round: Box<dyn ContentionRound + Send>,
    rng: StdRng,
    tick: u64,
}

impl StepDriver {
    /// Build a driver for the given protocol and device names.
    ///
    /// Configuration is validated here, before the first tick; failures are
    /// `InvalidConfiguration` and leave no engine behind. With `seed` the
    /// whole run is deterministic; without it the rng is taken from entropy.
    pub fn new(protocol: Protocol, device_names: &[String], params: RoundParams, seed: Option<u64>) -> Result<Self, EngineError> {
        validate_setup(device_names, &params)?;

        let devices: Vec<Device> = device_names
            .iter()
            .enumerate()
            .map(|(id, name)| Device {
                id: id as u32,
                name: name.clone(),
            })
            .collect();

        let round: Box<dyn ContentionRound + Send> = match protocol {
            Protocol::CsmaCa => Box::new(CsmaCa::new(params)),
            Protocol::CsmaCd => Box::new(CsmaCd::new(params)),
        };

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::info!("engine ready: {} with {} devices", protocol.label(), devices.len());

        Ok(Self {
            devices,
            medium: MediumArbiter::new(),
            backoff: BackoffScheduler::new(),
            round,
            rng,
            tick: 0,
        })
    }

    /// Driver with protocol-default parameters.
    pub fn with_defaults(protocol: Protocol, device_names: &[String], seed: Option<u64>) -> Result<Self, EngineError> {
        Self::new(protocol, device_names, RoundParams::for_protocol(protocol), seed)
    }

    /// Advance simulated time by exactly one tick.
    ///
    /// Invokes the active round's transition once, verifies the engine
    /// invariants, and returns the immutable record of what happened. An
    /// `InvariantViolation` means the engine state is no longer trustworthy
    /// and the run must halt; there is no rollback.
    pub fn step(&mut self) -> Result<EventRecord, EngineError> {
        self.tick += 1;
        let mut log = String::new();
        {
            let mut ctx = RoundContext {
                medium: &mut self.medium,
                backoff: &mut self.backoff,
                devices: &self.devices,
                rng: &mut self.rng,
                log: &mut log,
            };
            self.round.resolve(&mut ctx)?;
        }
        self.check_invariants()?;

        let record = EventRecord {
            tick: self.tick,
            transmitting: self.medium.transmitting().to_vec(),
            classification: self.medium.record().map(|r| r.classification),
            waiting: self.backoff.entries(),
            log,
        };
        log::debug!("tick {}: tx={:?} waiting={}", record.tick, record.transmitting, record.waiting.len());
        Ok(record)
    }

    /// Read-only snapshot for rendering. Never mutates; calling it twice
    /// without an intervening `step()` yields identical results.
    pub fn current_state(&self) -> Snapshot {
        Snapshot {
            medium: self.medium.sense(),
            transmitting: self.medium.transmitting().to_vec(),
            waiting: self.backoff.entries(),
        }
    }

    /// Clear all state back to IDLE/empty. Device registration and the rng
    /// stream are kept; the tick counter restarts at zero.
    pub fn reset(&mut self) {
        self.medium.release();
        self.backoff.clear();
        self.round.reset();
        self.tick = 0;
        log::info!("engine reset");
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn protocol(&self) -> Protocol {
        self.round.protocol()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device_name(&self, id: u32) -> Option<&str> {
        self.devices.get(id as usize).map(|d| d.name.as_str())
    }

    /// Verify the engine invariants after a tick.
    ///
    /// - The medium is busy exactly when a transmission record exists.
    /// - No device is both queued as a contender and on the medium.
    /// - A successful transmitter holds no backoff entry. (Colliding CD
    ///   transmitters do hold one; that entry is their recovery counter.)
    /// - Every referenced device id is registered.
    fn check_invariants(&self) -> Result<(), EngineError> {
        let busy = self.medium.sense() == MediumState::Busy;
        let occupied = self.medium.record().is_some();
        if busy != occupied {
            return Err(EngineError::InvariantViolation(format!("medium busy={} but record present={}", busy, occupied)));
        }

        if let Some(record) = self.medium.record() {
            if record.devices.is_empty() {
                return Err(EngineError::InvariantViolation("transmission record with no devices".into()));
            }
            for &id in &record.devices {
                if id as usize >= self.devices.len() {
                    return Err(EngineError::InvariantViolation(format!("unregistered device {} on the medium", id)));
                }
                if self.round.contenders().contains(&id) {
                    return Err(EngineError::InvariantViolation(format!("device {} is both contending and transmitting", id)));
                }
                if record.classification == Classification::Success && self.backoff.counter(id).is_some() {
                    return Err(EngineError::InvariantViolation(format!("successful transmitter {} still holds a backoff entry", id)));
                }
            }
        }

        for (id, _) in self.backoff.entries() {
            if id as usize >= self.devices.len() {
                return Err(EngineError::InvariantViolation(format!("unregistered device {} holds a backoff entry", id)));
            }
        }
        Ok(())
    }
}

fn validate_setup(device_names: &[String], params: &RoundParams) -> Result<(), EngineError> {
    if device_names.is_empty() {
        return Err(EngineError::InvalidConfiguration("at least one device must be registered".into()));
    }
    if device_names.len() > MAX_DEVICES {
        return Err(EngineError::InvalidConfiguration(format!(
            "device count {} exceeds the maximum of {}",
            device_names.len(),
            MAX_DEVICES
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for name in device_names {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration("device names must not be empty".into()));
        }
        if !seen.insert(name.as_str()) {
            return Err(EngineError::InvalidConfiguration(format!("duplicate device name: {}", name)));
        }
    }

    let contenders = &params.contenders;
    if contenders.min < 1 {
        return Err(EngineError::InvalidConfiguration("contenders.min must be at least 1".into()));
    }
    if contenders.min > contenders.max {
        return Err(EngineError::InvalidConfiguration(format!(
            "contenders.min {} exceeds contenders.max {}",
            contenders.min, contenders.max
        )));
    }
    if contenders.max > device_names.len() {
        return Err(EngineError::InvalidConfiguration(format!(
            "contenders.max {} exceeds the device count {}",
            contenders.max,
            device_names.len()
        )));
    }

    for (label, range) in [("initial-backoff", &params.initial), ("exponential-backoff", &params.exponential)] {
        if !range.is_valid() {
            return Err(EngineError::InvalidConfiguration(format!(
                "{} range [{},{}] (scale {}) is invalid",
                label, range.low, range.high, range.scale
            )));
        }
    }
    if params.exponential.upper_bound() <= params.initial.upper_bound() {
        return Err(EngineError::InvalidConfiguration(
            "exponential-backoff must reach beyond the initial-backoff upper bound".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backoff::BackoffRange;
    use crate::engine::types::ContenderRange;

    fn names(count: usize) -> Vec<String> {
        (1..=count).map(|n| format!("Device {}", n)).collect()
    }

    fn driver(protocol: Protocol, device_count: usize, seed: u64) -> StepDriver {
        StepDriver::with_defaults(protocol, &names(device_count), Some(seed)).unwrap()
    }

    #[test]
    fn setup_rejects_bad_configurations() {
        assert!(matches!(
            StepDriver::with_defaults(Protocol::CsmaCa, &[], Some(1)),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let duplicated = vec!["Device 1".to_string(), "Device 1".to_string()];
        assert!(matches!(
            StepDriver::with_defaults(Protocol::CsmaCa, &duplicated, Some(1)),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let mut params = RoundParams::ca();
        params.initial = BackoffRange::new(5, 2);
        assert!(matches!(
            StepDriver::new(Protocol::CsmaCa, &names(3), params, Some(1)),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let mut params = RoundParams::cd();
        params.contenders = ContenderRange { min: 3, max: 9 };
        assert!(matches!(
            StepDriver::new(Protocol::CsmaCd, &names(4), params, Some(1)),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn invariants_hold_across_long_runs_of_both_protocols() {
        for protocol in [Protocol::CsmaCa, Protocol::CsmaCd] {
            for seed in 0..5u64 {
                let mut driver = driver(protocol, 6, seed);
                for _ in 0..400 {
                    // step() checks every invariant internally; any breach
                    // surfaces as an error here.
                    let record = driver.step().unwrap();
                    let state = driver.current_state();
                    assert_eq!(state.medium == MediumState::Busy, !state.transmitting.is_empty());
                    assert_eq!(record.transmitting, state.transmitting);
                    assert_eq!(record.waiting, state.waiting);
                }
            }
        }
    }

    #[test]
    fn ca_never_places_more_than_one_device_on_the_medium() {
        let mut driver = driver(Protocol::CsmaCa, 6, 9);
        for _ in 0..400 {
            let record = driver.step().unwrap();
            assert!(record.transmitting.len() <= 1);
            assert_ne!(record.classification, Some(Classification::Collision));
        }
    }

    #[test]
    fn cd_collision_scenario_matches_the_contract() {
        // Three devices, the round pinned to draw exactly two contenders:
        // the first step must be a collision of both drawn devices with
        // fresh counters in [2,6].
        let mut params = RoundParams::cd();
        params.contenders = ContenderRange { min: 2, max: 2 };
        let mut driver = StepDriver::new(Protocol::CsmaCd, &names(3), params, Some(3)).unwrap();

        let record = driver.step().unwrap();
        assert_eq!(record.classification, Some(Classification::Collision));
        assert_eq!(record.transmitting.len(), 2);
        assert_eq!(record.waiting.len(), 2);
        for &(id, counter) in &record.waiting {
            assert!(record.transmitting.contains(&id));
            assert!((2..=6).contains(&counter));
        }
    }

    #[test]
    fn ca_single_contender_scenario_matches_the_contract() {
        let mut params = RoundParams::ca();
        params.contenders = ContenderRange { min: 1, max: 1 };
        let mut driver = StepDriver::new(Protocol::CsmaCa, &names(1), params, Some(5)).unwrap();

        let record = driver.step().unwrap();
        assert!(record.transmitting.is_empty());
        assert_eq!(record.waiting.len(), 1);
        let (_, counter) = record.waiting[0];
        assert!((2..=5).contains(&counter));

        // The device transmits exactly once its counter reaches zero.
        let mut transmitted_at = None;
        for _ in 0..counter {
            let record = driver.step().unwrap();
            transmitted_at = record.transmitting.first().copied();
        }
        assert_eq!(transmitted_at, Some(0));
    }

    #[test]
    fn driver_moves_to_a_background_thread() {
        // Continuous-run mode steps the driver from a spawned thread.
        let mut driver = driver(Protocol::CsmaCa, 4, 1);
        std::thread::spawn(move || driver.step().unwrap()).join().unwrap();
    }

    #[test]
    fn current_state_is_idempotent() {
        let mut driver = driver(Protocol::CsmaCd, 4, 21);
        for _ in 0..10 {
            driver.step().unwrap();
            assert_eq!(driver.current_state(), driver.current_state());
        }
    }

    #[test]
    fn reset_returns_to_the_empty_idle_state() {
        for protocol in [Protocol::CsmaCa, Protocol::CsmaCd] {
            let mut driver = driver(protocol, 5, 13);
            for _ in 0..37 {
                driver.step().unwrap();
            }
            driver.reset();
            let state = driver.current_state();
            assert_eq!(state.medium, MediumState::Free);
            assert!(state.transmitting.is_empty());
            assert!(state.waiting.is_empty());
            assert_eq!(driver.tick(), 0);
        }
    }

    #[test]
    fn event_records_carry_the_round_log() {
        let mut driver = driver(Protocol::CsmaCa, 6, 2);
        let record = driver.step().unwrap();
        assert!(record.log.contains("Sensing medium"));
        assert!(record.log.contains("Devices attempting"));
    }
}
