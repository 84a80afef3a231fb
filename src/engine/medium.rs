//! The shared medium and its occupancy record.

use super::error::EngineError;
use super::types::{Classification, DeviceId, MediumState, TransmissionRecord};

/// Single source of truth for the busy/free state of the shared medium.
///
/// The medium is busy exactly when a transmission record is present, so the
/// busy-iff-occupied invariant holds by construction. Every device reads the
/// same state through `sense()` before acting; only the round logic mutates
/// it, once per tick at most.
#[derive(Debug, Default)]
pub struct MediumArbiter {
    record: Option<TransmissionRecord>,
}

impl MediumArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carrier sense: the current state of the medium. Pure read.
    pub fn sense(&self) -> MediumState {
        if self.record.is_some() { MediumState::Busy } else { MediumState::Free }
    }

    /// Grant the medium to `devices`. Callers must have sensed the medium
    /// free in the same tick; occupying a busy medium or occupying with no
    /// devices is an engine bug, not a recoverable condition.
    pub fn occupy(&mut self, devices: Vec<DeviceId>, classification: Classification) -> Result<(), EngineError> {
        if self.record.is_some() {
            return Err(EngineError::InvariantViolation("occupy() called while the medium is busy".into()));
        }
        if devices.is_empty() {
            return Err(EngineError::InvariantViolation("occupy() called with an empty device set".into()));
        }
        self.record = Some(TransmissionRecord { devices, classification });
        Ok(())
    }

    /// Clear the medium, returning the finished transmission record.
    pub fn release(&mut self) -> Option<TransmissionRecord> {
        self.record.take()
    }

    pub fn record(&self) -> Option<&TransmissionRecord> {
        self.record.as_ref()
    }

    /// Devices currently on the medium, empty when free.
    pub fn transmitting(&self) -> &[DeviceId] {
        self.record.as_ref().map(|r| r.devices.as_slice()).unwrap_or(&[])
    }
}
