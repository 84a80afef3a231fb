//! CSMA/CA: collision avoidance through pre-transmission backoff.
//!
//! Round states per tick:
//! - IDLE → SENSING: with nothing transmitting and nothing waiting, a fresh
//!   contending set is drawn from the whole registry.
//! - SENSING → BACKOFF: on a free sense every contender draws an initial
//!   counter; duplicate draws collide and are re-drawn from the exponential
//!   range before any countdown. On a busy sense the contenders stay queued
//!   without counters and re-sense on a later tick.
//! - BACKOFF: counters tick down on free-sensing ticks; a busy tick
//!   finishes the current transmission and holds every counter.
//! - TRANSMIT: the lowest-id device whose counter reached zero wins the
//!   medium alone; a transmission lasts exactly one tick.
//!
//! Collisions in this variant happen only in the counter negotiation, never
//! on the medium itself.

use super::error::EngineError;
use super::round::{ContentionRound, RoundContext, draw_contenders};
use super::types::{Classification, DeviceId, MediumState, Protocol, RoundParams};

pub struct CsmaCa {
    params: RoundParams,
    /// Contenders of the current round in ascending id order. Devices keep
    /// their place here while backing off and leave it when they transmit.
    queue: Vec<DeviceId>,
}

impl CsmaCa {
    pub fn new(params: RoundParams) -> Self {
        Self { params, queue: Vec::new() }
    }

    /// Start a fresh round: draw contenders and probe the medium once.
    fn open_round(&mut self, ctx: &mut RoundContext<'_>) {
        self.queue = draw_contenders(ctx.devices, self.params.contenders, ctx.rng);
        if self.queue.is_empty() {
            ctx.log.push_str("No device wishes to transmit.\n");
            return;
        }
        ctx.log.push_str("Sensing medium...\n");
        ctx.log.push_str(&format!("Devices attempting: {}\n", ctx.name_list(&self.queue)));
        self.sense_and_assign(ctx);
    }

    /// Probe the medium for the queued contenders. A free sense assigns the
    /// initial counters (and resolves duplicate-draw collisions on the
    /// spot); a busy sense leaves the queue counterless until a later tick.
    /// `resolve` settles a busy medium before calling this, so with one-tick
    /// transmissions the busy arm holds the queue rather than acting.
    fn sense_and_assign(&mut self, ctx: &mut RoundContext<'_>) {
        if ctx.medium.sense() == MediumState::Busy {
            ctx.log.push_str("Medium busy. Devices waiting...\n");
            return;
        }

        ctx.backoff.assign(&self.queue, self.params.initial, ctx.rng);
        ctx.log.push_str("Medium free. Devices start backoff timers.\n");
        ctx.log.push_str("Backoff timers assigned:\n");
        for &id in &self.queue {
            if let Some(value) = ctx.backoff.counter(id) {
                ctx.log.push_str(&format!("  {}: {} sec\n", ctx.device_name(id), value));
            }
        }

        // Identical draws are this protocol's collision: re-draw from the
        // wider range before any countdown begins.
        let colliding = ctx.backoff.duplicates(true);
        if !colliding.is_empty() {
            ctx.backoff.redraw(&colliding, self.params.exponential, ctx.rng);
            ctx.log.push_str("Collision detected due to identical backoff times! Applying binary exponential backoff.\n");
            for &id in &colliding {
                if let Some(value) = ctx.backoff.counter(id) {
                    ctx.log.push_str(&format!("  {}: {} sec\n", ctx.device_name(id), value));
                }
            }
        }
    }

    /// Tick down the waiting devices and elect at most one transmitter.
    ///
    /// Runs only on ticks whose opening sense was FREE: `resolve` settles a
    /// busy medium first, leaving every counter untouched for that tick, so
    /// counters only move while the channel is idle.
    fn countdown(&mut self, ctx: &mut RoundContext<'_>) -> Result<(), EngineError> {
        ctx.log.push_str("Backoff timers:\n");
        let mut ready: Vec<DeviceId> = Vec::new();
        for &id in &self.queue {
            if let Some(value) = ctx.backoff.decrement(id) {
                ctx.log.push_str(&format!("  {}: {} sec\n", ctx.device_name(id), value));
                if value == 0 {
                    ready.push(id);
                }
            }
        }

        // Only one device may transmit per tick; ties go to the lowest id
        // and the rest stay in backoff at zero for the next free tick.
        if let Some(&winner) = ready.first() {
            self.queue.retain(|&id| id != winner);
            ctx.backoff.remove(winner);
            ctx.medium.occupy(vec![winner], Classification::Success)?;
            ctx.log.push_str(&format!("{} is transmitting now!\n", ctx.device_name(winner)));
        }
        Ok(())
    }

    /// A transmission lasts exactly one tick; the next tick finishes it.
    fn finish_transmission(&mut self, ctx: &mut RoundContext<'_>) {
        if let Some(record) = ctx.medium.release() {
            for &id in &record.devices {
                ctx.log.push_str(&format!("{} finished transmission.\n", ctx.device_name(id)));
            }
        }
        if self.queue.is_empty() && ctx.backoff.is_empty() {
            ctx.log.push_str("Medium is now free. No devices waiting.\n");
        } else {
            ctx.log.push_str("Medium is now free. Devices are still waiting to transmit.\n");
        }
    }
}

impl ContentionRound for CsmaCa {
    fn protocol(&self) -> Protocol {
        Protocol::CsmaCa
    }

    fn resolve(&mut self, ctx: &mut RoundContext<'_>) -> Result<(), EngineError> {
        if ctx.medium.sense() == MediumState::Busy {
            self.finish_transmission(ctx);
            return Ok(());
        }
        if self.queue.is_empty() && ctx.backoff.is_empty() {
            self.open_round(ctx);
            return Ok(());
        }
        if ctx.backoff.is_empty() {
            // Contenders queued on an earlier busy sense re-sense now.
            self.sense_and_assign(ctx);
            return Ok(());
        }
        self.countdown(ctx)
    }

    fn contenders(&self) -> &[DeviceId] {
        &self.queue
    }

    fn reset(&mut self) {
        self.queue.clear();
    }
}
