//! CSMA/CD: collision detection on the medium with abort and backoff.
//!
//! Round states per tick:
//! - IDLE → ACTIVE: with nothing transmitting and nothing waiting, a fresh
//!   contending set is drawn. A single contender transmits immediately;
//!   two or more assert simultaneously, the medium records the collision
//!   with every sender on it, and each collider draws a fresh counter.
//! - ACTIVE → IDLE/BACKOFF: any occupancy, success or collision, lasts
//!   exactly one tick and releases unconditionally.
//! - BACKOFF: duplicate nonzero counters are a repeat collision and are
//!   re-drawn from the exponential range, suppressing that tick's
//!   countdown. Otherwise zero-counter devices become ready and the rest
//!   tick down; ready devices attempt in id order, the first free sense
//!   wins, and a ready device that senses busy is re-armed with counter 1
//!   to retry on the next free tick.
//!
//! Unlike the CA variant this round can place more than one device on the
//! medium at once, so observers must handle multi-device records.

use super::error::EngineError;
use super::round::{ContentionRound, RoundContext, draw_contenders};
use super::types::{Classification, DeviceId, MediumState, Protocol, RoundParams};

pub struct CsmaCd {
    params: RoundParams,
}

impl CsmaCd {
    pub fn new(params: RoundParams) -> Self {
        Self { params }
    }

    /// Start a fresh round: one contender succeeds outright, several
    /// collide on the medium and fall into backoff.
    fn open_round(&mut self, ctx: &mut RoundContext<'_>) -> Result<(), EngineError> {
        let contending = draw_contenders(ctx.devices, self.params.contenders, ctx.rng);
        if contending.is_empty() {
            ctx.log.push_str("No device wishes to transmit.\n");
            return Ok(());
        }
        ctx.log.push_str("Sensing medium...\n");
        ctx.log.push_str(&format!("Devices attempting: {}\n", ctx.name_list(&contending)));

        if contending.len() == 1 {
            let id = contending[0];
            ctx.medium.occupy(contending, Classification::Success)?;
            ctx.log.push_str(&format!("{} transmitted successfully!\n", ctx.device_name(id)));
            return Ok(());
        }

        // Simultaneous assertion: everyone is on the medium for this tick
        // and everyone draws a recovery counter.
        ctx.backoff.assign(&contending, self.params.initial, ctx.rng);
        ctx.log.push_str("Collision detected!\n");
        ctx.log.push_str("Backoff timers assigned:\n");
        for &id in &contending {
            if let Some(value) = ctx.backoff.counter(id) {
                ctx.log.push_str(&format!("  {}: {} sec\n", ctx.device_name(id), value));
            }
        }
        ctx.medium.occupy(contending, Classification::Collision)?;
        Ok(())
    }

    /// One backoff tick: repeat-collision resolution first, countdown and
    /// transmission attempts otherwise.
    fn backoff_tick(&mut self, ctx: &mut RoundContext<'_>) -> Result<(), EngineError> {
        ctx.log.push_str("Backoff timers:\n");
        for (id, value) in ctx.backoff.entries() {
            ctx.log.push_str(&format!("  {}: {} sec\n", ctx.device_name(id), value));
        }

        // Collision resolution takes priority over countdown: identical
        // nonzero counters are re-drawn and nothing decrements this tick.
        let colliding = ctx.backoff.duplicates(false);
        if !colliding.is_empty() {
            ctx.backoff.redraw(&colliding, self.params.exponential, ctx.rng);
            ctx.log.push_str("Collision again due to identical backoff times! Applying binary exponential backoff.\n");
            for &id in &colliding {
                if let Some(value) = ctx.backoff.counter(id) {
                    ctx.log.push_str(&format!("  {}: {} sec\n", ctx.device_name(id), value));
                }
            }
            return Ok(());
        }

        let ready = ctx.backoff.ready();
        for (id, value) in ctx.backoff.entries() {
            if value > 0 {
                ctx.backoff.decrement(id);
            }
        }

        // Attempt the ready devices in id order: the first free sense wins
        // the medium, later ones find it busy and re-arm for an immediate
        // retry.
        for id in ready {
            if ctx.medium.sense() == MediumState::Free {
                ctx.backoff.remove(id);
                ctx.medium.occupy(vec![id], Classification::Success)?;
                ctx.log.push_str(&format!("{} transmitted successfully after backoff!\n", ctx.device_name(id)));
            } else {
                ctx.backoff.set(id, 1);
                ctx.log.push_str(&format!("{} tried to transmit but the medium was busy. Backing off again.\n", ctx.device_name(id)));
            }
        }
        Ok(())
    }
}

impl ContentionRound for CsmaCd {
    fn protocol(&self) -> Protocol {
        Protocol::CsmaCd
    }

    fn resolve(&mut self, ctx: &mut RoundContext<'_>) -> Result<(), EngineError> {
        // Success or collision, the medium releases after exactly one tick.
        if ctx.medium.sense() == MediumState::Busy {
            ctx.medium.release();
            ctx.log.push_str("Medium is now free.\n");
            return Ok(());
        }
        if ctx.backoff.is_empty() {
            return self.open_round(ctx);
        }
        self.backoff_tick(ctx)
    }

    fn contenders(&self) -> &[DeviceId] {
        // The contending set is transient in this variant: it moves onto
        // the medium or into the scheduler within the same tick.
        &[]
    }

    fn reset(&mut self) {}
}
