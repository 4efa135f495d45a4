//! Creators keep regulated item types at their quotas
//!
//! Each creator owns a set of active regulator instances, one per
//! (template, context) pair, each with its own spawn timer. A creator only
//! scans its instances while `active`; it switches itself off once every
//! instance is at max and is switched back on by anything that frees quota.

mod building;
mod unit;

pub use building::{BuildingCreator, CenterSlot};
pub use unit::UnitCreator;

use rand::Rng;

use crate::core::config::RegulatorConfig;
use crate::core::range::FloatRange;
use crate::core::types::{BuildingId, FactionId};
use crate::npc::regulator::Regulator;

/// Runtime context a regulator template is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegulatorContext {
    Faction(FactionId),
    Center { faction: FactionId, center: BuildingId },
}

/// Who is asking for items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    /// The creator's own spawn timer
    Auto,
    /// Another AI component
    OnDemand,
}

/// Summary of one creation request (or one creator tick)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Items handed off to the physical-creation collaborator
    pub created: u32,
    /// Stopped early for lack of resources or a producer; retried next cycle
    pub deferred: bool,
    /// The host reported the population cap; the batch was aborted
    pub population_capped: bool,
    /// The regulator forbids this kind of request
    pub rejected: bool,
}

impl CreateOutcome {
    pub fn merge(&mut self, other: CreateOutcome) {
        self.created += other.created;
        self.deferred |= other.deferred;
        self.population_capped |= other.population_capped;
        self.rejected |= other.rejected;
    }
}

/// A regulator bound to a context, with its own spawn countdown
#[derive(Debug, Clone)]
pub struct ActiveRegulator {
    regulator: Regulator,
    context: RegulatorContext,
    spawn_reload: FloatRange,
    spawn_timer: f32,
}

impl ActiveRegulator {
    /// The first countdown also includes the template's "start after" delay
    pub fn new<R: Rng + ?Sized>(
        config: &RegulatorConfig,
        context: RegulatorContext,
        rng: &mut R,
    ) -> Self {
        let regulator = Regulator::new(config, rng);
        let spawn_timer = config.spawn_reload.sample(rng) + config.start_after.sample(rng);
        Self {
            regulator,
            context,
            spawn_reload: config.spawn_reload,
            spawn_timer,
        }
    }

    pub fn regulator(&self) -> &Regulator {
        &self.regulator
    }

    pub fn regulator_mut(&mut self) -> &mut Regulator {
        &mut self.regulator
    }

    pub fn context(&self) -> RegulatorContext {
        self.context
    }

    pub fn code(&self) -> &str {
        self.regulator.code()
    }

    pub fn spawn_timer(&self) -> f32 {
        self.spawn_timer
    }

    /// Count down; on expiry the timer is re-armed from the reload range
    pub fn tick_timer<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R) -> bool {
        self.spawn_timer -= dt;
        if self.spawn_timer > 0.0 {
            return false;
        }
        self.spawn_timer = self.spawn_reload.sample(rng);
        true
    }
}
