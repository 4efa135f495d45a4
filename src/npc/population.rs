//! Population manager - keeps housing ahead of the army
//!
//! Target of population-cap escalations from the unit creator. On an
//! escalation, or when the periodic check finds too few free slots, it asks
//! the building creator for one more population building in the capital.

use rand::Rng;

use crate::core::config::PopulationConfig;
use crate::core::error::{AiError, Result};
use crate::core::range::ReloadTimer;
use crate::core::types::FactionId;
use crate::npc::creator::{BuildingCreator, RequestSource};
use crate::npc::placement::PlacementResolver;
use crate::world::FactionWorld;

pub struct PopulationManager {
    faction: FactionId,
    building_code: String,
    min_free_slots: u32,
    check_timer: ReloadTimer,
    escalated: bool,
}

impl PopulationManager {
    pub fn new<R: Rng + ?Sized>(
        faction: FactionId,
        config: &PopulationConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let building_code = config
            .population_building
            .clone()
            .ok_or_else(|| AiError::MissingConfig("population.population_building".into()))?;
        Ok(Self {
            faction,
            building_code,
            min_free_slots: config.min_free_slots,
            check_timer: ReloadTimer::new(config.check_reload, rng),
            escalated: false,
        })
    }

    pub fn building_code(&self) -> &str {
        &self.building_code
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    /// The unit creator hit the population cap
    pub fn escalate(&mut self) {
        if !self.escalated {
            tracing::debug!(faction = %self.faction, "population cap escalated");
        }
        self.escalated = true;
    }

    /// Returns how many population buildings were requested
    pub fn tick<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        dt: f32,
        rng: &mut R,
        creator: &mut BuildingCreator,
        placement: &mut PlacementResolver,
    ) -> u32 {
        let due = self.check_timer.tick(dt, rng);
        if !self.escalated && !due {
            return 0;
        }
        if !self.escalated && world.population(self.faction).free_slots() > self.min_free_slots {
            return 0;
        }
        self.escalated = false;

        match creator.create_request(
            world,
            None,
            &self.building_code,
            RequestSource::OnDemand,
            1,
            rng,
            placement,
        ) {
            Ok(outcome) => outcome.created,
            Err(e) => {
                tracing::warn!(faction = %self.faction, error = %e, "population building request failed");
                0
            }
        }
    }
}
