//! Unit creator - faction-wide unit quotas

use rand::Rng;

use super::{ActiveRegulator, CreateOutcome, RegulatorContext, RequestSource};
use crate::core::config::RegulatorConfig;
use crate::core::error::{AiError, Result};
use crate::core::types::{EntityRef, FactionId, ItemRef, Ticket, UnitId};
use crate::npc::regulator::Regulator;
use crate::world::{FactionWorld, LaunchError, Roster};

pub struct UnitCreator {
    faction: FactionId,
    templates: Vec<RegulatorConfig>,
    instances: Vec<ActiveRegulator>,
    active: bool,
}

impl UnitCreator {
    pub fn new(faction: FactionId, templates: Vec<RegulatorConfig>) -> Self {
        Self {
            faction,
            templates,
            instances: Vec::new(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Any event that frees quota must call this
    pub fn reactivate(&mut self) {
        self.active = true;
    }

    pub fn instances(&self) -> &[ActiveRegulator] {
        &self.instances
    }

    pub fn regulator(&self, code: &str) -> Option<&Regulator> {
        self.instances
            .iter()
            .find(|i| i.code() == code)
            .map(|i| i.regulator())
    }

    /// Activate every independently listed template (game start)
    pub fn activate_all<W: Roster, R: Rng + ?Sized>(&mut self, world: &W, rng: &mut R) {
        let codes: Vec<String> = self.templates.iter().map(|t| t.code.clone()).collect();
        for code in codes {
            if let Err(e) = self.activate(world, &code, rng) {
                tracing::error!(faction = %self.faction, error = %e, "unit regulator activation failed");
            }
        }
    }

    /// Return the active instance for `code`, creating it on first use
    ///
    /// A fresh instance adopts the faction's existing units of that code.
    pub fn activate<W: Roster, R: Rng + ?Sized>(
        &mut self,
        world: &W,
        code: &str,
        rng: &mut R,
    ) -> Result<&mut ActiveRegulator> {
        if let Some(idx) = self.instances.iter().position(|i| i.code() == code) {
            return Ok(&mut self.instances[idx]);
        }
        let template = self
            .templates
            .iter()
            .find(|t| t.code == code)
            .ok_or_else(|| AiError::UnknownRegulator(code.to_string()))?;

        let mut instance =
            ActiveRegulator::new(template, RegulatorContext::Faction(self.faction), rng);
        for unit in world.units(self.faction).iter().filter(|u| u.code == code) {
            instance
                .regulator_mut()
                .materialize(None, EntityRef::Unit(unit.id));
        }
        tracing::debug!(
            faction = %self.faction,
            code,
            min = instance.regulator().min_amount(),
            max = instance.regulator().max_amount(),
            "unit regulator activated"
        );
        self.instances.push(instance);
        self.active = true;
        let idx = self.instances.len() - 1;
        Ok(&mut self.instances[idx])
    }

    /// Count every spawn timer down and top up quotas whose timer fired
    pub fn tick<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        dt: f32,
        rng: &mut R,
    ) -> CreateOutcome {
        let mut outcome = CreateOutcome::default();
        if !self.active {
            return outcome;
        }

        let mut all_at_max = true;
        for idx in 0..self.instances.len() {
            let hard_cap = world.has_reached_limit(self.faction, self.instances[idx].code());
            if self.instances[idx].regulator().has_reached_max_amount(hard_cap) {
                continue;
            }
            all_at_max = false;
            if !self.instances[idx].tick_timer(dt, rng) {
                continue;
            }
            let wanted = self.instances[idx].regulator().room_left();
            let result = self.create_at(idx, world, RequestSource::Auto, wanted);
            outcome.merge(result);
            if result.population_capped {
                break;
            }
        }

        if all_at_max {
            tracing::debug!(faction = %self.faction, "all unit quotas full, unit creator idle");
            self.active = false;
        }
        outcome
    }

    /// Ask for up to `amount_wanted` units of `code`
    pub fn create_request<W: FactionWorld>(
        &mut self,
        world: &mut W,
        code: &str,
        source: RequestSource,
        amount_wanted: u32,
    ) -> Result<CreateOutcome> {
        let idx = self
            .instances
            .iter()
            .position(|i| i.code() == code)
            .ok_or_else(|| AiError::UnknownRegulator(code.to_string()))?;
        Ok(self.create_at(idx, world, source, amount_wanted))
    }

    fn create_at<W: FactionWorld>(
        &mut self,
        idx: usize,
        world: &mut W,
        source: RequestSource,
        amount_wanted: u32,
    ) -> CreateOutcome {
        let mut outcome = CreateOutcome::default();
        let faction = self.faction;
        let instance = &mut self.instances[idx];
        let allowed = match source {
            RequestSource::Auto => instance.regulator().allows_auto_create(),
            RequestSource::OnDemand => instance.regulator().allows_on_demand(),
        };
        if !allowed {
            outcome.rejected = true;
            return outcome;
        }

        let code = instance.code().to_string();
        let mut wanted = amount_wanted;
        while wanted > 0 {
            let hard_cap = world.has_reached_limit(faction, &code);
            if instance.regulator().has_reached_max_amount(hard_cap) {
                break;
            }
            let cost = instance.regulator().cost().clone();
            if !world.check_resources(faction, &cost) {
                tracing::debug!(faction = %faction, code = %code, "cannot afford unit, deferring");
                outcome.deferred = true;
                break;
            }
            world.take_resources(faction, &cost);
            match world.launch_unit(faction, &code) {
                Ok(ticket) => {
                    instance.regulator_mut().reserve(ticket);
                    outcome.created += 1;
                    wanted -= 1;
                }
                Err(LaunchError::PopulationCapped) => {
                    world.give_back_resources(faction, &cost);
                    tracing::debug!(faction = %faction, code = %code, "population cap hit, aborting batch");
                    outcome.population_capped = true;
                    break;
                }
                Err(e @ LaunchError::NoLauncher(_)) => {
                    world.give_back_resources(faction, &cost);
                    tracing::debug!(faction = %faction, error = %e, "unit launch deferred");
                    outcome.deferred = true;
                    break;
                }
            }
        }
        outcome
    }

    pub fn on_task_launched(&mut self, ticket: Ticket, code: &str) {
        if let Some(inst) = self.instances.iter_mut().find(|i| i.code() == code) {
            inst.regulator_mut().reserve(ticket);
        }
    }

    pub fn on_task_canceled(&mut self, ticket: Ticket, code: &str) {
        let faction = self.faction;
        if let Some(inst) = self.instances.iter_mut().find(|i| i.code() == code) {
            if inst.regulator().tracks(ItemRef::Pending(ticket)) {
                if let Err(e) = inst.regulator_mut().remove_item(ItemRef::Pending(ticket)) {
                    tracing::error!(faction = %faction, error = %e, "unit regulator bookkeeping");
                }
                self.active = true;
            }
        }
    }

    /// A reservation leaving pending frees pending room, so this reactivates
    pub fn on_unit_created(&mut self, unit: UnitId, code: &str, ticket: Option<Ticket>) {
        if let Some(inst) = self.instances.iter_mut().find(|i| i.code() == code) {
            let was_pending = ticket.is_some_and(|t| inst.regulator().tracks(ItemRef::Pending(t)));
            inst.regulator_mut()
                .materialize(ticket, EntityRef::Unit(unit));
            if was_pending {
                self.active = true;
            }
        }
    }

    /// Unit died or was converted away
    pub fn on_unit_removed(&mut self, unit: UnitId, code: &str) {
        let faction = self.faction;
        if let Some(inst) = self.instances.iter_mut().find(|i| i.code() == code) {
            if let Err(e) = inst
                .regulator_mut()
                .remove_item(ItemRef::Current(EntityRef::Unit(unit)))
            {
                tracing::error!(faction = %faction, error = %e, "unit regulator bookkeeping");
            }
            self.active = true;
        }
    }

    /// Faction eliminated: every instance is destroyed
    pub fn clear(&mut self) {
        self.instances.clear();
        self.active = false;
    }
}
