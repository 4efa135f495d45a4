//! Defense controller - reacts to hostile damage
//!
//! NotDefending <-> Defending. Every hostile hit calls nearby army units to
//! help. A hit on a building, or on a unit that is not part of an outbound
//! attack, also enters (or refreshes) `Defending`, which may call the attack
//! off. Defending decays back after a quiet period.

use rand::Rng;

use crate::core::config::DefenseConfig;
use crate::core::types::{BuildingId, EntityRef, FactionId, UnitId};
use crate::events::HealthChange;
use crate::npc::attack::AttackDirector;
use crate::world::{nearest_building, AttackTarget, FactionWorld, Roster};

pub struct DefenseController {
    faction: FactionId,
    config: DefenseConfig,
    defending: bool,
    anchor: Option<BuildingId>,
    decay_timer: f32,
}

impl DefenseController {
    pub fn new(faction: FactionId, config: DefenseConfig) -> Self {
        Self {
            faction,
            config,
            defending: false,
            anchor: None,
            decay_timer: 0.0,
        }
    }

    pub fn is_defending(&self) -> bool {
        self.defending
    }

    /// Center non-deployed army units gather at while defending
    pub fn effective_anchor(&self) -> Option<BuildingId> {
        if self.defending {
            self.anchor
        } else {
            None
        }
    }

    pub fn decay_timer(&self) -> f32 {
        self.decay_timer
    }

    /// React to a health change; returns true when defending was entered or refreshed
    pub fn on_health_update<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        change: &HealthChange,
        attack: &mut AttackDirector,
        rng: &mut R,
    ) -> bool {
        if !self.config.enabled || change.faction != self.faction {
            return false;
        }
        let Some(aggressor) = change.hostile_source().copied() else {
            return false;
        };

        let radius = self.config.support_radius.sample(rng);
        let army: Vec<_> = world
            .units(self.faction)
            .into_iter()
            .filter(|u| u.is_army)
            .collect();
        let supporters: Vec<UnitId> = army
            .iter()
            .filter(|u| u.position.distance(change.position) <= radius)
            .map(|u| u.id)
            .collect();

        let triggers = match change.target {
            EntityRef::Building(_) => true,
            EntityRef::Unit(unit) => !attack.is_deployed(unit),
        };
        if triggers {
            if !self.defending {
                tracing::info!(faction = %self.faction, threat = %aggressor.faction, "defense entered");
            }
            self.defending = true;
            self.decay_timer = self.config.decay_time.sample(rng);

            let cancelled = self.config.cancel_attack_on_defense && attack.cancel_attack(world);
            if cancelled {
                tracing::info!(faction = %self.faction, "attack called off to defend");
            }

            // Recalled units gather at the anchor too, overriding their way home
            if self.update_anchor(world, change) || cancelled {
                if let Some(anchor) = self.anchor.and_then(|a| world.building(a)) {
                    let home_guard: Vec<UnitId> = army
                        .iter()
                        .map(|u| u.id)
                        .filter(|id| !attack.is_deployed(*id) && !supporters.contains(id))
                        .collect();
                    for id in home_guard {
                        world.order_move(id, anchor.position);
                    }
                }
            }
        }

        for id in supporters {
            match aggressor.unit {
                Some(enemy) => world.order_attack(id, AttackTarget::Unit(enemy)),
                None => world.order_move(id, aggressor.position),
            }
        }
        triggers
    }

    /// Nearest center to the threat, except the capital is never given up
    fn update_anchor<W: Roster>(&mut self, world: &W, change: &HealthChange) -> bool {
        let current = self.anchor.and_then(|a| world.building(a));
        if current.as_ref().is_some_and(|c| c.is_capital) {
            return false;
        }
        let centers = world.centers(self.faction);
        let Some(nearest) = nearest_building(&centers, change.position) else {
            return false;
        };
        if current.as_ref().is_some_and(|c| c.id == nearest.id) {
            return false;
        }
        self.anchor = Some(nearest.id);
        true
    }

    pub fn tick<W: Roster>(&mut self, world: &W, dt: f32) {
        if !self.defending {
            return;
        }
        if self.anchor.is_some_and(|a| world.building(a).is_none()) {
            self.anchor = None;
        }
        self.decay_timer -= dt;
        if self.decay_timer <= 0.0 {
            self.defending = false;
            self.anchor = None;
            tracing::info!(faction = %self.faction, "defense released");
        }
    }

    pub fn on_building_destroyed(&mut self, building: BuildingId) {
        if self.anchor == Some(building) {
            self.anchor = None;
        }
    }

    pub fn clear(&mut self) {
        self.defending = false;
        self.anchor = None;
    }
}
