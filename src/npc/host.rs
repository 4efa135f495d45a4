//! AI host - owns every governor and routes host events to them
//!
//! Each governor component subscribes to the topics it cares about; the bus
//! returns listeners in registration order and the host dispatches to the
//! matching governor. Events raised while handling are drained again before
//! the tick, up to a fixed number of rounds.

use crate::core::config::NpcProfile;
use crate::core::error::{AiError, Result};
use crate::core::types::FactionId;
use crate::events::{EventBus, GameEvent};
use crate::npc::governor::{Component, FactionGovernor};
use crate::world::{EventSource, FactionWorld, Roster};

/// Drain-and-publish rounds per step before leftovers wait for the next one
const MAX_DELIVERY_ROUNDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Listener {
    pub faction: FactionId,
    pub component: Component,
}

pub struct AiHost {
    seed: u64,
    bus: EventBus<Listener>,
    governors: Vec<FactionGovernor>,
}

impl AiHost {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            bus: EventBus::new(),
            governors: Vec::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn bus(&self) -> &EventBus<Listener> {
        &self.bus
    }

    pub fn factions(&self) -> Vec<FactionId> {
        self.governors.iter().map(|g| g.faction()).collect()
    }

    pub fn governor(&self, faction: FactionId) -> Option<&FactionGovernor> {
        self.governors.iter().find(|g| g.faction() == faction)
    }

    pub fn governor_mut(&mut self, faction: FactionId) -> Option<&mut FactionGovernor> {
        self.governors.iter_mut().find(|g| g.faction() == faction)
    }

    /// Put `faction` under computer control
    pub fn add_faction<W: Roster>(
        &mut self,
        world: &W,
        faction: FactionId,
        profile: &NpcProfile,
    ) -> Result<()> {
        if self.governor(faction).is_some() {
            return Err(AiError::InvalidConfig(format!(
                "{} is already governed",
                faction
            )));
        }
        profile.validate()?;

        let mut governor = FactionGovernor::new(faction, profile, self.seed);
        governor.start(world);
        for component in Component::ALL {
            for topic in component.topics() {
                self.bus.subscribe(*topic, Listener { faction, component });
            }
        }
        self.governors.push(governor);
        Ok(())
    }

    /// Stop governing `faction`; its state is dropped
    pub fn remove_faction(&mut self, faction: FactionId) -> bool {
        let Some(idx) = self.governors.iter().position(|g| g.faction() == faction) else {
            return false;
        };
        let removed = self.bus.unsubscribe_where(|l| l.faction == faction);
        let mut governor = self.governors.remove(idx);
        governor.shutdown();
        tracing::info!(faction = %faction, subscriptions = removed, "faction no longer governed");
        true
    }

    /// Deliver one event to every subscribed component
    pub fn publish<W: FactionWorld>(&mut self, world: &mut W, event: &GameEvent) {
        for listener in self.bus.subscribers(event) {
            if let Some(governor) = self
                .governors
                .iter_mut()
                .find(|g| g.faction() == listener.faction)
            {
                governor.handle_event(world, event, listener.component);
            }
        }
        if let GameEvent::FactionEliminated { faction } = event {
            self.remove_faction(*faction);
        }
    }

    /// Drain the host's queue until it stays empty; returns events delivered
    pub fn deliver<W: FactionWorld + EventSource>(&mut self, world: &mut W) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let events = world.drain_events();
            if events.is_empty() {
                return delivered;
            }
            for event in &events {
                self.publish(world, event);
            }
            delivered += events.len();
        }
        tracing::warn!(delivered, "event delivery did not settle, continuing next step");
        delivered
    }

    /// One AI frame: pending events, every governor's tick, then the events
    /// the ticks raised
    pub fn step<W: FactionWorld + EventSource>(&mut self, world: &mut W, dt: f32) {
        self.deliver(world);
        for governor in &mut self.governors {
            governor.tick(world, dt);
        }
        self.deliver(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RegulatorConfig;
    use crate::core::range::{FloatRange, IntRange};
    use crate::events::EventTopic;
    use crate::world::{Sandbox, UnitTemplate};
    use glam::Vec2;

    const RED: FactionId = FactionId(1);
    const BLUE: FactionId = FactionId(2);

    fn profile() -> NpcProfile {
        let mut villager = RegulatorConfig::new("villager");
        villager.max_amount = IntRange::fixed(3);
        villager.max_pending_amount = 3;
        villager.spawn_reload = FloatRange::fixed(1.0);
        NpcProfile {
            name: "host".into(),
            unit_regulators: vec![villager],
            ..Default::default()
        }
    }

    fn world() -> Sandbox {
        let mut world = Sandbox::new();
        world.add_unit_template(
            "villager",
            UnitTemplate {
                attack_power: 1.0,
                is_army: false,
                launcher: "town_center".into(),
                build_time: 1.0,
            },
        );
        for (faction, x) in [(RED, 0.0), (BLUE, 100.0)] {
            world.add_faction(faction, 20);
            world.spawn_center(faction, "town_center", Vec2::new(x, 0.0), 20.0);
        }
        world
    }

    #[test]
    fn test_add_faction_subscribes_every_component() {
        let world = world();
        let mut host = AiHost::new(7);
        host.add_faction(&world, RED, &profile()).unwrap();

        let listener = Listener {
            faction: RED,
            component: Component::Defense,
        };
        assert!(host.bus().is_subscribed(EventTopic::BuildingHealthUpdated, listener));
        let total: usize = Component::ALL.iter().map(|c| c.topics().len()).sum();
        assert_eq!(host.bus().len(), total);
    }

    #[test]
    fn test_duplicate_faction_rejected() {
        let world = world();
        let mut host = AiHost::new(7);
        host.add_faction(&world, RED, &profile()).unwrap();
        assert!(host.add_faction(&world, RED, &profile()).is_err());
    }

    #[test]
    fn test_step_produces_and_tracks_units() {
        let mut world = world();
        let mut host = AiHost::new(7);
        host.add_faction(&world, RED, &profile()).unwrap();
        host.add_faction(&world, BLUE, &profile()).unwrap();

        host.step(&mut world, 1.0);
        world.advance(1.0);
        host.step(&mut world, 0.1);

        for faction in [RED, BLUE] {
            let reg = host
                .governor(faction)
                .and_then(|g| g.unit_creator().regulator("villager"))
                .unwrap();
            assert_eq!(reg.current().len(), 3, "{} villagers", faction);
            assert_eq!(reg.pending_amount(), 0);
        }
    }

    #[test]
    fn test_elimination_removes_governor_and_listeners() {
        let mut world = world();
        let mut host = AiHost::new(7);
        host.add_faction(&world, RED, &profile()).unwrap();
        host.add_faction(&world, BLUE, &profile()).unwrap();
        let before = host.bus().len();

        world.eliminate(BLUE);
        host.step(&mut world, 0.1);
        assert_eq!(host.factions(), vec![RED]);
        assert_eq!(host.bus().len(), before / 2);
        assert!(!host.remove_faction(BLUE), "already gone");
    }
}
