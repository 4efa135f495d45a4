//! State-change notifications published by the host game
//!
//! The AI never polls the world for lifecycle changes; it reacts to these
//! events, delivered synchronously through an [`EventBus`] in registration
//! order before each governor tick.

pub mod bus;

pub use bus::{EventBus, SubscriptionId};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{BuildingId, EntityRef, FactionId, Ticket, UnitId};

/// Who dealt damage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggressor {
    pub faction: FactionId,
    pub unit: Option<UnitId>,
    pub position: Vec2,
}

/// Health change on a unit or building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthChange {
    pub target: EntityRef,
    /// Owner of the damaged entity
    pub faction: FactionId,
    /// Negative for damage, positive for healing/repair
    pub delta: i32,
    pub position: Vec2,
    pub source: Option<Aggressor>,
}

impl HealthChange {
    /// Damage dealt by a faction other than the owner
    pub fn hostile_source(&self) -> Option<&Aggressor> {
        if self.delta >= 0 {
            return None;
        }
        self.source.as_ref().filter(|s| s.faction != self.faction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    UnitCreated {
        unit: UnitId,
        faction: FactionId,
        code: String,
        ticket: Option<Ticket>,
    },
    UnitDead {
        unit: UnitId,
        faction: FactionId,
        code: String,
    },
    UnitConverted {
        unit: UnitId,
        code: String,
        from: FactionId,
        to: FactionId,
    },
    UnitHealthUpdated(HealthChange),
    BuildingPlaced {
        building: BuildingId,
        faction: FactionId,
        code: String,
        center: Option<BuildingId>,
        ticket: Option<Ticket>,
    },
    BuildingDestroyed {
        building: BuildingId,
        faction: FactionId,
        code: String,
    },
    BuildingHealthUpdated(HealthChange),
    /// A placement was stopped by someone other than the placement resolver
    PlacementStopped {
        faction: FactionId,
        ticket: Ticket,
    },
    BorderActivated {
        center: BuildingId,
        faction: FactionId,
    },
    TaskLaunched {
        faction: FactionId,
        ticket: Ticket,
        code: String,
    },
    TaskCanceled {
        faction: FactionId,
        ticket: Ticket,
        code: String,
    },
    MaxPopulationUpdated {
        faction: FactionId,
        max: u32,
    },
    FactionEliminated {
        faction: FactionId,
    },
}

/// Subscription key: one per [`GameEvent`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    UnitCreated,
    UnitDead,
    UnitConverted,
    UnitHealthUpdated,
    BuildingPlaced,
    BuildingDestroyed,
    BuildingHealthUpdated,
    PlacementStopped,
    BorderActivated,
    TaskLaunched,
    TaskCanceled,
    MaxPopulationUpdated,
    FactionEliminated,
}

impl GameEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            GameEvent::UnitCreated { .. } => EventTopic::UnitCreated,
            GameEvent::UnitDead { .. } => EventTopic::UnitDead,
            GameEvent::UnitConverted { .. } => EventTopic::UnitConverted,
            GameEvent::UnitHealthUpdated(_) => EventTopic::UnitHealthUpdated,
            GameEvent::BuildingPlaced { .. } => EventTopic::BuildingPlaced,
            GameEvent::BuildingDestroyed { .. } => EventTopic::BuildingDestroyed,
            GameEvent::BuildingHealthUpdated(_) => EventTopic::BuildingHealthUpdated,
            GameEvent::PlacementStopped { .. } => EventTopic::PlacementStopped,
            GameEvent::BorderActivated { .. } => EventTopic::BorderActivated,
            GameEvent::TaskLaunched { .. } => EventTopic::TaskLaunched,
            GameEvent::TaskCanceled { .. } => EventTopic::TaskCanceled,
            GameEvent::MaxPopulationUpdated { .. } => EventTopic::MaxPopulationUpdated,
            GameEvent::FactionEliminated { .. } => EventTopic::FactionEliminated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn damage(owner: u32, source: Option<u32>, delta: i32) -> HealthChange {
        HealthChange {
            target: EntityRef::Unit(UnitId(1)),
            faction: FactionId(owner),
            delta,
            position: Vec2::ZERO,
            source: source.map(|f| Aggressor {
                faction: FactionId(f),
                unit: None,
                position: Vec2::ZERO,
            }),
        }
    }

    #[test]
    fn test_hostile_source_requires_foreign_damage() {
        assert!(damage(1, Some(2), -5).hostile_source().is_some());
        assert!(damage(1, Some(1), -5).hostile_source().is_none(), "friendly fire");
        assert!(damage(1, Some(2), 5).hostile_source().is_none(), "healing");
        assert!(damage(1, None, -5).hostile_source().is_none(), "no source");
    }

    #[test]
    fn test_topic_matches_variant() {
        let event = GameEvent::FactionEliminated { faction: FactionId(3) };
        assert_eq!(event.topic(), EventTopic::FactionEliminated);
        let event = GameEvent::BuildingHealthUpdated(damage(1, None, -1));
        assert_eq!(event.topic(), EventTopic::BuildingHealthUpdated);
    }
}
