//! The host game as seen by the AI
//!
//! Architecture: the AI only ever talks to the world through these traits.
//! - `Roster` is a read-only snapshot view of factions, units, buildings and resources
//! - `Economy` reserves and refunds resource costs
//! - `Executor` turns intents into physical actions (spawn, place, order)
//! - `EventSource` hands the state-change notifications over to the AI host

pub mod sandbox;

pub use sandbox::{IssuedOrder, Sandbox, UnitTemplate};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{BuildingId, Cost, FactionId, ResourceId, Ticket, UnitId};
use crate::events::GameEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionInfo {
    pub id: FactionId,
    pub eliminated: bool,
}

/// What a unit is currently busy with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitActivity {
    #[default]
    Idle,
    Moving,
    Attacking,
    Constructing(BuildingId),
    Collecting(ResourceId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: UnitId,
    pub faction: FactionId,
    pub code: String,
    pub position: Vec2,
    pub attack_power: f32,
    /// Counts toward the faction's army (attack and defense)
    pub is_army: bool,
    /// Building that produced this unit, if it still matters
    pub creator: Option<BuildingId>,
    pub activity: UnitActivity,
}

impl UnitInfo {
    pub fn is_idle(&self) -> bool {
        self.activity == UnitActivity::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingInfo {
    pub id: BuildingId,
    pub faction: FactionId,
    pub code: String,
    pub position: Vec2,
    /// Owns a border and therefore its own local quotas
    pub is_center: bool,
    pub is_capital: bool,
    /// Border radius for centers, zero otherwise
    pub border_radius: f32,
    pub under_construction: bool,
    /// Territory center this building belongs to
    pub center: Option<BuildingId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub code: String,
    pub position: Vec2,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Population {
    pub current: u32,
    pub max: u32,
}

impl Population {
    pub fn free_slots(&self) -> u32 {
        self.max.saturating_sub(self.current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackTarget {
    Unit(UnitId),
    Building(BuildingId),
}

/// A finalized building placement handed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    pub code: String,
    pub position: Vec2,
    /// Facing in radians
    pub facing: f32,
    pub center: BuildingId,
    pub ticket: Ticket,
}

/// Why a task launcher refused to start a unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("Population cap reached")]
    PopulationCapped,
    #[error("No task launcher can create '{0}'")]
    NoLauncher(String),
}

pub trait Roster {
    fn factions(&self) -> Vec<FactionInfo>;
    fn units(&self, faction: FactionId) -> Vec<UnitInfo>;
    fn buildings(&self, faction: FactionId) -> Vec<BuildingInfo>;
    fn resources(&self) -> Vec<ResourceInfo>;
    fn unit(&self, id: UnitId) -> Option<UnitInfo>;
    fn building(&self, id: BuildingId) -> Option<BuildingInfo>;
    fn resource(&self, id: ResourceId) -> Option<ResourceInfo>;
    fn population(&self, faction: FactionId) -> Population;
    /// Host-side hard cap for an item type (e.g. "one wonder per faction")
    fn has_reached_limit(&self, faction: FactionId, code: &str) -> bool;

    fn capital(&self, faction: FactionId) -> Option<BuildingInfo> {
        self.buildings(faction).into_iter().find(|b| b.is_capital)
    }

    fn centers(&self, faction: FactionId) -> Vec<BuildingInfo> {
        self.buildings(faction)
            .into_iter()
            .filter(|b| b.is_center)
            .collect()
    }

    /// Sum of the army units' attack power
    fn attack_power(&self, faction: FactionId) -> f32 {
        army_power(&self.units(faction))
    }
}

pub trait Economy {
    fn check_resources(&self, faction: FactionId, cost: &Cost) -> bool;
    fn take_resources(&mut self, faction: FactionId, cost: &Cost);
    fn give_back_resources(&mut self, faction: FactionId, cost: &Cost);
}

pub trait Executor {
    /// Queue a unit at one of the faction's task launchers
    fn launch_unit(&mut self, faction: FactionId, code: &str) -> Result<Ticket, LaunchError>;
    fn is_placement_valid(
        &self,
        faction: FactionId,
        code: &str,
        position: Vec2,
        center: BuildingId,
    ) -> bool;
    /// Instantiate the real building; `None` if the host refused at the last moment
    fn place_building(&mut self, faction: FactionId, placement: &BuildingPlacement)
        -> Option<BuildingId>;
    fn order_attack(&mut self, unit: UnitId, target: AttackTarget);
    fn order_move(&mut self, unit: UnitId, position: Vec2);
    fn order_construct(&mut self, unit: UnitId, building: BuildingId);
    fn order_collect(&mut self, unit: UnitId, resource: ResourceId);
}

pub trait EventSource {
    fn drain_events(&mut self) -> Vec<GameEvent>;
}

/// Everything a governor needs from the host
pub trait FactionWorld: Roster + Economy + Executor {}

impl<T: Roster + Economy + Executor> FactionWorld for T {}

pub fn army_power(units: &[UnitInfo]) -> f32 {
    units
        .iter()
        .filter(|u| u.is_army)
        .map(|u| u.attack_power)
        .sum()
}

/// Nearest building to `position`; the first one found wins ties
pub fn nearest_building<'a>(
    buildings: impl IntoIterator<Item = &'a BuildingInfo>,
    position: Vec2,
) -> Option<&'a BuildingInfo> {
    let mut best: Option<(&BuildingInfo, f32)> = None;
    for building in buildings {
        let distance = building.position.distance(position);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((building, distance));
        }
    }
    best.map(|(b, _)| b)
}
