//! In-memory host world
//!
//! A deliberately small stand-in for the real game: units teleport when
//! ordered to move, production is a countdown, and placement legality is a
//! circle-overlap test. It implements every collaborator trait so governors
//! can be driven end to end from tests and the skirmish runner.

use ahash::AHashMap;
use glam::Vec2;

use super::{
    AttackTarget, BuildingInfo, BuildingPlacement, Economy, EventSource, Executor, FactionInfo,
    LaunchError, Population, ResourceInfo, Roster, UnitActivity, UnitInfo,
};
use crate::core::types::{BuildingId, Cost, EntityRef, FactionId, ResourceId, Ticket, UnitId};
use crate::events::{Aggressor, GameEvent, HealthChange};

/// How the sandbox creates one unit type
#[derive(Debug, Clone)]
pub struct UnitTemplate {
    pub attack_power: f32,
    pub is_army: bool,
    /// Building code whose instances can produce this unit
    pub launcher: String,
    /// Seconds from launch to spawn
    pub build_time: f32,
}

/// Every order the AI issued, in order
#[derive(Debug, Clone, PartialEq)]
pub enum IssuedOrder {
    Attack { unit: UnitId, target: AttackTarget },
    Move { unit: UnitId, position: Vec2 },
    Construct { unit: UnitId, building: BuildingId },
    Collect { unit: UnitId, resource: ResourceId },
}

impl IssuedOrder {
    pub fn unit(&self) -> UnitId {
        match self {
            IssuedOrder::Attack { unit, .. }
            | IssuedOrder::Move { unit, .. }
            | IssuedOrder::Construct { unit, .. }
            | IssuedOrder::Collect { unit, .. } => *unit,
        }
    }
}

#[derive(Debug, Clone)]
struct FactionState {
    info: FactionInfo,
    stock: AHashMap<String, u32>,
    max_population: u32,
    limits: AHashMap<String, u32>,
}

#[derive(Debug, Clone)]
struct Production {
    ticket: Ticket,
    faction: FactionId,
    code: String,
    launcher: BuildingId,
    remaining: f32,
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    factions: Vec<FactionState>,
    units: Vec<UnitInfo>,
    buildings: Vec<BuildingInfo>,
    resources: Vec<ResourceInfo>,
    templates: AHashMap<String, UnitTemplate>,
    productions: Vec<Production>,
    obstacles: Vec<(Vec2, f32)>,
    orders: Vec<IssuedOrder>,
    events: Vec<GameEvent>,
    next_entity: u32,
    next_ticket: u64,
    /// Radius of every building footprint
    pub footprint: f32,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            factions: Vec::new(),
            units: Vec::new(),
            buildings: Vec::new(),
            resources: Vec::new(),
            templates: AHashMap::new(),
            productions: Vec::new(),
            obstacles: Vec::new(),
            orders: Vec::new(),
            events: Vec::new(),
            next_entity: 1,
            next_ticket: 1,
            footprint: 1.0,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_entity;
        self.next_entity += 1;
        id
    }

    fn faction_mut(&mut self, faction: FactionId) -> Option<&mut FactionState> {
        self.factions.iter_mut().find(|f| f.info.id == faction)
    }

    fn faction_state(&self, faction: FactionId) -> Option<&FactionState> {
        self.factions.iter().find(|f| f.info.id == faction)
    }

    pub fn add_faction(&mut self, faction: FactionId, max_population: u32) {
        self.factions.push(FactionState {
            info: FactionInfo {
                id: faction,
                eliminated: false,
            },
            stock: AHashMap::new(),
            max_population,
            limits: AHashMap::new(),
        });
    }

    pub fn add_unit_template(&mut self, code: &str, template: UnitTemplate) {
        self.templates.insert(code.to_string(), template);
    }

    pub fn set_stock(&mut self, faction: FactionId, resource: &str, amount: u32) {
        if let Some(state) = self.faction_mut(faction) {
            state.stock.insert(resource.to_string(), amount);
        }
    }

    pub fn stock(&self, faction: FactionId, resource: &str) -> u32 {
        self.faction_state(faction)
            .and_then(|f| f.stock.get(resource).copied())
            .unwrap_or(0)
    }

    pub fn set_limit(&mut self, faction: FactionId, code: &str, max: u32) {
        if let Some(state) = self.faction_mut(faction) {
            state.limits.insert(code.to_string(), max);
        }
    }

    pub fn set_max_population(&mut self, faction: FactionId, max: u32) {
        if let Some(state) = self.faction_mut(faction) {
            state.max_population = max;
            self.events
                .push(GameEvent::MaxPopulationUpdated { faction, max });
        }
    }

    pub fn add_obstacle(&mut self, position: Vec2, radius: f32) {
        self.obstacles.push((position, radius));
    }

    pub fn add_resource(&mut self, code: &str, position: Vec2, amount: u32) -> ResourceId {
        let id = ResourceId(self.next_id());
        self.resources.push(ResourceInfo {
            id,
            code: code.to_string(),
            position,
            amount,
        });
        id
    }

    /// Place a completed territory center; the first one of a faction is its capital
    pub fn spawn_center(
        &mut self,
        faction: FactionId,
        code: &str,
        position: Vec2,
        border_radius: f32,
    ) -> BuildingId {
        let is_capital = !self
            .buildings
            .iter()
            .any(|b| b.faction == faction && b.is_capital);
        let id = BuildingId(self.next_id());
        self.buildings.push(BuildingInfo {
            id,
            faction,
            code: code.to_string(),
            position,
            is_center: true,
            is_capital,
            border_radius,
            under_construction: false,
            center: Some(id),
        });
        self.events.push(GameEvent::BuildingPlaced {
            building: id,
            faction,
            code: code.to_string(),
            center: Some(id),
            ticket: None,
        });
        self.events.push(GameEvent::BorderActivated { center: id, faction });
        id
    }

    /// Place a completed, non-center building inside a territory
    pub fn spawn_building(
        &mut self,
        faction: FactionId,
        code: &str,
        position: Vec2,
        center: Option<BuildingId>,
    ) -> BuildingId {
        let id = BuildingId(self.next_id());
        self.buildings.push(BuildingInfo {
            id,
            faction,
            code: code.to_string(),
            position,
            is_center: false,
            is_capital: false,
            border_radius: 0.0,
            under_construction: false,
            center,
        });
        self.events.push(GameEvent::BuildingPlaced {
            building: id,
            faction,
            code: code.to_string(),
            center,
            ticket: None,
        });
        id
    }

    pub fn spawn_unit(&mut self, faction: FactionId, code: &str, position: Vec2) -> UnitId {
        self.spawn_unit_from(faction, code, position, None, None)
    }

    fn spawn_unit_from(
        &mut self,
        faction: FactionId,
        code: &str,
        position: Vec2,
        creator: Option<BuildingId>,
        ticket: Option<Ticket>,
    ) -> UnitId {
        let (attack_power, is_army) = self
            .templates
            .get(code)
            .map(|t| (t.attack_power, t.is_army))
            .unwrap_or((0.0, false));
        let id = UnitId(self.next_id());
        self.units.push(UnitInfo {
            id,
            faction,
            code: code.to_string(),
            position,
            attack_power,
            is_army,
            creator,
            activity: UnitActivity::Idle,
        });
        self.events.push(GameEvent::UnitCreated {
            unit: id,
            faction,
            code: code.to_string(),
            ticket,
        });
        id
    }

    pub fn set_unit_power(&mut self, unit: UnitId, attack_power: f32) {
        if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
            u.attack_power = attack_power;
        }
    }

    pub fn set_unit_position(&mut self, unit: UnitId, position: Vec2) {
        if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
            u.position = position;
        }
    }

    pub fn set_unit_activity(&mut self, unit: UnitId, activity: UnitActivity) {
        if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
            u.activity = activity;
        }
    }

    pub fn complete_construction(&mut self, building: BuildingId) {
        if let Some(b) = self.buildings.iter_mut().find(|b| b.id == building) {
            b.under_construction = false;
        }
        for unit in &mut self.units {
            if unit.activity == UnitActivity::Constructing(building) {
                unit.activity = UnitActivity::Idle;
            }
        }
    }

    fn aggressor(&self, attacker: UnitId) -> Option<Aggressor> {
        self.units.iter().find(|u| u.id == attacker).map(|u| Aggressor {
            faction: u.faction,
            unit: Some(u.id),
            position: u.position,
        })
    }

    pub fn damage_unit(&mut self, target: UnitId, attacker: UnitId, amount: i32) {
        let Some(victim) = self.units.iter().find(|u| u.id == target) else {
            return;
        };
        let change = HealthChange {
            target: EntityRef::Unit(target),
            faction: victim.faction,
            delta: -amount,
            position: victim.position,
            source: self.aggressor(attacker),
        };
        self.events.push(GameEvent::UnitHealthUpdated(change));
    }

    pub fn damage_building(&mut self, target: BuildingId, attacker: UnitId, amount: i32) {
        let Some(victim) = self.buildings.iter().find(|b| b.id == target) else {
            return;
        };
        let change = HealthChange {
            target: EntityRef::Building(target),
            faction: victim.faction,
            delta: -amount,
            position: victim.position,
            source: self.aggressor(attacker),
        };
        self.events.push(GameEvent::BuildingHealthUpdated(change));
    }

    pub fn kill_unit(&mut self, unit: UnitId) {
        if let Some(idx) = self.units.iter().position(|u| u.id == unit) {
            let dead = self.units.remove(idx);
            self.events.push(GameEvent::UnitDead {
                unit,
                faction: dead.faction,
                code: dead.code,
            });
        }
    }

    pub fn convert_unit(&mut self, unit: UnitId, to: FactionId) {
        if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
            let from = u.faction;
            u.faction = to;
            u.activity = UnitActivity::Idle;
            let code = u.code.clone();
            self.events.push(GameEvent::UnitConverted {
                unit,
                code,
                from,
                to,
            });
        }
    }

    /// Remove a building; productions queued at it are cancelled
    pub fn destroy_building(&mut self, building: BuildingId) {
        let Some(idx) = self.buildings.iter().position(|b| b.id == building) else {
            return;
        };
        let destroyed = self.buildings.remove(idx);

        let (cancelled, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.productions)
            .into_iter()
            .partition(|p| p.launcher == building);
        self.productions = kept;
        for p in cancelled {
            self.events.push(GameEvent::TaskCanceled {
                faction: p.faction,
                ticket: p.ticket,
                code: p.code,
            });
        }

        self.events.push(GameEvent::BuildingDestroyed {
            building,
            faction: destroyed.faction,
            code: destroyed.code,
        });
    }

    pub fn eliminate(&mut self, faction: FactionId) {
        if let Some(state) = self.faction_mut(faction) {
            state.info.eliminated = true;
            self.events.push(GameEvent::FactionEliminated { faction });
        }
    }

    /// Advance production countdowns; finished units spawn at their launcher
    pub fn advance(&mut self, dt: f32) {
        for p in &mut self.productions {
            p.remaining -= dt;
        }
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.productions)
            .into_iter()
            .partition(|p| p.remaining <= 0.0);
        self.productions = running;

        for p in finished {
            let position = self
                .buildings
                .iter()
                .find(|b| b.id == p.launcher)
                .map(|b| b.position)
                .unwrap_or(Vec2::ZERO);
            self.spawn_unit_from(p.faction, &p.code, position, Some(p.launcher), Some(p.ticket));
        }
    }

    pub fn orders(&self) -> &[IssuedOrder] {
        &self.orders
    }

    pub fn take_orders(&mut self) -> Vec<IssuedOrder> {
        std::mem::take(&mut self.orders)
    }

    pub fn queued_productions(&self, faction: FactionId) -> usize {
        self.productions.iter().filter(|p| p.faction == faction).count()
    }

    fn count_of(&self, faction: FactionId, code: &str) -> u32 {
        let units = self
            .units
            .iter()
            .filter(|u| u.faction == faction && u.code == code)
            .count();
        let buildings = self
            .buildings
            .iter()
            .filter(|b| b.faction == faction && b.code == code)
            .count();
        (units + buildings) as u32
    }
}

impl Roster for Sandbox {
    fn factions(&self) -> Vec<FactionInfo> {
        self.factions.iter().map(|f| f.info.clone()).collect()
    }

    fn units(&self, faction: FactionId) -> Vec<UnitInfo> {
        self.units
            .iter()
            .filter(|u| u.faction == faction)
            .cloned()
            .collect()
    }

    fn buildings(&self, faction: FactionId) -> Vec<BuildingInfo> {
        self.buildings
            .iter()
            .filter(|b| b.faction == faction)
            .cloned()
            .collect()
    }

    fn resources(&self) -> Vec<ResourceInfo> {
        self.resources.clone()
    }

    fn unit(&self, id: UnitId) -> Option<UnitInfo> {
        self.units.iter().find(|u| u.id == id).cloned()
    }

    fn building(&self, id: BuildingId) -> Option<BuildingInfo> {
        self.buildings.iter().find(|b| b.id == id).cloned()
    }

    fn resource(&self, id: ResourceId) -> Option<ResourceInfo> {
        self.resources.iter().find(|r| r.id == id).cloned()
    }

    fn population(&self, faction: FactionId) -> Population {
        let living = self.units.iter().filter(|u| u.faction == faction).count();
        let queued = self.queued_productions(faction);
        Population {
            current: (living + queued) as u32,
            max: self.faction_state(faction).map_or(0, |f| f.max_population),
        }
    }

    fn has_reached_limit(&self, faction: FactionId, code: &str) -> bool {
        match self.faction_state(faction).and_then(|f| f.limits.get(code)) {
            Some(max) => self.count_of(faction, code) >= *max,
            None => false,
        }
    }
}

impl Economy for Sandbox {
    fn check_resources(&self, faction: FactionId, cost: &Cost) -> bool {
        cost.iter()
            .all(|(resource, amount)| self.stock(faction, resource) >= amount)
    }

    fn take_resources(&mut self, faction: FactionId, cost: &Cost) {
        if let Some(state) = self.faction_mut(faction) {
            for (resource, amount) in cost.iter() {
                let entry = state.stock.entry(resource.to_string()).or_insert(0);
                *entry = entry.saturating_sub(amount);
            }
        }
    }

    fn give_back_resources(&mut self, faction: FactionId, cost: &Cost) {
        if let Some(state) = self.faction_mut(faction) {
            for (resource, amount) in cost.iter() {
                *state.stock.entry(resource.to_string()).or_insert(0) += amount;
            }
        }
    }
}

impl Executor for Sandbox {
    fn launch_unit(&mut self, faction: FactionId, code: &str) -> Result<Ticket, LaunchError> {
        let template = self
            .templates
            .get(code)
            .cloned()
            .ok_or_else(|| LaunchError::NoLauncher(code.to_string()))?;
        let launcher = self
            .buildings
            .iter()
            .find(|b| b.faction == faction && b.code == template.launcher && !b.under_construction)
            .map(|b| b.id)
            .ok_or_else(|| LaunchError::NoLauncher(code.to_string()))?;

        let population = self.population(faction);
        if population.current >= population.max {
            return Err(LaunchError::PopulationCapped);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.productions.push(Production {
            ticket,
            faction,
            code: code.to_string(),
            launcher,
            remaining: template.build_time,
        });
        self.events.push(GameEvent::TaskLaunched {
            faction,
            ticket,
            code: code.to_string(),
        });
        Ok(ticket)
    }

    fn is_placement_valid(
        &self,
        faction: FactionId,
        _code: &str,
        position: Vec2,
        center: BuildingId,
    ) -> bool {
        let Some(territory) = self.buildings.iter().find(|b| b.id == center) else {
            return false;
        };
        if territory.faction != faction {
            return false;
        }
        if position.distance(territory.position) + self.footprint > territory.border_radius {
            return false;
        }
        let spacing = self.footprint * 2.0;
        if self
            .buildings
            .iter()
            .any(|b| b.position.distance(position) < spacing)
        {
            return false;
        }
        if self
            .resources
            .iter()
            .any(|r| r.position.distance(position) < spacing)
        {
            return false;
        }
        !self
            .obstacles
            .iter()
            .any(|(p, r)| p.distance(position) < r + self.footprint)
    }

    fn place_building(
        &mut self,
        faction: FactionId,
        placement: &BuildingPlacement,
    ) -> Option<BuildingId> {
        if !self.is_placement_valid(faction, &placement.code, placement.position, placement.center)
        {
            return None;
        }
        let id = BuildingId(self.next_id());
        self.buildings.push(BuildingInfo {
            id,
            faction,
            code: placement.code.clone(),
            position: placement.position,
            is_center: false,
            is_capital: false,
            border_radius: 0.0,
            under_construction: true,
            center: Some(placement.center),
        });
        self.events.push(GameEvent::BuildingPlaced {
            building: id,
            faction,
            code: placement.code.clone(),
            center: Some(placement.center),
            ticket: Some(placement.ticket),
        });
        Some(id)
    }

    fn order_attack(&mut self, unit: UnitId, target: AttackTarget) {
        self.set_unit_activity(unit, UnitActivity::Attacking);
        self.orders.push(IssuedOrder::Attack { unit, target });
    }

    fn order_move(&mut self, unit: UnitId, position: Vec2) {
        if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
            u.position = position;
            u.activity = UnitActivity::Idle;
        }
        self.orders.push(IssuedOrder::Move { unit, position });
    }

    fn order_construct(&mut self, unit: UnitId, building: BuildingId) {
        self.set_unit_activity(unit, UnitActivity::Constructing(building));
        self.orders.push(IssuedOrder::Construct { unit, building });
    }

    fn order_collect(&mut self, unit: UnitId, resource: ResourceId) {
        self.set_unit_activity(unit, UnitActivity::Collecting(resource));
        self.orders.push(IssuedOrder::Collect { unit, resource });
    }
}

impl EventSource for Sandbox {
    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
