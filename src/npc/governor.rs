//! Faction governor - one computer-controlled faction
//!
//! Built explicitly from an [`NpcProfile`]: every component is constructed up
//! front and owned here, so there is no runtime lookup between them. A
//! component whose mandatory configuration is missing is disabled (logged)
//! while the rest of the AI keeps running.
//!
//! Tick order: scheduler, unit creator, building creator, placement,
//! population, collection, attack, defense.

use rand::Rng;

use crate::core::config::NpcProfile;
use crate::core::error::Result;
use crate::core::range::{faction_rng, AiRng};
use crate::core::types::{BuildingId, FactionId, ResourceId};
use crate::events::{EventTopic, GameEvent};
use crate::npc::attack::AttackDirector;
use crate::npc::collection::ResourceCollector;
use crate::npc::construction::{BuildingConstructor, ConstructionReport};
use crate::npc::creator::{BuildingCreator, CreateOutcome, RequestSource, UnitCreator};
use crate::npc::defense::DefenseController;
use crate::npc::placement::PlacementResolver;
use crate::npc::population::PopulationManager;
use crate::npc::scheduler::{Task, TaskId, TaskKind, TaskScheduler, TaskStatus};
use crate::world::{FactionWorld, Roster};

/// Event-receiving parts of a governor, in subscription order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    UnitCreator,
    BuildingCreator,
    Construction,
    Attack,
    Defense,
}

impl Component {
    /// Creators come first so quota changes are seen before anything reacts
    pub const ALL: [Component; 5] = [
        Component::UnitCreator,
        Component::BuildingCreator,
        Component::Construction,
        Component::Attack,
        Component::Defense,
    ];

    pub fn topics(self) -> &'static [EventTopic] {
        match self {
            Component::UnitCreator => &[
                EventTopic::UnitCreated,
                EventTopic::UnitDead,
                EventTopic::UnitConverted,
                EventTopic::TaskLaunched,
                EventTopic::TaskCanceled,
                EventTopic::MaxPopulationUpdated,
            ],
            Component::BuildingCreator => &[
                EventTopic::BorderActivated,
                EventTopic::BuildingPlaced,
                EventTopic::BuildingDestroyed,
                EventTopic::PlacementStopped,
            ],
            Component::Construction => &[EventTopic::BuildingPlaced],
            Component::Attack => &[
                EventTopic::UnitDead,
                EventTopic::UnitConverted,
                EventTopic::FactionEliminated,
            ],
            Component::Defense => &[
                EventTopic::UnitHealthUpdated,
                EventTopic::BuildingHealthUpdated,
                EventTopic::BuildingDestroyed,
            ],
        }
    }
}

pub struct FactionGovernor {
    faction: FactionId,
    profile_name: String,
    rng: AiRng,
    unit_creator: UnitCreator,
    building_creator: BuildingCreator,
    scheduler: TaskScheduler,
    placement: PlacementResolver,
    attack: AttackDirector,
    defense: DefenseController,
    population: Option<PopulationManager>,
    construction: Option<BuildingConstructor>,
    collection: Option<ResourceCollector>,
}

/// Keep a component only if its configuration is complete
fn enabled<T>(faction: FactionId, name: &str, built: Result<T>) -> Option<T> {
    match built {
        Ok(built) => Some(built),
        Err(e) => {
            tracing::error!(faction = %faction, component = name, error = %e, "component disabled");
            None
        }
    }
}

impl FactionGovernor {
    pub fn new(faction: FactionId, profile: &NpcProfile, seed: u64) -> Self {
        let mut rng = faction_rng(seed, faction);
        let attack = AttackDirector::new(faction, profile.attack.clone(), &mut rng);
        let population = enabled(
            faction,
            "population",
            PopulationManager::new(faction, &profile.population, &mut rng),
        );
        let construction = enabled(
            faction,
            "construction",
            BuildingConstructor::new(faction, &profile.construction),
        );
        let collection = enabled(
            faction,
            "collection",
            ResourceCollector::new(faction, &profile.collection, &mut rng),
        );

        Self {
            faction,
            profile_name: profile.name.clone(),
            unit_creator: UnitCreator::new(faction, profile.unit_regulators.clone()),
            building_creator: BuildingCreator::new(faction, profile.building_regulators.clone()),
            scheduler: TaskScheduler::new(&profile.scheduler),
            placement: PlacementResolver::new(faction, profile.placement.clone()),
            attack,
            defense: DefenseController::new(faction, profile.defense.clone()),
            population,
            construction,
            collection,
            rng,
        }
    }

    /// Activate faction-wide quotas and every territory that already exists
    pub fn start<W: Roster>(&mut self, world: &W) {
        self.unit_creator.activate_all(world, &mut self.rng);
        for center in world.centers(self.faction) {
            self.building_creator.add_center(world, &center, &mut self.rng);
        }
        tracing::info!(
            faction = %self.faction,
            profile = %self.profile_name,
            territories = self.building_creator.centers().len(),
            "governor started"
        );
    }

    pub fn faction(&self) -> FactionId {
        self.faction
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn unit_creator(&self) -> &UnitCreator {
        &self.unit_creator
    }

    pub fn building_creator(&self) -> &BuildingCreator {
        &self.building_creator
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn placement(&self) -> &PlacementResolver {
        &self.placement
    }

    pub fn attack(&self) -> &AttackDirector {
        &self.attack
    }

    pub fn defense(&self) -> &DefenseController {
        &self.defense
    }

    pub fn population(&self) -> Option<&PopulationManager> {
        self.population.as_ref()
    }

    pub fn construction(&self) -> Option<&BuildingConstructor> {
        self.construction.as_ref()
    }

    pub fn collection(&self) -> Option<&ResourceCollector> {
        self.collection.as_ref()
    }

    pub fn is_attacking(&self) -> bool {
        self.attack.is_attacking()
    }

    pub fn is_defending(&self) -> bool {
        self.defense.is_defending()
    }

    pub fn is_building_under_construction<W: Roster>(&self, world: &W, building: BuildingId) -> bool {
        world
            .building(building)
            .is_some_and(|b| b.faction == self.faction && b.under_construction)
    }

    pub fn tick<W: FactionWorld>(&mut self, world: &mut W, dt: f32) {
        let clock_ticks = self.scheduler.advance(dt);
        for _ in 0..clock_ticks {
            self.run_scheduled_tasks(world);
        }

        let outcome = self.unit_creator.tick(world, dt, &mut self.rng);
        if outcome.population_capped {
            if let Some(population) = self.population.as_mut() {
                population.escalate();
            }
        }

        self.building_creator
            .tick(world, dt, &mut self.rng, &mut self.placement);
        for placed in self.placement.tick(world, dt, &mut self.rng) {
            self.building_creator.apply_placement_outcome(&placed);
        }

        if let Some(population) = self.population.as_mut() {
            population.tick(
                world,
                dt,
                &mut self.rng,
                &mut self.building_creator,
                &mut self.placement,
            );
        }
        if let Some(collection) = self.collection.as_mut() {
            collection.tick(world, dt, &mut self.rng, &mut self.scheduler);
        }

        let defending = self.defense.is_defending();
        self.attack.tick(world, dt, defending, &mut self.rng);
        self.defense.tick(world, dt);
    }

    /// Force-execute every level-0 task once
    fn run_scheduled_tasks<W: FactionWorld>(&mut self, world: &mut W) {
        let Self {
            scheduler,
            unit_creator,
            construction,
            collection,
            population,
            rng,
            ..
        } = self;
        let mut builder_shortfall = 0;
        let mut capped = false;

        scheduler.run_level_zero(|task| {
            execute_task(
                task,
                world,
                rng,
                unit_creator,
                construction.as_ref(),
                collection.as_ref(),
                &mut builder_shortfall,
                &mut capped,
            )
        });

        if capped {
            if let Some(population) = population.as_mut() {
                population.escalate();
            }
        }
        if let Some(construction) = construction.as_ref() {
            construction.request_builders(world, scheduler, builder_shortfall);
        }
    }

    pub fn handle_event<W: FactionWorld>(
        &mut self,
        world: &mut W,
        event: &GameEvent,
        component: Component,
    ) {
        match component {
            Component::UnitCreator => self.unit_creator_event(event),
            Component::BuildingCreator => self.building_creator_event(world, event),
            Component::Construction => {
                if let (
                    GameEvent::BuildingPlaced {
                        building, faction, ..
                    },
                    Some(construction),
                ) = (event, self.construction.as_ref())
                {
                    if *faction == self.faction {
                        construction.on_building_placed(world, &mut self.scheduler, *building);
                    }
                }
            }
            Component::Attack => match event {
                GameEvent::UnitDead { unit, faction, .. } if *faction == self.faction => {
                    self.attack.on_unit_removed(*unit)
                }
                GameEvent::UnitConverted { unit, from, .. } if *from == self.faction => {
                    self.attack.on_unit_removed(*unit)
                }
                GameEvent::FactionEliminated { faction } => {
                    self.attack.on_faction_eliminated(world, *faction)
                }
                _ => {}
            },
            Component::Defense => match event {
                GameEvent::UnitHealthUpdated(change) | GameEvent::BuildingHealthUpdated(change) => {
                    self.defense
                        .on_health_update(world, change, &mut self.attack, &mut self.rng);
                }
                GameEvent::BuildingDestroyed { building, faction, .. } if *faction == self.faction => {
                    self.defense.on_building_destroyed(*building)
                }
                _ => {}
            },
        }
    }

    fn unit_creator_event(&mut self, event: &GameEvent) {
        let me = self.faction;
        match event {
            GameEvent::UnitCreated {
                unit,
                faction,
                code,
                ticket,
            } if *faction == me => self.unit_creator.on_unit_created(*unit, code, *ticket),
            GameEvent::UnitDead { unit, faction, code } if *faction == me => {
                self.unit_creator.on_unit_removed(*unit, code)
            }
            GameEvent::UnitConverted { unit, code, from, to } => {
                if *from == me {
                    self.unit_creator.on_unit_removed(*unit, code);
                }
                if *to == me {
                    self.unit_creator.on_unit_created(*unit, code, None);
                }
            }
            GameEvent::TaskLaunched { faction, ticket, code } if *faction == me => {
                self.unit_creator.on_task_launched(*ticket, code)
            }
            GameEvent::TaskCanceled { faction, ticket, code } if *faction == me => {
                self.unit_creator.on_task_canceled(*ticket, code)
            }
            GameEvent::MaxPopulationUpdated { faction, .. } if *faction == me => {
                self.unit_creator.reactivate()
            }
            _ => {}
        }
    }

    fn building_creator_event<W: FactionWorld>(&mut self, world: &mut W, event: &GameEvent) {
        let me = self.faction;
        match event {
            GameEvent::BorderActivated { center, faction } if *faction == me => {
                match world.building(*center) {
                    Some(info) => self.building_creator.add_center(world, &info, &mut self.rng),
                    None => tracing::debug!(faction = %me, center = %center, "activated border already gone"),
                }
            }
            GameEvent::BuildingPlaced {
                building,
                faction,
                code,
                center,
                ticket,
            } if *faction == me => {
                self.building_creator
                    .on_building_placed(*building, code, *center, *ticket);
            }
            GameEvent::BuildingDestroyed {
                building,
                faction,
                code,
            } if *faction == me => {
                if self.building_creator.remove_center(*building) {
                    let abandoned = self
                        .placement
                        .on_center_destroyed(*building, world, &mut self.rng);
                    for outcome in abandoned {
                        self.building_creator.apply_placement_outcome(&outcome);
                    }
                } else {
                    self.building_creator.on_building_destroyed(*building, code);
                }
            }
            GameEvent::PlacementStopped { faction, ticket } if *faction == me => {
                if let Some(outcome) = self.placement.cancel(*ticket, world, &mut self.rng) {
                    self.building_creator.apply_placement_outcome(&outcome);
                }
            }
            _ => {}
        }
    }

    /// Another AI component wants buildings; `center` defaults to the capital
    pub fn on_create_building_request<W: FactionWorld>(
        &mut self,
        world: &mut W,
        center: Option<BuildingId>,
        code: &str,
        amount: u32,
    ) -> Result<CreateOutcome> {
        self.building_creator.create_request(
            world,
            center,
            code,
            RequestSource::OnDemand,
            amount,
            &mut self.rng,
            &mut self.placement,
        )
    }

    /// `None` when construction is disabled
    pub fn on_building_construction_request<W: FactionWorld>(
        &mut self,
        world: &mut W,
        building: BuildingId,
        force: bool,
    ) -> Option<ConstructionReport> {
        let construction = self.construction.as_ref()?;
        let report = construction.on_building_construction_request(world, building, force, &mut self.rng);
        construction.request_builders(world, &mut self.scheduler, report.shortfall);
        Some(report)
    }

    /// `None` when collection is disabled
    pub fn on_resource_collection_request<W: FactionWorld>(
        &mut self,
        world: &mut W,
        resource: ResourceId,
        force: bool,
    ) -> Option<TaskStatus> {
        let collection = self.collection.as_ref()?;
        Some(collection.on_resource_collection_request(world, resource, force, &mut self.rng))
    }

    pub fn add_task(&mut self, kind: TaskKind, level: usize) -> TaskId {
        self.scheduler.add_task(kind, level)
    }

    pub fn cancel_attack<W: FactionWorld>(&mut self, world: &mut W) -> bool {
        self.attack.cancel_attack(world)
    }

    /// Drop every piece of state (faction eliminated)
    pub fn shutdown(&mut self) {
        self.unit_creator.clear();
        self.building_creator.clear();
        self.scheduler.clear();
        self.placement.clear();
        self.attack.clear();
        self.defense.clear();
        tracing::info!(faction = %self.faction, "governor shut down");
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_task<W: FactionWorld, R: Rng + ?Sized>(
    task: &Task,
    world: &mut W,
    rng: &mut R,
    unit_creator: &mut UnitCreator,
    construction: Option<&BuildingConstructor>,
    collection: Option<&ResourceCollector>,
    builder_shortfall: &mut u32,
    population_capped: &mut bool,
) -> TaskStatus {
    match &task.kind {
        TaskKind::ConstructBuilding(building) => match construction {
            Some(construction) => {
                let report = construction.on_building_construction_request(world, *building, false, rng);
                *builder_shortfall += report.shortfall;
                report.status
            }
            None => TaskStatus::Dropped,
        },
        TaskKind::CollectResource(resource) => match collection {
            Some(collection) => collection.on_resource_collection_request(world, *resource, false, rng),
            None => TaskStatus::Dropped,
        },
        TaskKind::CreateUnit {
            code,
            target_amount,
        } => {
            let amount = match unit_creator.activate(world, code, rng) {
                Ok(instance) => instance.regulator().amount(),
                Err(e) => {
                    tracing::warn!(task = %task.id, error = %e, "unit request dropped");
                    return TaskStatus::Dropped;
                }
            };
            if amount >= *target_amount {
                return TaskStatus::Done;
            }
            match unit_creator.create_request(world, code, RequestSource::OnDemand, target_amount - amount) {
                Ok(outcome) if outcome.rejected => TaskStatus::Dropped,
                Ok(outcome) if outcome.population_capped => {
                    *population_capped = true;
                    TaskStatus::Pending
                }
                Ok(outcome) if amount + outcome.created >= *target_amount => TaskStatus::Done,
                Ok(outcome) if outcome.deferred || outcome.created > 0 => TaskStatus::Pending,
                // Quota full: nothing more will come of it
                Ok(_) => TaskStatus::Dropped,
                Err(_) => TaskStatus::Dropped,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BuildingRegulatorConfig, RegulatorConfig};
    use crate::core::range::{FloatRange, IntRange};
    use crate::core::types::Cost;
    use crate::world::{EventSource, Sandbox, UnitTemplate};
    use glam::Vec2;

    const F: FactionId = FactionId(1);

    fn profile() -> NpcProfile {
        let mut villager = RegulatorConfig::new("villager");
        villager.max_amount = IntRange::fixed(4);
        villager.max_pending_amount = 2;
        villager.spawn_reload = FloatRange::fixed(1.0);
        villager.cost = Cost::new().with("food", 50);

        let mut house = BuildingRegulatorConfig::new("house");
        house.regulator.max_amount = IntRange::fixed(1);
        house.regulator.spawn_reload = FloatRange::fixed(1.0);
        house.regulator.cost = Cost::new().with("wood", 30);

        let mut profile = NpcProfile {
            name: "test".into(),
            unit_regulators: vec![villager],
            building_regulators: vec![house],
            ..Default::default()
        };
        profile.construction.builder = Some("villager".into());
        profile.construction.target_builders = IntRange::fixed(1);
        profile.construction.construction_level = 0;
        profile.attack.enabled = false;
        profile
    }

    fn world() -> Sandbox {
        let mut world = Sandbox::new();
        world.add_faction(F, 20);
        world.set_stock(F, "food", 1000);
        world.set_stock(F, "wood", 1000);
        world.add_unit_template(
            "villager",
            UnitTemplate {
                attack_power: 1.0,
                is_army: false,
                launcher: "town_center".into(),
                build_time: 2.0,
            },
        );
        world.spawn_center(F, "town_center", Vec2::ZERO, 20.0);
        world
    }

    fn deliver(governor: &mut FactionGovernor, world: &mut Sandbox) {
        for event in world.drain_events() {
            for component in Component::ALL {
                if component.topics().contains(&event.topic()) {
                    governor.handle_event(world, &event, component);
                }
            }
        }
    }

    #[test]
    fn test_missing_mandatory_config_disables_only_that_component() {
        let governor = FactionGovernor::new(F, &profile(), 1);
        assert!(governor.population().is_none());
        assert!(governor.collection().is_none());
        assert!(governor.construction().is_some());
    }

    #[test]
    fn test_start_registers_existing_territory() {
        let world = world();
        let mut governor = FactionGovernor::new(F, &profile(), 1);
        governor.start(&world);
        assert_eq!(governor.building_creator().centers().len(), 1);
        assert!(governor.unit_creator().regulator("villager").is_some());
    }

    #[test]
    fn test_units_launched_then_materialized() {
        let mut world = world();
        let mut governor = FactionGovernor::new(F, &profile(), 1);
        governor.start(&world);

        governor.tick(&mut world, 1.0);
        deliver(&mut governor, &mut world);
        let reg = governor.unit_creator().regulator("villager").unwrap();
        assert_eq!(reg.pending_amount(), 2);

        world.advance(2.0);
        deliver(&mut governor, &mut world);
        let reg = governor.unit_creator().regulator("villager").unwrap();
        assert_eq!(reg.pending_amount(), 0);
        assert_eq!(reg.current().len(), 2);
        assert_eq!(reg.amount(), 2);
    }

    #[test]
    fn test_placed_house_gets_a_builder() {
        let mut world = world();
        let builder = world.spawn_unit(F, "villager", Vec2::new(1.0, 1.0));
        let mut governor = FactionGovernor::new(F, &profile(), 3);
        governor.start(&world);
        deliver(&mut governor, &mut world);

        let mut house = None;
        for _ in 0..40 {
            governor.tick(&mut world, 0.5);
            deliver(&mut governor, &mut world);
            house = world.buildings(F).into_iter().find(|b| b.code == "house");
            if house.is_some() {
                break;
            }
        }
        let house = house.expect("house placed within 20 seconds");
        assert!(governor.is_building_under_construction(&world, house.id));
        assert!(governor.scheduler().contains(&TaskKind::ConstructBuilding(house.id)));

        governor.tick(&mut world, 1.0);
        assert_eq!(
            world.unit(builder).unwrap().activity,
            crate::world::UnitActivity::Constructing(house.id)
        );
    }

    #[test]
    fn test_destroyed_center_drops_its_quotas() {
        let mut world = world();
        let mut governor = FactionGovernor::new(F, &profile(), 1);
        governor.start(&world);
        let capital = world.capital(F).unwrap().id;
        world.destroy_building(capital);
        deliver(&mut governor, &mut world);
        assert!(governor.building_creator().centers().is_empty());
    }

    #[test]
    fn test_create_unit_task_reaches_target() {
        let mut world = world();
        let mut governor = FactionGovernor::new(F, &profile(), 1);
        governor.start(&world);
        governor.add_task(
            TaskKind::CreateUnit {
                code: "villager".into(),
                target_amount: 2,
            },
            0,
        );
        governor.tick(&mut world, 1.0);
        assert_eq!(world.queued_productions(F), 2);
        assert!(governor.scheduler().is_empty(), "target reached, task done");
    }
}
