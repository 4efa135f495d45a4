//! Building constructor - keeps builders on unfinished buildings

use rand::Rng;

use crate::core::config::ConstructionConfig;
use crate::core::error::{AiError, Result};
use crate::core::range::IntRange;
use crate::core::types::{BuildingId, FactionId, UnitId};
use crate::npc::scheduler::{TaskKind, TaskScheduler, TaskStatus};
use crate::world::{FactionWorld, Roster, UnitActivity};

/// Result of one construction request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructionReport {
    pub status: TaskStatus,
    /// Builders newly ordered onto the building
    pub assigned: u32,
    /// Builders still missing after every available one was used
    pub shortfall: u32,
}

pub struct BuildingConstructor {
    faction: FactionId,
    builder: String,
    target_builders: IntRange,
    construction_level: usize,
    builder_request_level: usize,
}

impl BuildingConstructor {
    pub fn new(faction: FactionId, config: &ConstructionConfig) -> Result<Self> {
        let builder = config
            .builder
            .clone()
            .ok_or_else(|| AiError::MissingConfig("construction.builder".into()))?;
        Ok(Self {
            faction,
            builder,
            target_builders: config.target_builders,
            construction_level: config.construction_level,
            builder_request_level: config.builder_request_level,
        })
    }

    pub fn builder(&self) -> &str {
        &self.builder
    }

    /// Queue construction work for one of our freshly placed buildings
    pub fn on_building_placed<W: Roster>(
        &self,
        world: &W,
        scheduler: &mut TaskScheduler,
        building: BuildingId,
    ) -> bool {
        let unfinished = world
            .building(building)
            .is_some_and(|b| b.faction == self.faction && b.under_construction);
        if unfinished {
            scheduler.add_task(TaskKind::ConstructBuilding(building), self.construction_level);
        }
        unfinished
    }

    /// Top up the builders on `building`
    ///
    /// Idle builders are preferred; with `force` busy builders are pulled off
    /// their current work too. Finished or lost buildings are dropped.
    pub fn on_building_construction_request<W: FactionWorld, R: Rng + ?Sized>(
        &self,
        world: &mut W,
        building: BuildingId,
        force: bool,
        rng: &mut R,
    ) -> ConstructionReport {
        let mut report = ConstructionReport {
            status: TaskStatus::Dropped,
            assigned: 0,
            shortfall: 0,
        };
        let unfinished = world
            .building(building)
            .is_some_and(|b| b.faction == self.faction && b.under_construction);
        if !unfinished {
            return report;
        }
        report.status = TaskStatus::Pending;

        let builders: Vec<_> = world
            .units(self.faction)
            .into_iter()
            .filter(|u| u.code == self.builder)
            .collect();
        let on_site = builders
            .iter()
            .filter(|u| u.activity == UnitActivity::Constructing(building))
            .count() as u32;
        let wanted = self.target_builders.sample(rng);
        if on_site >= wanted {
            return report;
        }

        let mut candidates: Vec<UnitId> = builders
            .iter()
            .filter(|u| u.is_idle())
            .map(|u| u.id)
            .collect();
        if force {
            candidates.extend(
                builders
                    .iter()
                    .filter(|u| !u.is_idle() && u.activity != UnitActivity::Constructing(building))
                    .map(|u| u.id),
            );
        }

        let missing = wanted - on_site;
        for id in candidates.into_iter().take(missing as usize) {
            world.order_construct(id, building);
            report.assigned += 1;
        }
        report.shortfall = missing - report.assigned;
        if report.assigned > 0 {
            tracing::debug!(
                faction = %self.faction,
                building = %building,
                assigned = report.assigned,
                shortfall = report.shortfall,
                "builders assigned"
            );
        }
        report
    }

    /// Ask the unit creator, through the scheduler, for the missing builders
    pub fn request_builders<W: Roster>(
        &self,
        world: &W,
        scheduler: &mut TaskScheduler,
        shortfall: u32,
    ) {
        if shortfall == 0 {
            return;
        }
        let existing = world
            .units(self.faction)
            .iter()
            .filter(|u| u.code == self.builder)
            .count() as u32;
        scheduler.add_task(
            TaskKind::CreateUnit {
                code: self.builder.clone(),
                target_amount: existing + shortfall,
            },
            self.builder_request_level,
        );
    }
}
