//! Resource collector - sends idle collectors to nearby resource nodes
//!
//! A periodic scan schedules one collection task per worthwhile resource
//! inside our territory; running the task tops up its collectors.

use rand::Rng;

use crate::core::config::CollectionConfig;
use crate::core::error::{AiError, Result};
use crate::core::range::{IntRange, ReloadTimer};
use crate::core::types::{FactionId, ResourceId, UnitId};
use crate::npc::scheduler::{TaskKind, TaskScheduler, TaskStatus};
use crate::world::{FactionWorld, Roster, UnitActivity};

pub struct ResourceCollector {
    faction: FactionId,
    collector: String,
    resource_codes: Vec<String>,
    target_collectors: IntRange,
    scan_timer: ReloadTimer,
    collection_level: usize,
}

impl ResourceCollector {
    pub fn new<R: Rng + ?Sized>(
        faction: FactionId,
        config: &CollectionConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let collector = config
            .collector
            .clone()
            .ok_or_else(|| AiError::MissingConfig("collection.collector".into()))?;
        Ok(Self {
            faction,
            collector,
            resource_codes: config.resource_codes.clone(),
            target_collectors: config.target_collectors,
            scan_timer: ReloadTimer::new(config.scan_reload, rng),
            collection_level: config.collection_level,
        })
    }

    pub fn collector(&self) -> &str {
        &self.collector
    }

    /// On each scan, schedule every collectable resource in our territory
    pub fn tick<W: Roster, R: Rng + ?Sized>(
        &mut self,
        world: &W,
        dt: f32,
        rng: &mut R,
        scheduler: &mut TaskScheduler,
    ) -> usize {
        if !self.scan_timer.tick(dt, rng) {
            return 0;
        }
        let found = self.collectable(world);
        for resource in &found {
            scheduler.add_task(TaskKind::CollectResource(*resource), self.collection_level);
        }
        found.len()
    }

    /// Resources of a configured code lying inside one of our borders
    pub fn collectable<W: Roster>(&self, world: &W) -> Vec<ResourceId> {
        let centers = world.centers(self.faction);
        world
            .resources()
            .into_iter()
            .filter(|r| r.amount > 0 && self.resource_codes.contains(&r.code))
            .filter(|r| {
                centers
                    .iter()
                    .any(|c| c.position.distance(r.position) <= c.border_radius)
            })
            .map(|r| r.id)
            .collect()
    }

    /// Top up collectors on `resource`; `force` also pulls busy collectors
    pub fn on_resource_collection_request<W: FactionWorld, R: Rng + ?Sized>(
        &self,
        world: &mut W,
        resource: ResourceId,
        force: bool,
        rng: &mut R,
    ) -> TaskStatus {
        if !world.resource(resource).is_some_and(|r| r.amount > 0) {
            return TaskStatus::Dropped;
        }
        let collectors: Vec<_> = world
            .units(self.faction)
            .into_iter()
            .filter(|u| u.code == self.collector)
            .collect();
        if collectors.is_empty() {
            return TaskStatus::Dropped;
        }

        let here = UnitActivity::Collecting(resource);
        let on_site = collectors.iter().filter(|u| u.activity == here).count() as u32;
        let wanted = self.target_collectors.sample(rng);
        if on_site >= wanted {
            return TaskStatus::Done;
        }

        let candidates: Vec<UnitId> = collectors
            .iter()
            .filter(|u| u.is_idle() || (force && u.activity != here))
            .map(|u| u.id)
            .take((wanted - on_site) as usize)
            .collect();
        let assigned = candidates.len() as u32;
        for id in candidates {
            world.order_collect(id, resource);
        }
        if on_site + assigned >= wanted {
            TaskStatus::Done
        } else {
            TaskStatus::Pending
        }
    }
}
