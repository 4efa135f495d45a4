//! Building creator - quotas per territory center
//!
//! Every center (a building that owns a border) gets its own set of active
//! regulator instances, so each territory keeps its own local quotas. New
//! buildings are handed to the placement resolver rather than spawned.

use glam::Vec2;
use rand::Rng;

use super::{ActiveRegulator, CreateOutcome, RegulatorContext, RequestSource};
use crate::core::config::{AnchorKind, BuildingRegulatorConfig};
use crate::core::error::{AiError, Result};
use crate::core::types::{BuildingId, EntityRef, FactionId, ItemRef, Ticket};
use crate::npc::placement::{PlacementOutcome, PlacementRequest, PlacementResolver};
use crate::npc::regulator::Regulator;
use crate::world::{BuildingInfo, FactionWorld, Roster};

/// Active regulator instances keyed to one territory center
#[derive(Debug, Clone)]
pub struct CenterSlot {
    center: BuildingId,
    is_capital: bool,
    instances: Vec<ActiveRegulator>,
}

impl CenterSlot {
    pub fn center(&self) -> BuildingId {
        self.center
    }

    pub fn is_capital(&self) -> bool {
        self.is_capital
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
}

pub struct BuildingCreator {
    faction: FactionId,
    templates: Vec<BuildingRegulatorConfig>,
    centers: Vec<CenterSlot>,
    active: bool,
}

impl BuildingCreator {
    pub fn new(faction: FactionId, templates: Vec<BuildingRegulatorConfig>) -> Self {
        Self {
            faction,
            templates,
            centers: Vec::new(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reactivate(&mut self) {
        self.active = true;
    }

    pub fn centers(&self) -> &[CenterSlot] {
        &self.centers
    }

    pub fn slot(&self, center: BuildingId) -> Option<&CenterSlot> {
        self.centers.iter().find(|s| s.center == center)
    }

    pub fn has_template(&self, code: &str) -> bool {
        self.templates.iter().any(|t| t.regulator.code == code)
    }

    /// Register a newly activated territory and activate every template in it
    pub fn add_center<W: Roster, R: Rng + ?Sized>(
        &mut self,
        world: &W,
        center: &BuildingInfo,
        rng: &mut R,
    ) {
        if self.slot(center.id).is_some() {
            return;
        }
        self.centers.push(CenterSlot {
            center: center.id,
            is_capital: center.is_capital,
            instances: Vec::new(),
        });
        tracing::debug!(faction = %self.faction, center = %center.id, "territory registered");

        let codes: Vec<String> = self
            .templates
            .iter()
            .map(|t| t.regulator.code.clone())
            .collect();
        let slot_idx = self.centers.len() - 1;
        for code in codes {
            self.activate_in_slot(world, slot_idx, &code, rng);
        }
    }

    /// Activate one template across every known center
    ///
    /// Returns how many centers ended up with an instance for it.
    pub fn activate_building_regulator<W: Roster, R: Rng + ?Sized>(
        &mut self,
        world: &W,
        code: &str,
        rng: &mut R,
    ) -> Result<usize> {
        if !self.has_template(code) {
            return Err(AiError::UnknownRegulator(code.to_string()));
        }
        let mut count = 0;
        for slot_idx in 0..self.centers.len() {
            if self.activate_in_slot(world, slot_idx, code, rng) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn activate_in_slot<W: Roster, R: Rng + ?Sized>(
        &mut self,
        world: &W,
        slot_idx: usize,
        code: &str,
        rng: &mut R,
    ) -> bool {
        let Some(template) = self.templates.iter().find(|t| t.regulator.code == code) else {
            return false;
        };
        let slot = &mut self.centers[slot_idx];
        if template.capital_only && !slot.is_capital {
            return false;
        }
        if slot.instances.iter().any(|i| i.code() == code) {
            return true;
        }

        let context = RegulatorContext::Center {
            faction: self.faction,
            center: slot.center,
        };
        let mut instance = ActiveRegulator::new(&template.regulator, context, rng);
        let existing = world
            .buildings(self.faction)
            .into_iter()
            .filter(|b| b.code == code && b.center == Some(slot.center) && b.id != slot.center);
        for building in existing {
            instance
                .regulator_mut()
                .materialize(None, EntityRef::Building(building.id));
        }
        slot.instances.push(instance);
        self.active = true;
        true
    }

    /// Destroy the center's whole instance set; returns whether it was known
    ///
    /// Pending placements anchored to the center are abandoned by the
    /// placement resolver, not here.
    pub fn remove_center(&mut self, center: BuildingId) -> bool {
        let before = self.centers.len();
        self.centers.retain(|s| s.center != center);
        let removed = self.centers.len() != before;
        if removed {
            tracing::info!(faction = %self.faction, center = %center, "territory lost, regulators destroyed");
        }
        removed
    }

    pub fn tick<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        dt: f32,
        rng: &mut R,
        placement: &mut PlacementResolver,
    ) -> CreateOutcome {
        let mut outcome = CreateOutcome::default();
        if !self.active {
            return outcome;
        }

        let mut all_at_max = true;
        for slot_idx in 0..self.centers.len() {
            for inst_idx in 0..self.centers[slot_idx].instances.len() {
                let instance = &self.centers[slot_idx].instances[inst_idx];
                let hard_cap = world.has_reached_limit(self.faction, instance.code());
                if instance.regulator().has_reached_max_amount(hard_cap) {
                    continue;
                }
                all_at_max = false;
                if !self.centers[slot_idx].instances[inst_idx].tick_timer(dt, rng) {
                    continue;
                }
                let wanted = self.centers[slot_idx].instances[inst_idx]
                    .regulator()
                    .room_left();
                outcome.merge(self.create_at(
                    slot_idx,
                    inst_idx,
                    world,
                    RequestSource::Auto,
                    wanted,
                    rng,
                    placement,
                ));
            }
        }

        if all_at_max {
            tracing::debug!(faction = %self.faction, "all building quotas full, building creator idle");
            self.active = false;
        }
        outcome
    }

    /// Ask for up to `amount_wanted` buildings of `code` in a territory
    ///
    /// `center` defaults to the capital's territory.
    #[allow(clippy::too_many_arguments)]
    pub fn create_request<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        center: Option<BuildingId>,
        code: &str,
        source: RequestSource,
        amount_wanted: u32,
        rng: &mut R,
        placement: &mut PlacementResolver,
    ) -> Result<CreateOutcome> {
        let slot_idx = match center {
            Some(center) => self.centers.iter().position(|s| s.center == center),
            None => self
                .centers
                .iter()
                .position(|s| s.is_capital)
                .or(if self.centers.is_empty() { None } else { Some(0) }),
        }
        .ok_or_else(|| AiError::UnknownRegulator(code.to_string()))?;
        let inst_idx = self.centers[slot_idx]
            .instances
            .iter()
            .position(|i| i.code() == code)
            .ok_or_else(|| AiError::UnknownRegulator(code.to_string()))?;
        Ok(self.create_at(
            slot_idx,
            inst_idx,
            world,
            source,
            amount_wanted,
            rng,
            placement,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn create_at<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        slot_idx: usize,
        inst_idx: usize,
        world: &mut W,
        source: RequestSource,
        amount_wanted: u32,
        rng: &mut R,
        placement: &mut PlacementResolver,
    ) -> CreateOutcome {
        let mut outcome = CreateOutcome::default();
        let faction = self.faction;
        let center = self.centers[slot_idx].center;
        let code = self.centers[slot_idx].instances[inst_idx].code().to_string();
        let Some(template) = self.templates.iter().find(|t| t.regulator.code == code) else {
            return outcome;
        };
        let instance = &mut self.centers[slot_idx].instances[inst_idx];

        let allowed = match source {
            RequestSource::Auto => instance.regulator().allows_auto_create(),
            RequestSource::OnDemand => instance.regulator().allows_on_demand(),
        };
        if !allowed {
            outcome.rejected = true;
            return outcome;
        }

        // Stale centers are pruned lazily on the next destroy event
        let Some(territory) = world.building(center) else {
            outcome.deferred = true;
            return outcome;
        };

        let mut wanted = amount_wanted;
        while wanted > 0 {
            let hard_cap = world.has_reached_limit(faction, &code);
            if instance.regulator().has_reached_max_amount(hard_cap) {
                break;
            }
            let cost = instance.regulator().cost().clone();
            if !world.check_resources(faction, &cost) {
                tracing::debug!(faction = %faction, code = %code, "cannot afford building, deferring");
                outcome.deferred = true;
                break;
            }
            world.take_resources(faction, &cost);

            let anchor = choose_anchor(world, template, &territory, rng);
            let ticket = placement.submit(
                PlacementRequest {
                    code: code.clone(),
                    cost,
                    center,
                    anchor,
                    anchor_distance: template.placement.distance.sample(rng),
                },
                rng,
            );
            instance.regulator_mut().reserve(ticket);
            outcome.created += 1;
            wanted -= 1;
        }
        outcome
    }

    /// Settle the regulator side of a finished or abandoned placement
    pub fn apply_placement_outcome(&mut self, outcome: &PlacementOutcome) {
        match outcome {
            PlacementOutcome::Placed {
                ticket,
                code,
                center,
                building,
            } => {
                self.materialize(*center, code, Some(*ticket), *building);
            }
            PlacementOutcome::Abandoned {
                ticket,
                code,
                center,
                ..
            } => {
                let faction = self.faction;
                // The center may already be gone together with its regulators
                if let Some(inst) = self.instance_mut(*center, code) {
                    if let Err(e) = inst.regulator_mut().remove_item(ItemRef::Pending(*ticket)) {
                        tracing::error!(faction = %faction, error = %e, "building regulator bookkeeping");
                    }
                }
                self.active = true;
            }
        }
    }

    pub fn on_building_placed(
        &mut self,
        building: BuildingId,
        code: &str,
        center: Option<BuildingId>,
        ticket: Option<Ticket>,
    ) {
        let Some(center) = center else {
            return;
        };
        if center == building {
            return;
        }
        self.materialize(center, code, ticket, building);
    }

    /// Track `building` under its territory; a reservation leaving pending
    /// frees pending room, so this reactivates
    fn materialize(
        &mut self,
        center: BuildingId,
        code: &str,
        ticket: Option<Ticket>,
        building: BuildingId,
    ) {
        let Some(inst) = self.instance_mut(center, code) else {
            return;
        };
        let was_pending = ticket.is_some_and(|t| inst.regulator().tracks(ItemRef::Pending(t)));
        inst.regulator_mut()
            .materialize(ticket, EntityRef::Building(building));
        if was_pending {
            self.active = true;
        }
    }

    /// A non-center building was destroyed
    pub fn on_building_destroyed(&mut self, building: BuildingId, code: &str) {
        let item = ItemRef::Current(EntityRef::Building(building));
        for slot in &mut self.centers {
            for inst in slot.instances.iter_mut().filter(|i| i.code() == code) {
                if inst.regulator().tracks(item) {
                    if let Err(e) = inst.regulator_mut().remove_item(item) {
                        tracing::error!(faction = %self.faction, error = %e, "building regulator bookkeeping");
                    }
                    self.active = true;
                    return;
                }
            }
        }
        tracing::debug!(faction = %self.faction, building = %building, "destroyed building was not regulated");
    }

    pub fn clear(&mut self) {
        self.centers.clear();
        self.active = false;
    }

    fn instance_mut(&mut self, center: BuildingId, code: &str) -> Option<&mut ActiveRegulator> {
        self.centers
            .iter_mut()
            .find(|s| s.center == center)
            .and_then(|s| s.instances.iter_mut().find(|i| i.code() == code))
    }
}

/// Pick where the new building starts its placement search
///
/// Around-resource and around-building anchors are drawn uniformly among
/// matches inside the territory; with no match the center itself is used.
fn choose_anchor<W: Roster, R: Rng + ?Sized>(
    world: &W,
    template: &BuildingRegulatorConfig,
    territory: &BuildingInfo,
    rng: &mut R,
) -> Vec2 {
    let inside = |p: Vec2| p.distance(territory.position) <= territory.border_radius;
    let candidates: Vec<Vec2> = match template.placement.around {
        AnchorKind::Center => Vec::new(),
        AnchorKind::Resource => world
            .resources()
            .into_iter()
            .filter(|r| template.placement.codes.contains(&r.code) && inside(r.position))
            .map(|r| r.position)
            .collect(),
        AnchorKind::Building => world
            .buildings(territory.faction)
            .into_iter()
            .filter(|b| {
                template.placement.codes.contains(&b.code)
                    && !b.under_construction
                    && inside(b.position)
            })
            .map(|b| b.position)
            .collect(),
    };
    if candidates.is_empty() {
        return territory.position;
    }
    candidates[rng.gen_range(0..candidates.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PlacementConfig;
    use crate::core::range::{faction_rng, FloatRange, IntRange};
    use crate::core::types::Cost;
    use crate::world::Sandbox;

    const F: FactionId = FactionId(1);

    fn house(max: u32) -> BuildingRegulatorConfig {
        let mut config = BuildingRegulatorConfig::new("house");
        config.regulator.max_amount = IntRange::fixed(max);
        config.regulator.max_pending_amount = 1;
        config.regulator.spawn_reload = FloatRange::fixed(3.0);
        config.regulator.cost = Cost::new().with("wood", 30);
        config
    }

    fn setup() -> (Sandbox, BuildingId, BuildingId) {
        let mut world = Sandbox::new();
        world.add_faction(F, 10);
        world.set_stock(F, "wood", 300);
        let capital = world.spawn_center(F, "town_center", Vec2::ZERO, 20.0);
        let outpost = world.spawn_center(F, "outpost", Vec2::new(100.0, 0.0), 15.0);
        (world, capital, outpost)
    }

    fn resolver() -> PlacementResolver {
        PlacementResolver::new(F, PlacementConfig::default())
    }

    #[test]
    fn test_every_center_gets_its_own_instances() {
        let (world, capital, outpost) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(2)]);
        let mut rng = faction_rng(1, F);
        for center in world.centers(F) {
            creator.add_center(&world, &center, &mut rng);
        }
        assert_eq!(creator.centers().len(), 2);
        assert!(creator.slot(capital).unwrap().regulator("house").is_some());
        assert!(creator.slot(outpost).unwrap().regulator("house").is_some());
    }

    #[test]
    fn test_capital_only_template_skips_outposts() {
        let (world, capital, outpost) = setup();
        let mut barracks = BuildingRegulatorConfig::new("barracks");
        barracks.capital_only = true;
        let mut creator = BuildingCreator::new(F, vec![barracks]);
        let mut rng = faction_rng(1, F);
        for center in world.centers(F) {
            creator.add_center(&world, &center, &mut rng);
        }
        assert!(creator.slot(capital).unwrap().regulator("barracks").is_some());
        assert!(creator.slot(outpost).unwrap().regulator("barracks").is_none());
    }

    #[test]
    fn test_activate_fans_out_across_centers() {
        let (world, _, _) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(2)]);
        let mut rng = faction_rng(1, F);
        for center in world.centers(F) {
            creator.add_center(&world, &center, &mut rng);
        }
        let count = creator
            .activate_building_regulator(&world, "house", &mut rng)
            .unwrap();
        assert_eq!(count, 2, "already active instances are reused");
        assert!(creator.activate_building_regulator(&world, "wonder", &mut rng).is_err());
    }

    #[test]
    fn test_timer_submits_placement_and_spends() {
        let (mut world, capital, _) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(2)]);
        let mut placement = resolver();
        let mut rng = faction_rng(1, F);
        let info = world.building(capital).unwrap();
        creator.add_center(&world, &info, &mut rng);

        let outcome = creator.tick(&mut world, 3.0, &mut rng, &mut placement);
        assert_eq!(outcome.created, 1, "max pending is 1");
        assert_eq!(placement.len(), 1);
        assert_eq!(world.stock(F, "wood"), 270);
        assert_eq!(creator.slot(capital).unwrap().regulator("house").unwrap().pending_amount(), 1);
    }

    #[test]
    fn test_removing_center_destroys_instances() {
        let (world, capital, outpost) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(2)]);
        let mut rng = faction_rng(1, F);
        for center in world.centers(F) {
            creator.add_center(&world, &center, &mut rng);
        }
        assert!(creator.remove_center(outpost));
        assert!(!creator.remove_center(outpost));
        assert_eq!(creator.centers().len(), 1);
        assert_eq!(creator.centers()[0].center(), capital);
    }

    #[test]
    fn test_abandoned_placement_frees_quota() {
        let (mut world, capital, _) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(2)]);
        let mut placement = resolver();
        let mut rng = faction_rng(1, F);
        let info = world.building(capital).unwrap();
        creator.add_center(&world, &info, &mut rng);
        creator
            .create_request(&mut world, None, "house", RequestSource::OnDemand, 1, &mut rng, &mut placement)
            .unwrap();
        let ticket = placement.head().unwrap().ticket();

        let outcome = placement.cancel(ticket, &mut world, &mut rng).expect("queued");
        creator.apply_placement_outcome(&outcome);

        let reg = creator.slot(capital).unwrap().regulator("house").unwrap();
        assert_eq!(reg.amount(), 0);
        assert_eq!(world.stock(F, "wood"), 300, "refunded");
    }

    #[test]
    fn test_around_resource_anchor_inside_territory() {
        let (mut world, capital, _) = setup();
        let near = world.add_resource("berries", Vec2::new(5.0, 5.0), 100);
        world.add_resource("berries", Vec2::new(500.0, 0.0), 100);
        let mut mill = BuildingRegulatorConfig::new("mill");
        mill.placement.around = AnchorKind::Resource;
        mill.placement.codes = vec!["berries".into()];
        let territory = world.building(capital).unwrap();

        let mut rng = faction_rng(1, F);
        for _ in 0..10 {
            let anchor = choose_anchor(&world, &mill, &territory, &mut rng);
            assert_eq!(anchor, world.resource(near).unwrap().position);
        }
    }

    #[test]
    fn test_anchor_falls_back_to_center() {
        let (world, capital, _) = setup();
        let mut mill = BuildingRegulatorConfig::new("mill");
        mill.placement.around = AnchorKind::Resource;
        mill.placement.codes = vec!["berries".into()];
        let territory = world.building(capital).unwrap();
        let anchor = choose_anchor(&world, &mill, &territory, &mut faction_rng(1, F));
        assert_eq!(anchor, Vec2::ZERO);
    }

    #[test]
    fn test_quota_fills_as_placements_settle() {
        let (mut world, capital, _) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(4)]);
        let mut placement = resolver();
        let mut rng = faction_rng(1, F);
        let info = world.building(capital).unwrap();
        creator.add_center(&world, &info, &mut rng);

        for _ in 0..200 {
            creator.tick(&mut world, 0.5, &mut rng, &mut placement);
            for outcome in placement.tick(&mut world, 0.5, &mut rng) {
                creator.apply_placement_outcome(&outcome);
            }
        }

        let reg = creator.slot(capital).unwrap().regulator("house").unwrap();
        assert_eq!(reg.current().len(), 4, "one placement at a time, still fills the quota");
        assert_eq!(reg.pending_amount(), 0);
        assert_eq!(world.stock(F, "wood"), 300 - 4 * 30);
    }

    #[test]
    fn test_placed_building_reactivates() {
        let (mut world, capital, _) = setup();
        let mut creator = BuildingCreator::new(F, vec![house(4)]);
        let mut placement = resolver();
        let mut rng = faction_rng(1, F);
        let info = world.building(capital).unwrap();
        creator.add_center(&world, &info, &mut rng);
        creator.tick(&mut world, 3.0, &mut rng, &mut placement);
        creator.tick(&mut world, 0.1, &mut rng, &mut placement);
        assert!(!creator.is_active(), "idle while the pending cap is full");

        let ticket = placement.head().unwrap().ticket();
        creator.on_building_placed(BuildingId(999), "house", Some(capital), Some(ticket));
        assert!(creator.is_active(), "pending room freed");
        let reg = creator.slot(capital).unwrap().regulator("house").unwrap();
        assert_eq!(reg.pending_amount(), 0);
        assert_eq!(reg.current().len(), 1);
    }

    #[test]
    fn test_destroyed_building_frees_quota() {
        let (mut world, capital, _) = setup();
        let house_id = world.spawn_building(F, "house", Vec2::new(5.0, 0.0), Some(capital));
        let mut creator = BuildingCreator::new(F, vec![house(1)]);
        let mut placement = resolver();
        let mut rng = faction_rng(1, F);
        let info = world.building(capital).unwrap();
        creator.add_center(&world, &info, &mut rng);
        creator.tick(&mut world, 0.1, &mut rng, &mut placement);
        assert!(!creator.is_active(), "adopted house fills the quota");

        creator.on_building_destroyed(BuildingId(999), "house");
        assert!(!creator.is_active(), "untracked building changes nothing");

        creator.on_building_destroyed(house_id, "house");
        assert!(creator.is_active());
        assert_eq!(creator.slot(capital).unwrap().regulator("house").unwrap().amount(), 0);
    }
}

