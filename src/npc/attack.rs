//! Attack director - offense state machine
//!
//! Idle -> WaitingToLaunch -> Attacking -> Idle. Three
//! independent reload timers drive target selection, the launch check, and
//! in-progress attack management. Cancelling is synchronous: once
//! `cancel_attack` returns, nothing about the attack is left behind.

use glam::Vec2;
use rand::Rng;

use crate::core::config::{AttackConfig, TargetPolicy};
use crate::core::range::ReloadTimer;
use crate::core::types::{BuildingId, FactionId, UnitId};
use crate::world::{nearest_building, AttackTarget, FactionWorld, Roster, UnitActivity, UnitInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    /// No target faction chosen
    Idle,
    /// Target chosen, waiting for enough power
    WaitingToLaunch,
    Attacking,
}

/// Why the last attack ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackEnd {
    /// Called off from outside (e.g. defending at home)
    Cancelled,
    /// Deployed power fell to the surrender threshold
    Surrendered,
    /// The target faction was eliminated
    TargetEliminated,
    /// The target faction has no building left worth attacking
    NoTarget,
}

/// State that only exists while an attack is under way
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAttack {
    pub deployed: Vec<UnitId>,
    pub target_building: Option<BuildingId>,
    pub last_known_position: Vec2,
    pub surrender_power: f32,
}

pub struct AttackDirector {
    faction: FactionId,
    config: AttackConfig,
    target_faction: Option<FactionId>,
    attack: Option<ActiveAttack>,
    select_timer: ReloadTimer,
    launch_timer: ReloadTimer,
    progress_timer: ReloadTimer,
    last_end: Option<AttackEnd>,
}

impl AttackDirector {
    pub fn new<R: Rng + ?Sized>(faction: FactionId, config: AttackConfig, rng: &mut R) -> Self {
        let select_timer = ReloadTimer::new(config.select_target_reload, rng);
        let launch_timer = ReloadTimer::new(config.launch_reload, rng);
        let progress_timer = ReloadTimer::new(config.progress_reload, rng);
        Self {
            faction,
            config,
            target_faction: None,
            attack: None,
            select_timer,
            launch_timer,
            progress_timer,
            last_end: None,
        }
    }

    pub fn is_attacking(&self) -> bool {
        self.attack.is_some()
    }

    pub fn phase(&self) -> AttackPhase {
        match (&self.attack, self.target_faction) {
            (Some(_), _) => AttackPhase::Attacking,
            (None, Some(_)) => AttackPhase::WaitingToLaunch,
            (None, None) => AttackPhase::Idle,
        }
    }

    pub fn target_faction(&self) -> Option<FactionId> {
        self.target_faction
    }

    pub fn active(&self) -> Option<&ActiveAttack> {
        self.attack.as_ref()
    }

    pub fn deployed(&self) -> &[UnitId] {
        self.attack
            .as_ref()
            .map(|a| a.deployed.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_deployed(&self, unit: UnitId) -> bool {
        self.deployed().contains(&unit)
    }

    pub fn target_building(&self) -> Option<BuildingId> {
        self.attack.as_ref().and_then(|a| a.target_building)
    }

    pub fn last_end(&self) -> Option<AttackEnd> {
        self.last_end
    }

    pub fn tick<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        dt: f32,
        defending: bool,
        rng: &mut R,
    ) {
        if !self.config.enabled {
            return;
        }

        if self.select_timer.tick(dt, rng) && !self.is_attacking() {
            self.select_target_faction(world, rng);
        }

        if self.is_attacking() {
            if self.progress_timer.tick(dt, rng) {
                self.attack_progress(world);
            }
        } else if self.launch_timer.tick(dt, rng) {
            self.launch_attack_progress(world, defending, rng);
        }
    }

    /// Pick the faction to attack next; `None` when nobody is left
    pub fn select_target_faction<W: Roster, R: Rng + ?Sized>(
        &mut self,
        world: &W,
        rng: &mut R,
    ) -> Option<FactionId> {
        let candidates: Vec<FactionId> = world
            .factions()
            .into_iter()
            .filter(|f| f.id != self.faction && !f.eliminated)
            .map(|f| f.id)
            .collect();

        self.target_faction = match self.config.target_policy {
            TargetPolicy::Weakest => {
                let mut weakest: Option<(FactionId, f32)> = None;
                for faction in candidates {
                    let power = world.attack_power(faction);
                    if weakest.map_or(true, |(_, p)| power < p) {
                        weakest = Some((faction, power));
                    }
                }
                weakest.map(|(f, _)| f)
            }
            TargetPolicy::Random if candidates.is_empty() => None,
            TargetPolicy::Random => Some(candidates[rng.gen_range(0..candidates.len())]),
        };

        if let Some(target) = self.target_faction {
            tracing::debug!(faction = %self.faction, target = %target, "attack target selected");
        }
        self.target_faction
    }

    /// Launch if a target exists, we are not defending, and power beats a fresh threshold
    pub fn launch_attack_progress<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        defending: bool,
        rng: &mut R,
    ) -> bool {
        if self.is_attacking() || self.target_faction.is_none() || defending {
            return false;
        }
        let power = world.attack_power(self.faction);
        let threshold = self.config.launch_power.sample(rng);
        if power <= threshold {
            tracing::debug!(faction = %self.faction, power, threshold, "not strong enough to attack");
            return false;
        }
        self.launch_attack(world, rng)
    }

    fn launch_attack<W: FactionWorld, R: Rng + ?Sized>(&mut self, world: &mut W, rng: &mut R) -> bool {
        let Some(target) = self.target_faction else {
            return false;
        };
        let army: Vec<UnitInfo> = world
            .units(self.faction)
            .into_iter()
            .filter(|u| u.is_army)
            .collect();
        let ratio = self.config.defense_ratio.sample(rng);
        let count = (army.len() as f32 * (1.0 - ratio)).floor() as usize;
        if count == 0 {
            return false;
        }

        let anchor = world
            .capital(self.faction)
            .map(|c| c.position)
            .unwrap_or(army[0].position);
        self.attack = Some(ActiveAttack {
            deployed: army.iter().take(count).map(|u| u.id).collect(),
            target_building: None,
            last_known_position: anchor,
            surrender_power: self.config.surrender_power.sample(rng),
        });

        if !self.set_target_building(world) {
            self.finish(world, AttackEnd::NoTarget);
            return false;
        }
        tracing::info!(
            faction = %self.faction,
            target = %target,
            deployed = count,
            kept_home = army.len() - count,
            "attack launched"
        );
        self.issue_attack_orders(world);
        true
    }

    /// Aim at the target faction's building nearest the last known position
    fn set_target_building<W: Roster>(&mut self, world: &W) -> bool {
        let (Some(target), Some(attack)) = (self.target_faction, self.attack.as_mut()) else {
            return false;
        };
        let codes = &self.config.target_building_codes;
        let candidates: Vec<_> = world
            .buildings(target)
            .into_iter()
            .filter(|b| codes.is_empty() || codes.contains(&b.code))
            .collect();
        match nearest_building(&candidates, attack.last_known_position) {
            Some(building) => {
                attack.target_building = Some(building.id);
                attack.last_known_position = building.position;
                true
            }
            None => {
                attack.target_building = None;
                false
            }
        }
    }

    fn attack_progress<W: FactionWorld>(&mut self, world: &mut W) {
        let faction = self.faction;
        let target_faction = self.target_faction;
        let Some(attack) = self.attack.as_mut() else {
            return;
        };

        attack
            .deployed
            .retain(|id| world.unit(*id).is_some_and(|u| u.faction == faction));
        let power: f32 = attack
            .deployed
            .iter()
            .filter_map(|id| world.unit(*id))
            .map(|u| u.attack_power)
            .sum();
        if power <= attack.surrender_power {
            tracing::info!(faction = %faction, power, "attack force depleted, surrendering");
            self.finish(world, AttackEnd::Surrendered);
            return;
        }

        let target_alive = attack
            .target_building
            .and_then(|b| world.building(b))
            .is_some_and(|b| Some(b.faction) == target_faction);
        if !target_alive && !self.set_target_building(world) {
            self.finish(world, AttackEnd::NoTarget);
            return;
        }
        self.issue_attack_orders(world);
    }

    /// Attack the target building, or a worker actively constructing it
    fn issue_attack_orders<W: FactionWorld>(&mut self, world: &mut W) {
        let (Some(target), Some(attack)) = (self.target_faction, self.attack.as_ref()) else {
            return;
        };
        let Some(building) = attack.target_building else {
            return;
        };
        let order = world
            .units(target)
            .into_iter()
            .find(|u| u.activity == UnitActivity::Constructing(building))
            .map(|u| AttackTarget::Unit(u.id))
            .unwrap_or(AttackTarget::Building(building));
        let deployed = attack.deployed.clone();
        for unit in deployed {
            world.order_attack(unit, order);
        }
    }

    /// Recall everyone and forget the attack; returns whether one was running
    pub fn cancel_attack<W: FactionWorld>(&mut self, world: &mut W) -> bool {
        if !self.is_attacking() {
            return false;
        }
        self.finish(world, AttackEnd::Cancelled);
        true
    }

    fn finish<W: FactionWorld>(&mut self, world: &mut W, reason: AttackEnd) {
        let Some(attack) = self.attack.take() else {
            self.target_faction = None;
            return;
        };
        let capital = world.capital(self.faction).map(|c| c.position);
        for id in attack.deployed {
            let Some(unit) = world.unit(id) else {
                continue;
            };
            let home = unit
                .creator
                .and_then(|b| world.building(b))
                .filter(|b| b.faction == self.faction)
                .map(|b| b.position)
                .or(capital);
            if let Some(home) = home {
                world.order_move(id, home);
            }
        }
        self.target_faction = None;
        self.last_end = Some(reason);
        tracing::info!(faction = %self.faction, ?reason, "attack ended");
    }

    /// A unit died or changed sides
    pub fn on_unit_removed(&mut self, unit: UnitId) {
        if let Some(attack) = self.attack.as_mut() {
            attack.deployed.retain(|id| *id != unit);
        }
    }

    pub fn on_faction_eliminated<W: FactionWorld>(&mut self, world: &mut W, faction: FactionId) {
        if self.target_faction != Some(faction) {
            return;
        }
        if self.is_attacking() {
            self.finish(world, AttackEnd::TargetEliminated);
        } else {
            self.target_faction = None;
        }
    }

    /// Drop all state without issuing orders (faction teardown)
    pub fn clear(&mut self) {
        self.attack = None;
        self.target_faction = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::range::{faction_rng, FloatRange};
    use crate::world::{IssuedOrder, Sandbox, UnitTemplate};

    const ME: FactionId = FactionId(1);
    const FOE: FactionId = FactionId(2);
    const OTHER: FactionId = FactionId(3);

    fn world() -> Sandbox {
        let mut world = Sandbox::new();
        for f in [ME, FOE, OTHER] {
            world.add_faction(f, 50);
        }
        world.add_unit_template(
            "soldier",
            UnitTemplate {
                attack_power: 50.0,
                is_army: true,
                launcher: "barracks".into(),
                build_time: 1.0,
            },
        );
        world.spawn_center(ME, "town_center", Vec2::ZERO, 20.0);
        world.spawn_center(FOE, "town_center", Vec2::new(200.0, 0.0), 20.0);
        world.spawn_center(OTHER, "town_center", Vec2::new(0.0, 200.0), 20.0);
        world
    }

    fn config() -> AttackConfig {
        AttackConfig {
            launch_power: FloatRange::fixed(100.0),
            surrender_power: FloatRange::fixed(40.0),
            defense_ratio: FloatRange::fixed(0.25),
            ..Default::default()
        }
    }

    fn soldiers(world: &mut Sandbox, faction: FactionId, n: usize) -> Vec<UnitId> {
        (0..n)
            .map(|_| world.spawn_unit(faction, "soldier", Vec2::ZERO))
            .collect()
    }

    fn launched(world: &mut Sandbox, config: AttackConfig) -> AttackDirector {
        let mut rng = faction_rng(1, ME);
        let mut director = AttackDirector::new(ME, config, &mut rng);
        director.select_target_faction(world, &mut rng);
        assert!(director.launch_attack_progress(world, false, &mut rng));
        director
    }

    #[test]
    fn test_weakest_target_first_minimum_wins() {
        let mut world = world();
        soldiers(&mut world, FOE, 2);
        soldiers(&mut world, OTHER, 2);
        let mut rng = faction_rng(1, ME);
        let mut director = AttackDirector::new(ME, config(), &mut rng);
        assert_eq!(director.select_target_faction(&world, &mut rng), Some(FOE));

        soldiers(&mut world, FOE, 1);
        assert_eq!(director.select_target_faction(&world, &mut rng), Some(OTHER));
    }

    #[test]
    fn test_eliminated_factions_are_never_targeted() {
        let mut world = world();
        world.eliminate(FOE);
        world.eliminate(OTHER);
        let mut rng = faction_rng(1, ME);
        let mut director = AttackDirector::new(
            ME,
            AttackConfig {
                target_policy: TargetPolicy::Random,
                ..config()
            },
            &mut rng,
        );
        assert_eq!(director.select_target_faction(&world, &mut rng), None);
        assert_eq!(director.phase(), AttackPhase::Idle);
    }

    #[test]
    fn test_scenario_launch_power_threshold_is_a_coin_flip_at_midpoint() {
        let mut world = world();
        soldiers(&mut world, ME, 7);
        let recruit = soldiers(&mut world, ME, 1)[0];
        world.set_unit_power(recruit, 0.0);
        // 7 * 50 = 350 against a [300, 400) threshold
        let attack = AttackConfig {
            launch_power: FloatRange::new(300.0, 400.0),
            ..config()
        };

        let decide = |seed: u64| {
            let mut world = world.clone();
            let mut rng = faction_rng(seed, ME);
            let mut director = AttackDirector::new(ME, attack.clone(), &mut rng);
            director.select_target_faction(&world, &mut rng);
            director.launch_attack_progress(&mut world, false, &mut rng)
        };

        let launches = (0..400).filter(|seed| decide(*seed)).count();
        assert!((140..=260).contains(&launches), "launched {} of 400", launches);
        for seed in 0..20 {
            assert_eq!(decide(seed), decide(seed), "seed {} is deterministic", seed);
        }
    }

    #[test]
    fn test_launch_keeps_defenders_home() {
        let mut world = world();
        let army = soldiers(&mut world, ME, 10);
        let director = launched(&mut world, config());

        assert_eq!(director.phase(), AttackPhase::Attacking);
        assert_eq!(director.deployed(), &army[..7], "floor(10 * 0.75)");
        let attackers: Vec<UnitId> = world.orders().iter().map(IssuedOrder::unit).collect();
        assert_eq!(attackers, army[..7].to_vec());
    }

    #[test]
    fn test_defending_blocks_launch() {
        let mut world = world();
        soldiers(&mut world, ME, 10);
        let mut rng = faction_rng(1, ME);
        let mut director = AttackDirector::new(ME, config(), &mut rng);
        director.select_target_faction(&world, &mut rng);
        assert!(!director.launch_attack_progress(&mut world, true, &mut rng));
        assert_eq!(director.phase(), AttackPhase::WaitingToLaunch);
    }

    #[test]
    fn test_target_building_nearest_to_capital_among_codes() {
        let mut world = world();
        soldiers(&mut world, ME, 4);
        let foe_center = world.capital(FOE).unwrap().id;
        let barracks = world.spawn_building(FOE, "barracks", Vec2::new(150.0, 0.0), Some(foe_center));
        world.spawn_building(FOE, "house", Vec2::new(120.0, 0.0), Some(foe_center));

        let director = launched(
            &mut world,
            AttackConfig {
                target_building_codes: vec!["town_center".into(), "barracks".into()],
                ..config()
            },
        );
        assert_eq!(director.target_building(), Some(barracks));
    }

    #[test]
    fn test_progress_redirects_to_constructing_worker() {
        let mut world = world();
        soldiers(&mut world, ME, 4);
        let director_target = world.capital(FOE).unwrap().id;
        let worker = world.spawn_unit(FOE, "villager", Vec2::new(195.0, 0.0));
        world.set_unit_activity(worker, UnitActivity::Constructing(director_target));

        let mut director = launched(&mut world, config());
        world.take_orders();
        director.attack_progress(&mut world);

        assert!(world.orders().iter().all(|o| matches!(
            o,
            IssuedOrder::Attack { target: AttackTarget::Unit(u), .. } if *u == worker
        )));
        assert_eq!(world.orders().len(), 3);
    }

    #[test]
    fn test_surrender_recalls_everyone() {
        let mut world = world();
        let army = soldiers(&mut world, ME, 4);
        let mut director = launched(&mut world, config());
        for id in &army[..2] {
            world.kill_unit(*id);
        }
        world.set_unit_power(army[2], 10.0);
        world.take_orders();

        director.attack_progress(&mut world);
        assert!(!director.is_attacking());
        assert_eq!(director.last_end(), Some(AttackEnd::Surrendered));
        assert!(matches!(world.orders(), [IssuedOrder::Move { unit, position }] if *unit == army[2] && *position == Vec2::ZERO));
    }

    #[test]
    fn test_cancel_attack_postcondition() {
        let mut world = world();
        soldiers(&mut world, ME, 6);
        let mut director = launched(&mut world, config());
        assert!(director.cancel_attack(&mut world));
        assert!(!director.is_attacking());
        assert!(director.deployed().is_empty());
        assert!(director.target_building().is_none());
        assert!(director.target_faction().is_none());
        assert!(!director.cancel_attack(&mut world), "second cancel is a no-op");
    }

    #[test]
    fn test_target_elimination_ends_attack() {
        let mut world = world();
        soldiers(&mut world, ME, 6);
        let mut director = launched(&mut world, config());
        director.on_faction_eliminated(&mut world, OTHER);
        assert!(director.is_attacking(), "unrelated elimination ignored");
        director.on_faction_eliminated(&mut world, FOE);
        assert_eq!(director.last_end(), Some(AttackEnd::TargetEliminated));
    }

    #[test]
    fn test_dead_units_pruned_from_deployment() {
        let mut world = world();
        let army = soldiers(&mut world, ME, 4);
        let mut director = launched(&mut world, config());
        director.on_unit_removed(army[0]);
        assert_eq!(director.deployed(), &army[1..3]);
    }

    #[test]
    fn test_no_target_building_cancels() {
        let mut world = world();
        soldiers(&mut world, ME, 4);
        let mut director = launched(&mut world, config());
        let foe_center = world.capital(FOE).unwrap().id;
        world.destroy_building(foe_center);
        director.attack_progress(&mut world);
        assert_eq!(director.last_end(), Some(AttackEnd::NoTarget));
        assert!(director.deployed().is_empty());
    }
}
