//! Skirmish runner
//! Computer factions play each other on the in-memory sandbox

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use faction_ai::core::config::load_profile;
use faction_ai::core::error::Result;
use faction_ai::core::types::{BuildingId, FactionId, UnitId};
use faction_ai::npc::AiHost;
use faction_ai::world::{
    AttackTarget, IssuedOrder, Roster, Sandbox, UnitActivity, UnitTemplate,
};
use glam::Vec2;
use serde::Serialize;

/// Skirmish - computer factions compete until one is left standing
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run computer-controlled factions against each other")]
struct Args {
    /// Random seed for reproducible runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of factions (2-4)
    #[arg(long, default_value_t = 2)]
    factions: u32,

    /// Profile loaded from data/npc_profiles
    #[arg(long, default_value = "default")]
    profile: String,

    /// Simulated seconds per step
    #[arg(long, default_value_t = 0.5)]
    dt: f32,

    /// Maximum steps before calling a draw
    #[arg(long, default_value_t = 20_000)]
    steps: u32,

    /// Log every AI decision
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Write a JSON summary of the final state here
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FactionReport {
    faction: u32,
    governed: bool,
    units: usize,
    buildings: usize,
    attack_power: f32,
}

#[derive(Debug, Serialize)]
struct SkirmishReport {
    seed: u64,
    seconds: f32,
    winner: Option<u32>,
    factions: Vec<FactionReport>,
}

/// Builder-seconds needed to finish a building
const BUILD_WORK: f32 = 20.0;
/// Damage before a building falls
const BUILDING_HEALTH: f32 = 600.0;
const BASE_POPULATION: u32 = 10;
const POPULATION_PER_HOUSE: u32 = 5;

/// Game rules the sandbox leaves to its driver: income, construction
/// progress, and combat
#[derive(Default)]
struct Referee {
    work: BTreeMap<BuildingId, f32>,
    damage: BTreeMap<BuildingId, f32>,
    targets: BTreeMap<UnitId, AttackTarget>,
}

impl Referee {
    fn step(&mut self, world: &mut Sandbox, dt: f32) {
        for order in world.take_orders() {
            match order {
                IssuedOrder::Attack { unit, target } => {
                    self.targets.insert(unit, target);
                }
                other => {
                    self.targets.remove(&other.unit());
                }
            }
        }

        let factions: Vec<FactionId> = world
            .factions()
            .into_iter()
            .filter(|f| !f.eliminated)
            .map(|f| f.id)
            .collect();
        for &faction in &factions {
            self.income(world, faction, dt);
            self.construction(world, faction, dt);
            self.combat(world, faction, dt);
        }

        for &faction in &factions {
            if world.buildings(faction).is_empty() {
                tracing::info!(faction = %faction, "faction eliminated");
                world.eliminate(faction);
            }
        }
    }

    fn income(&self, world: &mut Sandbox, faction: FactionId, dt: f32) {
        let mut earned: BTreeMap<&'static str, f32> = BTreeMap::new();
        for unit in world.units(faction) {
            let UnitActivity::Collecting(resource) = unit.activity else {
                continue;
            };
            let stock = match world.resource(resource).map(|r| r.code) {
                Some(code) if code == "berries" => "food",
                Some(code) if code == "tree" => "wood",
                Some(code) if code == "gold_mine" => "gold",
                _ => continue,
            };
            *earned.entry(stock).or_default() += dt;
        }
        for (stock, amount) in earned {
            let total = world.stock(faction, stock) + amount.round() as u32;
            world.set_stock(faction, stock, total);
        }
    }

    fn construction(&mut self, world: &mut Sandbox, faction: FactionId, dt: f32) {
        for unit in world.units(faction) {
            if let UnitActivity::Constructing(building) = unit.activity {
                *self.work.entry(building).or_default() += dt;
            }
        }
        let finished: Vec<BuildingId> = self
            .work
            .iter()
            .filter(|(_, work)| **work >= BUILD_WORK)
            .map(|(id, _)| *id)
            .collect();
        for building in finished {
            self.work.remove(&building);
            let Some(info) = world.building(building) else {
                continue;
            };
            world.complete_construction(building);
            tracing::debug!(faction = %info.faction, code = %info.code, "construction finished");
            if info.code == "house" {
                let houses = world
                    .buildings(info.faction)
                    .iter()
                    .filter(|b| b.code == "house" && !b.under_construction)
                    .count() as u32;
                world.set_max_population(info.faction, BASE_POPULATION + houses * POPULATION_PER_HOUSE);
            }
        }
    }

    fn combat(&mut self, world: &mut Sandbox, faction: FactionId, dt: f32) {
        for unit in world.units(faction) {
            if unit.activity != UnitActivity::Attacking {
                continue;
            }
            match self.targets.get(&unit.id).copied() {
                Some(AttackTarget::Building(target)) => {
                    world.damage_building(target, unit.id, unit.attack_power as i32);
                    let dealt = self.damage.entry(target).or_default();
                    *dealt += unit.attack_power * dt;
                    if *dealt >= BUILDING_HEALTH {
                        self.damage.remove(&target);
                        world.destroy_building(target);
                    }
                }
                Some(AttackTarget::Unit(target)) => {
                    world.damage_unit(target, unit.id, unit.attack_power as i32);
                    world.kill_unit(target);
                    self.targets.remove(&unit.id);
                }
                None => {}
            }
        }
    }
}

fn setup(args: &Args) -> Sandbox {
    let mut world = Sandbox::new();
    world.add_unit_template(
        "villager",
        UnitTemplate {
            attack_power: 2.0,
            is_army: false,
            launcher: "town_center".into(),
            build_time: 8.0,
        },
    );
    world.add_unit_template(
        "soldier",
        UnitTemplate {
            attack_power: 30.0,
            is_army: true,
            launcher: "barracks".into(),
            build_time: 12.0,
        },
    );

    let count = args.factions.clamp(2, 4);
    for i in 0..count {
        let faction = FactionId(i + 1);
        let angle = i as f32 / count as f32 * std::f32::consts::TAU;
        let home = Vec2::new(angle.cos(), angle.sin()) * 120.0;

        world.add_faction(faction, BASE_POPULATION);
        for (stock, amount) in [("food", 400), ("wood", 400), ("gold", 100)] {
            world.set_stock(faction, stock, amount);
        }
        world.spawn_center(faction, "town_center", home, 30.0);
        for v in 0..3 {
            world.spawn_unit(faction, "villager", home + Vec2::new(v as f32, -3.0));
        }
        world.add_resource("berries", home + Vec2::new(12.0, 6.0), 5_000);
        world.add_resource("tree", home + Vec2::new(-14.0, 4.0), 5_000);
        world.add_resource("gold_mine", home + Vec2::new(0.0, 16.0), 5_000);
    }
    world
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "faction_ai=debug"
    } else {
        "faction_ai=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let profile = load_profile(&args.profile)?;
    let mut world = setup(&args);
    let mut host = AiHost::new(args.seed);
    for info in world.factions() {
        host.add_faction(&world, info.id, &profile)?;
    }
    tracing::info!(seed = args.seed, factions = host.factions().len(), profile = %profile.name, "skirmish started");

    let mut referee = Referee::default();
    let mut step = 0;
    while step < args.steps && host.factions().len() > 1 {
        world.advance(args.dt);
        referee.step(&mut world, args.dt);
        host.step(&mut world, args.dt);
        step += 1;

        if step % 240 == 0 {
            for faction in host.factions() {
                let Some(governor) = host.governor(faction) else {
                    continue;
                };
                tracing::info!(
                    time = step as f32 * args.dt,
                    faction = %faction,
                    units = world.units(faction).len(),
                    buildings = world.buildings(faction).len(),
                    power = world.attack_power(faction),
                    attacking = governor.is_attacking(),
                    defending = governor.is_defending(),
                    "status"
                );
            }
        }
    }

    let survivors = host.factions();
    match survivors.as_slice() {
        [winner] => tracing::info!(winner = %winner, seconds = step as f32 * args.dt, "skirmish won"),
        _ => tracing::info!(survivors = survivors.len(), "skirmish ended without a winner"),
    }

    if let Some(path) = &args.report {
        let report = SkirmishReport {
            seed: args.seed,
            seconds: step as f32 * args.dt,
            winner: match survivors.as_slice() {
                [winner] => Some(winner.0),
                _ => None,
            },
            factions: world
                .factions()
                .iter()
                .map(|f| FactionReport {
                    faction: f.id.0,
                    governed: survivors.contains(&f.id),
                    units: world.units(f.id).len(),
                    buildings: world.buildings(f.id).len(),
                    attack_power: world.attack_power(f.id),
                })
                .collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}
