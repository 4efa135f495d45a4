//! Property tests for the quota ledger, the aging queue, and world queries

use faction_ai::core::config::{RegulatorConfig, SchedulerConfig};
use faction_ai::core::range::{faction_rng, IntRange};
use faction_ai::core::types::{BuildingId, EntityRef, FactionId, ItemRef, Ticket, UnitId};
use faction_ai::npc::{Regulator, TaskKind, TaskScheduler};
use faction_ai::world::{nearest_building, BuildingInfo};
use glam::Vec2;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Reserve(u64),
    Materialize(Option<u64>, u32),
    RemovePending(u64),
    RemoveCurrent(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..6).prop_map(Op::Reserve),
        (proptest::option::of(0u64..6), 0u32..6).prop_map(|(t, u)| Op::Materialize(t, u)),
        (0u64..6).prop_map(Op::RemovePending),
        (0u32..6).prop_map(Op::RemoveCurrent),
    ]
}

fn regulator() -> Regulator {
    let mut config = RegulatorConfig::new("villager");
    config.min_amount = IntRange::fixed(2);
    config.max_amount = IntRange::fixed(4);
    config.max_pending_amount = 2;
    Regulator::new(&config, &mut faction_rng(0, FactionId(1)))
}

fn unit(id: u32) -> EntityRef {
    EntityRef::Unit(UnitId(id))
}

proptest! {
    /// amount is always live items plus reservations, whatever order events arrive in
    #[test]
    fn test_regulator_matches_model(ops in proptest::collection::vec(op(), 0..60)) {
        let mut reg = regulator();
        let mut pending: Vec<u64> = Vec::new();
        let mut current: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                Op::Reserve(t) => {
                    let fresh = !pending.contains(&t);
                    if fresh {
                        pending.push(t);
                    }
                    prop_assert_eq!(reg.reserve(Ticket(t)), fresh);
                }
                Op::Materialize(t, u) => {
                    if let Some(t) = t {
                        pending.retain(|p| *p != t);
                    }
                    let fresh = !current.contains(&u);
                    if fresh {
                        current.push(u);
                    }
                    prop_assert_eq!(reg.materialize(t.map(Ticket), unit(u)), fresh);
                }
                Op::RemovePending(t) => {
                    let tracked = pending.iter().position(|p| *p == t);
                    if let Some(idx) = tracked {
                        pending.remove(idx);
                    }
                    let result = reg.remove_item(ItemRef::Pending(Ticket(t)));
                    prop_assert_eq!(result.is_ok(), tracked.is_some());
                }
                Op::RemoveCurrent(u) => {
                    let tracked = current.iter().position(|c| *c == u);
                    if let Some(idx) = tracked {
                        current.remove(idx);
                    }
                    let result = reg.remove_item(ItemRef::Current(unit(u)));
                    prop_assert_eq!(result.is_ok(), tracked.is_some());
                }
            }

            prop_assert_eq!(reg.pending_amount() as usize, pending.len());
            prop_assert_eq!(reg.current().len(), current.len());
            prop_assert_eq!(reg.amount() as usize, pending.len() + current.len());
            prop_assert_eq!(reg.room_left(), 4u32.saturating_sub(reg.amount()));
        }
    }

    /// Once the quota is full, reservations and spawns never un-fill it
    #[test]
    fn test_max_amount_stays_reached_without_removals(
        ops in proptest::collection::vec(op(), 0..60),
    ) {
        let mut reg = regulator();
        let mut full = false;

        for op in ops {
            match op {
                Op::Reserve(t) => {
                    reg.reserve(Ticket(t));
                }
                // A host reports each new entity once
                Op::Materialize(_, u) if reg.current().contains(&unit(u)) => continue,
                Op::Materialize(t, u) => {
                    reg.materialize(t.map(Ticket), unit(u));
                }
                Op::RemovePending(_) | Op::RemoveCurrent(_) => continue,
            }
            if full {
                prop_assert!(reg.has_reached_max_amount(false), "quota un-filled without a removal");
            }
            full |= reg.amount() >= reg.max_amount();
        }
    }

    /// A task inserted at level L climbs one level every P clock ticks
    #[test]
    fn test_task_reaches_level_zero_after_l_times_p(
        levels in 1usize..6,
        threshold in 1u32..8,
        inserted in 0usize..6,
    ) {
        let config = SchedulerConfig {
            levels,
            clock_length: 1.0,
            promotion_threshold: threshold,
        };
        let mut scheduler = TaskScheduler::new(&config);
        let level = inserted.min(levels - 1);
        let id = scheduler.add_task(TaskKind::ConstructBuilding(BuildingId(1)), inserted);
        prop_assert_eq!(scheduler.level_of(id), Some(level));

        let total = level as u32 * threshold;
        for tick in 1..=total + threshold {
            prop_assert_eq!(scheduler.advance(1.0), 1);
            let expected = level.saturating_sub((tick / threshold) as usize);
            prop_assert_eq!(scheduler.level_of(id), Some(expected), "after {} ticks", tick);
        }
    }

    /// Nothing is strictly closer than the nearest building, and ties keep the first
    #[test]
    fn test_nearest_building_is_minimal(
        xs in proptest::collection::vec(-50i32..50, 1..12),
        probe in -50i32..50,
    ) {
        let buildings: Vec<BuildingInfo> = xs
            .iter()
            .enumerate()
            .map(|(i, x)| BuildingInfo {
                id: BuildingId(i as u32),
                faction: FactionId(1),
                code: "house".into(),
                position: Vec2::new(*x as f32, 0.0),
                is_center: false,
                is_capital: false,
                border_radius: 0.0,
                under_construction: false,
                center: None,
            })
            .collect();
        let position = Vec2::new(probe as f32, 0.0);
        let nearest = nearest_building(&buildings, position).unwrap();
        let best = nearest.position.distance(position);

        prop_assert!(buildings.iter().all(|b| b.position.distance(position) >= best));
        let first_at_best = buildings
            .iter()
            .position(|b| b.position.distance(position) == best)
            .unwrap();
        prop_assert_eq!(nearest.id, BuildingId(first_at_best as u32));
    }
}
