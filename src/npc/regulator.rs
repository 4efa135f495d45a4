//! Quota ledger for one item type
//!
//! A regulator counts how many items of one code a faction (or one of its
//! territories) owns or has asked for, and answers whether more may be
//! requested. Every tracked item carries its state explicitly: it is either a
//! pending reservation (by ticket) or a current entity, never both, so
//! out-of-order lifecycle events cannot decrement a counter twice.

use rand::Rng;

use crate::core::config::RegulatorConfig;
use crate::core::error::{AiError, Result};
use crate::core::types::{Cost, EntityRef, ItemRef, Ticket};

#[derive(Debug, Clone)]
pub struct Regulator {
    code: String,
    min_amount: u32,
    max_amount: u32,
    max_pending_amount: u32,
    pending: Vec<Ticket>,
    current: Vec<EntityRef>,
    auto_create: bool,
    create_on_demand: bool,
    cost: Cost,
}

impl Regulator {
    /// Sample the quota bounds once; the minimum never exceeds the maximum
    pub fn new<R: Rng + ?Sized>(config: &RegulatorConfig, rng: &mut R) -> Self {
        let max_amount = config.max_amount.sample(rng);
        let min_amount = config.min_amount.sample(rng).min(max_amount);
        Self {
            code: config.code.clone(),
            min_amount,
            max_amount,
            max_pending_amount: config.max_pending_amount,
            pending: Vec::new(),
            current: Vec::new(),
            auto_create: config.auto_create,
            create_on_demand: config.create_on_demand,
            cost: config.cost.clone(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn min_amount(&self) -> u32 {
        self.min_amount
    }

    pub fn max_amount(&self) -> u32 {
        self.max_amount
    }

    pub fn max_pending_amount(&self) -> u32 {
        self.max_pending_amount
    }

    /// Materialized plus pending items
    pub fn amount(&self) -> u32 {
        (self.current.len() + self.pending.len()) as u32
    }

    pub fn pending_amount(&self) -> u32 {
        self.pending.len() as u32
    }

    pub fn current(&self) -> &[EntityRef] {
        &self.current
    }

    pub fn cost(&self) -> &Cost {
        &self.cost
    }

    pub fn allows_auto_create(&self) -> bool {
        self.auto_create
    }

    pub fn allows_on_demand(&self) -> bool {
        self.create_on_demand
    }

    /// `hard_cap` is the host's faction-wide limit for this code
    pub fn has_reached_max_amount(&self, hard_cap: bool) -> bool {
        self.amount() >= self.max_amount
            || hard_cap
            || self.pending_amount() >= self.max_pending_amount
    }

    pub fn has_reached_min_amount(&self) -> bool {
        self.amount() >= self.min_amount
    }

    /// How many more items the maximum quota allows
    pub fn room_left(&self) -> u32 {
        self.max_amount.saturating_sub(self.amount())
    }

    pub fn tracks(&self, item: ItemRef) -> bool {
        match item {
            ItemRef::Pending(ticket) => self.pending.contains(&ticket),
            ItemRef::Current(entity) => self.current.contains(&entity),
        }
    }

    /// Record a requested item; false if the ticket was already pending
    pub fn reserve(&mut self, ticket: Ticket) -> bool {
        if self.pending.contains(&ticket) {
            return false;
        }
        self.pending.push(ticket);
        true
    }

    /// Turn a reservation into a live entity, or adopt an entity created
    /// without one. Returns false when nothing changed.
    pub fn materialize(&mut self, ticket: Option<Ticket>, entity: EntityRef) -> bool {
        if let Some(ticket) = ticket {
            self.pending.retain(|t| *t != ticket);
        }
        if self.current.contains(&entity) {
            return false;
        }
        self.current.push(entity);
        true
    }

    /// Forget a pending or current item
    ///
    /// Asking for an item this regulator never tracked is a bookkeeping bug in
    /// the caller; counters are left untouched and the error says so.
    pub fn remove_item(&mut self, item: ItemRef) -> Result<()> {
        let removed = match item {
            ItemRef::Pending(ticket) => remove_first(&mut self.pending, &ticket),
            ItemRef::Current(entity) => remove_first(&mut self.current, &entity),
        };
        if removed {
            Ok(())
        } else {
            Err(AiError::RegulatorUnderflow {
                code: self.code.clone(),
                item,
            })
        }
    }

    /// Drop current entities the predicate reports as gone
    pub fn prune(&mut self, mut is_alive: impl FnMut(EntityRef) -> bool) -> usize {
        let before = self.current.len();
        self.current.retain(|e| is_alive(*e));
        before - self.current.len()
    }
}

fn remove_first<T: PartialEq>(items: &mut Vec<T>, item: &T) -> bool {
    match items.iter().position(|i| i == item) {
        Some(idx) => {
            items.remove(idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::range::{faction_rng, IntRange};
    use crate::core::types::{FactionId, UnitId};

    fn regulator(min: u32, max: u32, max_pending: u32) -> Regulator {
        let mut config = RegulatorConfig::new("soldier");
        config.min_amount = IntRange::fixed(min);
        config.max_amount = IntRange::fixed(max);
        config.max_pending_amount = max_pending;
        Regulator::new(&config, &mut faction_rng(1, FactionId(1)))
    }

    fn unit(id: u32) -> EntityRef {
        EntityRef::Unit(UnitId(id))
    }

    #[test]
    fn test_min_clamped_to_max() {
        let mut config = RegulatorConfig::new("soldier");
        config.min_amount = IntRange::fixed(8);
        config.max_amount = IntRange::fixed(3);
        let reg = Regulator::new(&config, &mut faction_rng(1, FactionId(1)));
        assert_eq!(reg.min_amount(), 3);
        assert_eq!(reg.max_amount(), 3);
    }

    #[test]
    fn test_bounds_sampled_inside_ranges() {
        let mut config = RegulatorConfig::new("soldier");
        config.min_amount = IntRange::new(2, 4);
        config.max_amount = IntRange::new(6, 9);
        let mut rng = faction_rng(3, FactionId(1));
        for _ in 0..50 {
            let reg = Regulator::new(&config, &mut rng);
            assert!((2..=4).contains(&reg.min_amount()));
            assert!((6..=9).contains(&reg.max_amount()));
            assert_eq!(reg.amount(), 0);
        }
    }

    #[test]
    fn test_scenario_five_items_reach_max_then_removal_reopens() {
        let mut reg = regulator(2, 5, 10);
        for id in 0..5 {
            reg.materialize(None, unit(id));
        }
        assert!(reg.has_reached_max_amount(false));
        assert!(reg.has_reached_min_amount());

        reg.remove_item(ItemRef::Current(unit(0))).unwrap();
        assert!(!reg.has_reached_max_amount(false));
    }

    #[test]
    fn test_pending_counts_toward_amount() {
        let mut reg = regulator(1, 5, 2);
        reg.reserve(Ticket(1));
        reg.reserve(Ticket(2));
        assert_eq!(reg.amount(), 2);
        assert_eq!(reg.pending_amount(), 2);
        assert!(reg.has_reached_max_amount(false), "pending cap reached");

        reg.materialize(Some(Ticket(1)), unit(10));
        assert_eq!(reg.amount(), 2);
        assert_eq!(reg.pending_amount(), 1);
        assert!(!reg.has_reached_max_amount(false));
    }

    #[test]
    fn test_hard_cap_overrides_quota() {
        let reg = regulator(1, 5, 2);
        assert!(reg.has_reached_max_amount(true));
    }

    #[test]
    fn test_reserve_is_idempotent() {
        let mut reg = regulator(1, 5, 5);
        assert!(reg.reserve(Ticket(4)));
        assert!(!reg.reserve(Ticket(4)));
        assert_eq!(reg.pending_amount(), 1);
    }

    #[test]
    fn test_materialize_twice_counts_once() {
        let mut reg = regulator(1, 5, 5);
        reg.reserve(Ticket(1));
        assert!(reg.materialize(Some(Ticket(1)), unit(1)));
        assert!(!reg.materialize(Some(Ticket(1)), unit(1)));
        assert_eq!(reg.amount(), 1);
    }

    #[test]
    fn test_remove_unknown_item_is_an_error_and_changes_nothing() {
        let mut reg = regulator(1, 5, 5);
        reg.materialize(None, unit(1));
        let err = reg.remove_item(ItemRef::Pending(Ticket(99)));
        assert!(matches!(err, Err(AiError::RegulatorUnderflow { .. })));
        assert_eq!(reg.amount(), 1);
    }

    #[test]
    fn test_remove_twice_never_double_decrements() {
        let mut reg = regulator(1, 5, 5);
        reg.materialize(None, unit(1));
        reg.materialize(None, unit(2));
        reg.remove_item(ItemRef::Current(unit(1))).unwrap();
        assert!(reg.remove_item(ItemRef::Current(unit(1))).is_err());
        assert_eq!(reg.amount(), 1);
    }

    #[test]
    fn test_prune_drops_dead_entities() {
        let mut reg = regulator(1, 5, 5);
        reg.materialize(None, unit(1));
        reg.materialize(None, unit(2));
        assert_eq!(reg.prune(|e| e == unit(2)), 1);
        assert_eq!(reg.current(), &[unit(2)]);
    }
}
