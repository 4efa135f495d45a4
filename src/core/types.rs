//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a faction taking part in the match
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display(fmt = "faction#{}", _0)]
pub struct FactionId(pub u32);

/// Identifier of a live unit
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display(fmt = "unit#{}", _0)]
pub struct UnitId(pub u32);

/// Identifier of a placed building (under construction or complete)
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display(fmt = "building#{}", _0)]
pub struct BuildingId(pub u32);

/// Identifier of a harvestable resource node
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display(fmt = "resource#{}", _0)]
pub struct ResourceId(pub u32);

/// Reservation handle for an item that was requested but does not exist yet
///
/// Unit tickets are handed out by the host's task launcher, building tickets
/// by the placement resolver.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display(fmt = "ticket#{}", _0)]
pub struct Ticket(pub u64);

/// A materialized item a regulator can track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Unit(UnitId),
    Building(BuildingId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Unit(id) => write!(f, "{}", id),
            EntityRef::Building(id) => write!(f, "{}", id),
        }
    }
}

/// Anything a regulator can be asked to forget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Pending(Ticket),
    Current(EntityRef),
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemRef::Pending(ticket) => write!(f, "pending {}", ticket),
            ItemRef::Current(entity) => write!(f, "current {}", entity),
        }
    }
}

/// Resource amounts keyed by resource code (e.g. "food" -> 50)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cost(pub BTreeMap<String, u32>);

impl Cost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper for tests and hand-written profiles
    pub fn with(mut self, resource: &str, amount: u32) -> Self {
        self.0.insert(resource.to_string(), amount);
        self
    }

    pub fn is_free(&self) -> bool {
        self.0.values().all(|amount| *amount == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(FactionId(3).to_string(), "faction#3");
        assert_eq!(UnitId(7).to_string(), "unit#7");
        assert_eq!(EntityRef::Building(BuildingId(2)).to_string(), "building#2");
    }

    #[test]
    fn test_cost_is_free() {
        assert!(Cost::new().is_free());
        assert!(Cost::new().with("food", 0).is_free());
        assert!(!Cost::new().with("food", 10).is_free());
    }

    #[test]
    fn test_cost_toml_is_a_plain_table() {
        let cost: Cost = toml::from_str("food = 50\nwood = 20").unwrap();
        assert_eq!(cost.iter().collect::<Vec<_>>(), vec![("food", 50), ("wood", 20)]);
    }
}
