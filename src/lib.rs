//! Faction AI - computer-player decision core for real-time strategy factions

pub mod core;
pub mod events;
pub mod npc;
pub mod world;
