pub mod config;
pub mod error;
pub mod range;
pub mod types;

pub use config::{load_profile, NpcProfile};
pub use error::{AiError, Result};
pub use range::{faction_rng, AiRng, FloatRange, IntRange, ReloadTimer};
pub use types::{BuildingId, Cost, EntityRef, FactionId, ItemRef, ResourceId, Ticket, UnitId};
