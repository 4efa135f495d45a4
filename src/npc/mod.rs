//! Computer-player decision core
//!
//! One [`FactionGovernor`] per AI faction owns every component; the
//! [`AiHost`] routes host events to them and ticks them in a fixed order.

pub mod attack;
pub mod collection;
pub mod construction;
pub mod creator;
pub mod defense;
pub mod governor;
pub mod host;
pub mod placement;
pub mod population;
pub mod regulator;
pub mod scheduler;

pub use attack::{AttackDirector, AttackEnd, AttackPhase};
pub use collection::ResourceCollector;
pub use construction::{BuildingConstructor, ConstructionReport};
pub use creator::{BuildingCreator, CreateOutcome, RequestSource, UnitCreator};
pub use defense::DefenseController;
pub use governor::{Component, FactionGovernor};
pub use host::{AiHost, Listener};
pub use placement::{PlacementOutcome, PlacementResolver};
pub use population::PopulationManager;
pub use regulator::Regulator;
pub use scheduler::{Task, TaskId, TaskKind, TaskScheduler, TaskStatus};
