//! NPC profile configuration loaded from TOML
//!
//! A profile holds every knob of one computer-controlled faction: which unit
//! and building types it regulates, how fast its timers run, and how it
//! attacks and defends. Every section falls back to defaults so a profile file
//! only needs to list what it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{AiError, Result};
use crate::core::range::{FloatRange, IntRange};
use crate::core::types::Cost;

/// Quota template for one unit or building type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatorConfig {
    /// Item type code as known to the host ("villager", "barracks", ...)
    pub code: String,
    /// Range the minimum quota is sampled from once at activation
    #[serde(default = "default_min_amount")]
    pub min_amount: IntRange,
    /// Range the maximum quota is sampled from once at activation
    #[serde(default = "default_max_amount")]
    pub max_amount: IntRange,
    /// How many requested-but-not-yet-existing items are allowed at once
    #[serde(default = "default_max_pending")]
    pub max_pending_amount: u32,
    /// Whether the creator's spawn timer may create this item on its own
    #[serde(default = "default_true")]
    pub auto_create: bool,
    /// Whether other components may request this item explicitly
    #[serde(default = "default_true")]
    pub create_on_demand: bool,
    /// Seconds between two automatic creation attempts
    #[serde(default = "default_spawn_reload")]
    pub spawn_reload: FloatRange,
    /// Extra delay added to the very first spawn timer
    #[serde(default)]
    pub start_after: FloatRange,
    #[serde(default)]
    pub cost: Cost,
}

impl RegulatorConfig {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            max_pending_amount: default_max_pending(),
            auto_create: true,
            create_on_demand: true,
            spawn_reload: default_spawn_reload(),
            start_after: FloatRange::default(),
            cost: Cost::default(),
        }
    }
}

/// What a new building is placed around inside its territory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// The territory center itself
    #[default]
    Center,
    /// A resource node whose code is listed
    Resource,
    /// An own building whose code is listed
    Building,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementAnchorConfig {
    #[serde(default)]
    pub around: AnchorKind,
    /// Codes eligible as anchors when `around` is not `center`
    #[serde(default)]
    pub codes: Vec<String>,
    /// Initial distance from the anchor
    #[serde(default = "default_anchor_distance")]
    pub distance: FloatRange,
}

impl Default for PlacementAnchorConfig {
    fn default() -> Self {
        Self {
            around: AnchorKind::Center,
            codes: Vec::new(),
            distance: default_anchor_distance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingRegulatorConfig {
    #[serde(flatten)]
    pub regulator: RegulatorConfig,
    /// Only regulate this building in the capital's territory
    #[serde(default)]
    pub capital_only: bool,
    #[serde(default)]
    pub placement: PlacementAnchorConfig,
}

impl BuildingRegulatorConfig {
    pub fn new(code: &str) -> Self {
        Self {
            regulator: RegulatorConfig::new(code),
            capital_only: false,
            placement: PlacementAnchorConfig::default(),
        }
    }
}

/// Multi-level task queue timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of queue levels; level 0 is the highest priority
    pub levels: usize,
    /// Seconds per scheduler clock tick
    pub clock_length: f32,
    /// Clock ticks between two promotions
    pub promotion_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            clock_length: 1.0,
            promotion_threshold: 10,
        }
    }
}

/// Building placement search tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Seconds a provisional building settles before the first validity check
    pub placement_delay: FloatRange,
    /// Orbit speed around the anchor in degrees per second
    pub rotation_speed: f32,
    /// Seconds before the first outward nudge
    pub move_interval: f32,
    /// Added to the nudge interval after each nudge
    pub move_interval_increment: f32,
    /// Distance added to the anchor distance by one nudge
    pub move_distance: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            placement_delay: FloatRange::new(0.5, 1.5),
            rotation_speed: 45.0,
            move_interval: 2.0,
            move_interval_increment: 1.0,
            move_distance: 1.0,
        }
    }
}

/// How the attack director picks its victim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Lowest current attack power, first one wins ties
    #[default]
    Weakest,
    /// Uniform pick among the remaining factions
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub enabled: bool,
    pub target_policy: TargetPolicy,
    pub select_target_reload: FloatRange,
    pub launch_reload: FloatRange,
    pub progress_reload: FloatRange,
    /// Attack power the faction must exceed before launching
    pub launch_power: FloatRange,
    /// Deployed power at or below which the attack is called off
    pub surrender_power: FloatRange,
    /// Share of the army kept home when launching
    pub defense_ratio: FloatRange,
    /// Building codes worth attacking; empty means any building
    pub target_building_codes: Vec<String>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_policy: TargetPolicy::Weakest,
            select_target_reload: FloatRange::new(20.0, 30.0),
            launch_reload: FloatRange::new(5.0, 10.0),
            progress_reload: FloatRange::new(2.0, 4.0),
            launch_power: FloatRange::new(300.0, 400.0),
            surrender_power: FloatRange::new(50.0, 100.0),
            defense_ratio: FloatRange::new(0.2, 0.3),
            target_building_codes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseConfig {
    pub enabled: bool,
    /// Radius around the threat within which army units are sent to help
    pub support_radius: FloatRange,
    /// Seconds without a new hit before defense is released
    pub decay_time: FloatRange,
    pub cancel_attack_on_defense: bool,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            support_radius: FloatRange::new(15.0, 20.0),
            decay_time: FloatRange::new(8.0, 12.0),
            cancel_attack_on_defense: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Building code that raises the population cap; mandatory
    pub population_building: Option<String>,
    /// Free slots at or below which another population building is requested
    pub min_free_slots: u32,
    pub check_reload: FloatRange,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_building: None,
            min_free_slots: 2,
            check_reload: FloatRange::new(5.0, 8.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Unit code that constructs buildings; mandatory
    pub builder: Option<String>,
    pub target_builders: IntRange,
    /// Scheduler level for new construction tasks
    pub construction_level: usize,
    /// Scheduler level for builder creation requests
    pub builder_request_level: usize,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            builder: None,
            target_builders: IntRange::new(2, 3),
            construction_level: 1,
            builder_request_level: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Unit code that collects resources; mandatory
    pub collector: Option<String>,
    /// Resource codes worth collecting
    pub resource_codes: Vec<String>,
    pub target_collectors: IntRange,
    pub scan_reload: FloatRange,
    pub collection_level: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            collector: None,
            resource_codes: Vec::new(),
            target_collectors: IntRange::new(2, 4),
            scan_reload: FloatRange::new(8.0, 12.0),
            collection_level: 2,
        }
    }
}

/// Complete configuration of one computer-controlled faction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpcProfile {
    /// Name of this profile (set from filename when loaded by name)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit_regulators: Vec<RegulatorConfig>,
    #[serde(default)]
    pub building_regulators: Vec<BuildingRegulatorConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub attack: AttackConfig,
    #[serde(default)]
    pub defense: DefenseConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub construction: ConstructionConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
}

impl NpcProfile {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let profile: NpcProfile = toml::from_str(contents)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn unit_regulator(&self, code: &str) -> Option<&RegulatorConfig> {
        self.unit_regulators.iter().find(|r| r.code == code)
    }

    pub fn building_regulator(&self, code: &str) -> Option<&BuildingRegulatorConfig> {
        self.building_regulators
            .iter()
            .find(|r| r.regulator.code == code)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.levels == 0 {
            return Err(AiError::InvalidConfig(
                "scheduler.levels must be at least 1".into(),
            ));
        }
        if self.scheduler.clock_length <= 0.0 {
            return Err(AiError::InvalidConfig(format!(
                "scheduler.clock_length ({}) must be positive",
                self.scheduler.clock_length
            )));
        }
        if self.scheduler.promotion_threshold == 0 {
            return Err(AiError::InvalidConfig(
                "scheduler.promotion_threshold must be at least 1".into(),
            ));
        }

        let regulators = self
            .unit_regulators
            .iter()
            .chain(self.building_regulators.iter().map(|b| &b.regulator));
        for reg in regulators {
            if !reg.min_amount.is_ordered() || !reg.max_amount.is_ordered() {
                return Err(AiError::InvalidConfig(format!(
                    "regulator '{}' has an inverted amount range",
                    reg.code
                )));
            }
            if !reg.spawn_reload.is_ordered() || !reg.start_after.is_ordered() {
                return Err(AiError::InvalidConfig(format!(
                    "regulator '{}' has an inverted timer range",
                    reg.code
                )));
            }
        }

        let ranges = [
            ("attack.launch_power", self.attack.launch_power),
            ("attack.surrender_power", self.attack.surrender_power),
            ("attack.defense_ratio", self.attack.defense_ratio),
            ("defense.support_radius", self.defense.support_radius),
            ("placement.placement_delay", self.placement.placement_delay),
        ];
        for (name, range) in ranges {
            if !range.is_ordered() {
                return Err(AiError::InvalidConfig(format!(
                    "{} is inverted ({} > {})",
                    name, range.min, range.max
                )));
            }
        }

        let timers = [
            ("attack.select_target_reload", self.attack.select_target_reload),
            ("attack.launch_reload", self.attack.launch_reload),
            ("attack.progress_reload", self.attack.progress_reload),
            ("defense.decay_time", self.defense.decay_time),
            ("population.check_reload", self.population.check_reload),
            ("collection.scan_reload", self.collection.scan_reload),
        ];
        for (name, range) in timers {
            if !range.is_ordered() {
                return Err(AiError::InvalidConfig(format!(
                    "{} is inverted ({} > {})",
                    name, range.min, range.max
                )));
            }
            if range.min < 0.0 {
                return Err(AiError::InvalidConfig(format!(
                    "{} must not be negative ({})",
                    name, range.min
                )));
            }
        }
        if self.attack.defense_ratio.min < 0.0 || self.attack.defense_ratio.max > 1.0 {
            return Err(AiError::InvalidConfig(
                "attack.defense_ratio must stay within [0, 1]".into(),
            ));
        }

        Ok(())
    }
}

/// Load profile from TOML file
///
/// Loads from `data/npc_profiles/{name}.toml`
pub fn load_profile(name: &str) -> Result<NpcProfile> {
    let path = profile_path(name);
    let mut profile = NpcProfile::from_file(&path)?;
    profile.name = name.to_string();
    Ok(profile)
}

/// Get path to profile file
fn profile_path(name: &str) -> PathBuf {
    PathBuf::from("data/npc_profiles").join(format!("{}.toml", name))
}

fn default_true() -> bool {
    true
}

fn default_min_amount() -> IntRange {
    IntRange::fixed(1)
}

fn default_max_amount() -> IntRange {
    IntRange::fixed(5)
}

fn default_max_pending() -> u32 {
    1
}

fn default_spawn_reload() -> FloatRange {
    FloatRange::new(10.0, 15.0)
}

fn default_anchor_distance() -> FloatRange {
    FloatRange::new(4.0, 8.0)
}
