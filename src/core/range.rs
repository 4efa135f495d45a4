//! Randomized min/max ranges and the per-faction RNG
//!
//! Almost every AI knob is a range sampled at decision time. Sampling is split
//! into a pure function of a unit parameter (`at`) and an RNG-driven wrapper so
//! tests can pin exact values or replay a fixed seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::FactionId;

/// RNG used by every AI component
pub type AiRng = ChaCha8Rng;

/// Build the RNG for one faction from the match seed
///
/// Each faction gets an independent stream, so the order in which factions
/// are stepped within a tick never changes their decisions.
pub fn faction_rng(seed: u64, faction: FactionId) -> AiRng {
    let stream = (faction.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ChaCha8Rng::seed_from_u64(seed ^ stream)
}

/// Half-open float range `[min, max)`; a degenerate range always yields `min`
///
/// Serialized as a two-element array: `spawn_reload = [10.0, 15.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f32) -> Self {
        Self { min: value, max: value }
    }

    /// Pure sample: `t` in `[0, 1)` maps linearly onto the range
    pub fn at(&self, t: f32) -> f32 {
        self.min + (self.max - self.min) * t.clamp(0.0, 1.0)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            return self.min;
        }
        self.at(rng.gen::<f32>())
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

impl From<[f32; 2]> for FloatRange {
    fn from(v: [f32; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<FloatRange> for [f32; 2] {
    fn from(r: FloatRange) -> Self {
        [r.min, r.max]
    }
}

/// Inclusive integer range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct IntRange {
    pub min: u32,
    pub max: u32,
}

impl IntRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: u32) -> Self {
        Self { min: value, max: value }
    }

    /// Pure sample: `t` in `[0, 1)` picks one of the `max - min + 1` values
    pub fn at(&self, t: f32) -> u32 {
        if self.max <= self.min {
            return self.min;
        }
        let span = (self.max - self.min + 1) as f32;
        let offset = (t.clamp(0.0, 1.0) * span).floor() as u32;
        (self.min + offset).min(self.max)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

impl From<[u32; 2]> for IntRange {
    fn from(v: [u32; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<IntRange> for [u32; 2] {
    fn from(r: IntRange) -> Self {
        [r.min, r.max]
    }
}

/// Repeating countdown re-armed from a randomized reload range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReloadTimer {
    reload: FloatRange,
    remaining: f32,
}

impl ReloadTimer {
    pub fn new<R: Rng + ?Sized>(reload: FloatRange, rng: &mut R) -> Self {
        Self {
            reload,
            remaining: reload.sample(rng),
        }
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Count down by `dt`; true once per expiry, after which it is re-armed
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R) -> bool {
        self.remaining -= dt;
        if self.remaining > 0.0 {
            return false;
        }
        self.remaining = self.reload.sample(rng);
        true
    }
}
