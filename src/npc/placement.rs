//! Building placement search
//!
//! One FIFO queue per faction and only the head request is worked on. The head
//! settles for a short delay at `anchor + distance`, then is validated every
//! tick. While invalid it orbits the anchor at a constant angular rate and is
//! periodically nudged one step outward, with the nudge interval growing each
//! time, until it either fits or leaves its territory.

use glam::Vec2;
use rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::TAU;

use crate::core::config::PlacementConfig;
use crate::core::types::{BuildingId, Cost, FactionId, Ticket};
use crate::world::{BuildingPlacement, FactionWorld};

/// What the building creator asks to have placed
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub code: String,
    /// Already taken from the economy; refunded on abandonment
    pub cost: Cost,
    pub center: BuildingId,
    pub anchor: Vec2,
    pub anchor_distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementPhase {
    /// Waiting behind the head of the queue
    Queued,
    /// Provisional instance held inactive before the first check
    Settling { remaining: f32 },
    /// Validated every tick, orbiting and drifting outward while invalid
    Searching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    CenterLost,
    OutOfTerritory,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Placed {
        ticket: Ticket,
        code: String,
        center: BuildingId,
        building: BuildingId,
    },
    Abandoned {
        ticket: Ticket,
        code: String,
        center: BuildingId,
        reason: AbandonReason,
    },
}

impl PlacementOutcome {
    pub fn ticket(&self) -> Ticket {
        match self {
            PlacementOutcome::Placed { ticket, .. } | PlacementOutcome::Abandoned { ticket, .. } => {
                *ticket
            }
        }
    }
}

/// A building waiting for, or going through, the placement search
#[derive(Debug, Clone)]
pub struct PendingBuilding {
    ticket: Ticket,
    code: String,
    cost: Cost,
    center: BuildingId,
    anchor: Vec2,
    anchor_distance: f32,
    orbit_angle: f32,
    facing: f32,
    phase: PlacementPhase,
    move_timer: f32,
    move_interval: f32,
}

impl PendingBuilding {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn center(&self) -> BuildingId {
        self.center
    }

    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    pub fn anchor_distance(&self) -> f32 {
        self.anchor_distance
    }

    pub fn phase(&self) -> PlacementPhase {
        self.phase
    }

    pub fn facing(&self) -> f32 {
        self.facing
    }

    /// Current position of the provisional instance
    pub fn position(&self) -> Vec2 {
        self.anchor + Vec2::new(self.orbit_angle.cos(), self.orbit_angle.sin()) * self.anchor_distance
    }
}

pub struct PlacementResolver {
    faction: FactionId,
    config: PlacementConfig,
    queue: VecDeque<PendingBuilding>,
    next_ticket: u64,
}

impl PlacementResolver {
    pub fn new(faction: FactionId, config: PlacementConfig) -> Self {
        Self {
            faction,
            config,
            queue: VecDeque::new(),
            next_ticket: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn head(&self) -> Option<&PendingBuilding> {
        self.queue.front()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingBuilding> {
        self.queue.iter()
    }

    /// Queue a request; it starts at once if nothing else is being placed
    pub fn submit<R: Rng + ?Sized>(&mut self, request: PlacementRequest, rng: &mut R) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.queue.push_back(PendingBuilding {
            ticket,
            code: request.code,
            cost: request.cost,
            center: request.center,
            anchor: request.anchor,
            anchor_distance: request.anchor_distance,
            orbit_angle: rng.gen_range(0.0..TAU),
            facing: 0.0,
            phase: PlacementPhase::Queued,
            move_timer: self.config.move_interval,
            move_interval: self.config.move_interval,
        });
        if self.queue.len() == 1 {
            self.start_head(rng);
        }
        tracing::debug!(faction = %self.faction, ticket = %ticket, "placement queued");
        ticket
    }

    pub fn tick<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        dt: f32,
        rng: &mut R,
    ) -> Vec<PlacementOutcome> {
        let mut outcomes = Vec::new();
        let Some(head) = self.queue.front_mut() else {
            return outcomes;
        };

        let territory = world
            .building(head.center)
            .filter(|b| b.faction == self.faction);
        let Some(territory) = territory else {
            outcomes.extend(self.abandon_head(world, AbandonReason::CenterLost, rng));
            return outcomes;
        };

        match head.phase {
            PlacementPhase::Queued => {
                self.start_head(rng);
                return outcomes;
            }
            PlacementPhase::Settling { remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    head.phase = PlacementPhase::Settling { remaining };
                    return outcomes;
                }
                head.phase = PlacementPhase::Searching;
            }
            PlacementPhase::Searching => {}
        }

        let position = head.position();
        if position.distance(head.anchor) > territory.border_radius {
            outcomes.extend(self.abandon_head(world, AbandonReason::OutOfTerritory, rng));
            return outcomes;
        }

        if world.is_placement_valid(self.faction, &head.code, position, head.center) {
            let placement = BuildingPlacement {
                code: head.code.clone(),
                position,
                facing: head.facing,
                center: head.center,
                ticket: head.ticket,
            };
            if let Some(building) = world.place_building(self.faction, &placement) {
                tracing::info!(
                    faction = %self.faction,
                    ticket = %placement.ticket,
                    code = %placement.code,
                    building = %building,
                    "building placed"
                );
                outcomes.push(PlacementOutcome::Placed {
                    ticket: placement.ticket,
                    code: placement.code,
                    center: placement.center,
                    building,
                });
                self.queue.pop_front();
                self.start_head(rng);
                return outcomes;
            }
        }

        head.orbit_angle = (head.orbit_angle + self.config.rotation_speed.to_radians() * dt) % TAU;
        head.move_timer -= dt;
        if head.move_timer <= 0.0 {
            head.anchor_distance += self.config.move_distance;
            head.move_interval += self.config.move_interval_increment;
            head.move_timer = head.move_interval;
        }
        outcomes
    }

    /// Stop a placement from outside (e.g. the host cancelled it)
    pub fn cancel<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        ticket: Ticket,
        world: &mut W,
        rng: &mut R,
    ) -> Option<PlacementOutcome> {
        let idx = self.queue.iter().position(|p| p.ticket == ticket)?;
        if idx == 0 {
            return self.abandon_head(world, AbandonReason::Cancelled, rng);
        }
        let pending = self.queue.remove(idx)?;
        Some(self.refund(world, pending, AbandonReason::Cancelled))
    }

    /// Abandon every request anchored to a destroyed center
    pub fn on_center_destroyed<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        center: BuildingId,
        world: &mut W,
        rng: &mut R,
    ) -> Vec<PlacementOutcome> {
        let head_lost = self.queue.front().is_some_and(|p| p.center == center);
        let (lost, kept): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|p| p.center == center);
        self.queue = kept;

        let outcomes = lost
            .into_iter()
            .map(|p| self.refund(world, p, AbandonReason::CenterLost))
            .collect();
        if head_lost {
            self.start_head(rng);
        }
        outcomes
    }

    /// Drop all requests without refunding (faction teardown)
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    fn start_head<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let delay = self.config.placement_delay.sample(rng);
        if let Some(head) = self.queue.front_mut() {
            if head.phase == PlacementPhase::Queued {
                head.phase = PlacementPhase::Settling { remaining: delay };
            }
        }
    }

    fn abandon_head<W: FactionWorld, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        reason: AbandonReason,
        rng: &mut R,
    ) -> Option<PlacementOutcome> {
        let pending = self.queue.pop_front()?;
        self.start_head(rng);
        Some(self.refund(world, pending, reason))
    }

    fn refund<W: FactionWorld>(
        &self,
        world: &mut W,
        pending: PendingBuilding,
        reason: AbandonReason,
    ) -> PlacementOutcome {
        world.give_back_resources(self.faction, &pending.cost);
        tracing::warn!(
            faction = %self.faction,
            ticket = %pending.ticket,
            code = %pending.code,
            ?reason,
            "placement abandoned"
        );
        PlacementOutcome::Abandoned {
            ticket: pending.ticket,
            code: pending.code,
            center: pending.center,
            reason,
        }
    }
}
