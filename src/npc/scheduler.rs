//! Multi-level aging task queue
//!
//! Level 0 is the highest priority. Every `promotion_threshold` clock ticks
//! each level is moved up by one, so a task inserted at level `L` reaches
//! level 0 after exactly `L * promotion_threshold` ticks. Level-0 tasks are
//! re-executed every clock tick until their executor reports them done or
//! no longer relevant.

use derive_more::Display;

use crate::core::config::SchedulerConfig;
use crate::core::types::{BuildingId, ResourceId};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "task#{}", _0)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Keep enough builders on a building under construction
    ConstructBuilding(BuildingId),
    /// Keep enough collectors on a resource node
    CollectResource(ResourceId),
    /// Bring a unit type up to `target_amount` through the unit creator
    CreateUnit { code: String, target_amount: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub level: usize,
}

/// Executor verdict for one level-0 task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Condition still holds; run again next clock tick
    Pending,
    /// Work finished
    Done,
    /// Condition no longer holds; dropped without side effects
    Dropped,
}

/// Shortest clock tick; a zero or negative length would never finish `advance`
const MIN_CLOCK_LENGTH: f32 = 0.01;

pub struct TaskScheduler {
    levels: Vec<Vec<Task>>,
    clock_length: f32,
    promotion_threshold: u32,
    clock: f32,
    promotion_counter: u32,
    next_id: u64,
}

impl TaskScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            levels: vec![Vec::new(); config.levels.max(1)],
            clock_length: config.clock_length.max(MIN_CLOCK_LENGTH),
            promotion_threshold: config.promotion_threshold.max(1),
            clock: 0.0,
            promotion_counter: 0,
            next_id: 1,
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Queue a task; identical work already queued is merged instead
    ///
    /// A duplicate at the same or a higher-priority level absorbs the request.
    /// A duplicate at a lower-priority level is moved up to `level`.
    pub fn add_task(&mut self, kind: TaskKind, level: usize) -> TaskId {
        let level = level.min(self.levels.len() - 1);

        if let Some((found, idx)) = self.find_kind(&kind) {
            if found <= level {
                return self.levels[found][idx].id;
            }
            let mut task = self.levels[found].remove(idx);
            task.level = level;
            let id = task.id;
            self.levels[level].push(task);
            tracing::debug!(task = %id, from = found, to = level, "task merged upward");
            return id;
        }

        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.levels[level].push(Task { id, kind, level });
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        for level in &mut self.levels {
            if let Some(idx) = level.iter().position(|t| t.id == id) {
                level.remove(idx);
                return true;
            }
        }
        false
    }

    /// Drop every queued task matching the predicate
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TaskKind) -> bool) -> usize {
        let mut removed = 0;
        for level in &mut self.levels {
            let before = level.len();
            level.retain(|t| !pred(&t.kind));
            removed += before - level.len();
        }
        removed
    }

    pub fn level_of(&self, id: TaskId) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|t| t.id == id))
    }

    pub fn contains(&self, kind: &TaskKind) -> bool {
        self.find_kind(kind).is_some()
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn level(&self, level: usize) -> &[Task] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Accumulate time; returns how many clock ticks elapsed
    ///
    /// Promotion happens inside; callers run level 0 once per returned tick.
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.clock += dt;
        let mut ticks = 0;
        while self.clock >= self.clock_length {
            self.clock -= self.clock_length;
            ticks += 1;
            self.clock_tick();
        }
        ticks
    }

    fn clock_tick(&mut self) {
        self.promotion_counter += 1;
        if self.promotion_counter < self.promotion_threshold {
            return;
        }
        self.promotion_counter = 0;
        for i in 1..self.levels.len() {
            let moved = std::mem::take(&mut self.levels[i]);
            for mut task in moved {
                task.level = i - 1;
                self.levels[i - 1].push(task);
            }
        }
    }

    /// Hand each level-0 task to `execute`; finished or irrelevant ones leave
    pub fn run_level_zero(&mut self, mut execute: impl FnMut(&Task) -> TaskStatus) -> usize {
        let before = self.levels[0].len();
        self.levels[0].retain(|task| execute(task) == TaskStatus::Pending);
        before - self.levels[0].len()
    }

    pub fn clear(&mut self) {
        for level in &mut self.levels {
            level.clear();
        }
    }

    fn find_kind(&self, kind: &TaskKind) -> Option<(usize, usize)> {
        self.levels.iter().enumerate().find_map(|(level, tasks)| {
            tasks
                .iter()
                .position(|t| &t.kind == kind)
                .map(|idx| (level, idx))
        })
    }
}
