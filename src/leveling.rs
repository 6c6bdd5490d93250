//! Resource leveling over a bounded number of parallel tracks.
//!
//! Tasks arrive ordered by ascending planned finish; that order is trusted,
//! not checked. Each free task is placed on the least-loaded track and
//! delayed by that track's load. Manually pinned tasks keep their dates and
//! instead move the least-loaded track's cursor to their end point, so the
//! following free tasks queue up behind them.

use crate::calendar::{Calendar, DateId, date_id_from};
use crate::duration::format_duration;
use crate::slots::{SlotError, Slots};
use crate::task::{LevelingResult, RowId, TaskAttributes};
use chrono::{Duration, Local};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelingError {
    #[error("leveling cannot proceed: {0}")]
    Slots(#[from] SlotError),
}

/// One row to level, with the attributes read for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelingTask {
    pub row_id: RowId,
    pub issue_key: String,
    pub attributes: TaskAttributes,
}

impl LevelingTask {
    pub fn new(row_id: RowId, issue_key: impl Into<String>, attributes: TaskAttributes) -> Self {
        Self {
            row_id,
            issue_key: issue_key.into(),
            attributes,
        }
    }
}

/// Where a task landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Delay to write back; always zero for pinned tasks.
    pub delay: Duration,
    pub slot: usize,
    /// Load of `slot` after placing the task.
    pub slot_load: Duration,
    pub pinned: bool,
}

/// Today's `DateId` in local time.
pub fn today_date_id() -> DateId {
    date_id_from(Local::now().date_naive())
}

/// An explicit positive override wins over the clock.
pub fn resolve_today(today_override: Option<DateId>) -> DateId {
    match today_override {
        Some(date_id) if date_id > 0 => date_id,
        _ => today_date_id(),
    }
}

/// Load every track starts with. A project that has not started yet is
/// leveled from its start; one already running is leveled from today.
pub fn initial_offset(calendar: &Calendar, project_start: DateId, today: DateId) -> Duration {
    if project_start >= today {
        Duration::zero()
    } else {
        calendar.working_duration_between(project_start, today)
    }
}

/// State of a single leveling pass. Not shared between passes.
#[derive(Debug)]
pub struct LevelingPlanner<'a> {
    calendar: &'a Calendar,
    project_start: DateId,
    initial_offset: Duration,
    slots: Slots,
}

impl<'a> LevelingPlanner<'a> {
    pub fn new(
        calendar: &'a Calendar,
        project_start: DateId,
        today: DateId,
        track_count: usize,
    ) -> Result<Self, LevelingError> {
        if track_count == 0 {
            return Err(SlotError::NoSlots.into());
        }
        let initial_offset = initial_offset(calendar, project_start, today);
        Ok(Self {
            calendar,
            project_start,
            initial_offset,
            slots: Slots::new(track_count, initial_offset),
        })
    }

    pub fn initial_offset(&self) -> Duration {
        self.initial_offset
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Offset from the project start at which a pinned task ends.
    /// A task without a scheduled start counts from the project start.
    pub fn pinned_end_offset(&self, attributes: &TaskAttributes) -> Option<Duration> {
        let started = attributes
            .start
            .map(|start| {
                self.calendar
                    .working_duration_between(self.project_start, date_id_from(start.date()))
            })
            .unwrap_or_else(Duration::zero);
        started.checked_add(&attributes.duration)
    }

    /// Place the next task in order.
    pub fn place(&mut self, attributes: &TaskAttributes) -> Result<Placement, LevelingError> {
        if attributes.is_pinned() {
            let slot = self.slots.find_slot()?;
            let offset = self
                .pinned_end_offset(attributes)
                .ok_or(SlotError::Overflow { index: slot })?;
            self.slots.force_set(slot, offset)?;
            debug!(
                slot,
                offset = %format_duration(offset),
                "pinned task reserves track"
            );
            return Ok(Placement {
                delay: Duration::zero(),
                slot,
                slot_load: offset,
                pinned: true,
            });
        }

        let (delay, slot) = self.slots.read_and_add(attributes.duration)?;
        Ok(Placement {
            delay,
            slot,
            slot_load: self.slots.loads()[slot],
            pinned: false,
        })
    }

    pub fn level(&mut self, task: &LevelingTask) -> Result<LevelingResult, LevelingError> {
        let placement = self.place(&task.attributes)?;
        Ok(LevelingResult {
            row_id: task.row_id,
            issue_key: task.issue_key.clone(),
            delay: placement.delay,
            pinned: placement.pinned,
            stamp: task.attributes.stamp,
        })
    }
}

/// Level an ordered task list in one pass and return a delay per task.
pub fn level_delays(
    calendar: &Calendar,
    project_start: DateId,
    today_override: Option<DateId>,
    track_count: usize,
    tasks: &[LevelingTask],
) -> Result<Vec<LevelingResult>, LevelingError> {
    let today = resolve_today(today_override);
    let mut planner = LevelingPlanner::new(calendar, project_start, today, track_count)?;
    tasks.iter().map(|task| planner.level(task)).collect()
}
