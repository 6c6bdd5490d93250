//! Parallel tracks competing for leveled tasks.
//!
//! Each slot holds the cumulative working time already committed on its
//! track, counted from the project start. Placing a task on the least-loaded
//! track is classic list scheduling over identical machines.

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("no slots")]
    NoSlots,
    #[error("slot {index} out of range for {len} slots")]
    OutOfRange { index: usize, len: usize },
    #[error("load of slot {index} overflows")]
    Overflow { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slots {
    loads: Vec<Duration>,
}

impl Slots {
    /// `count` tracks, all starting at `initial`. Zero tracks is allowed but
    /// every lookup on such an allocator fails.
    pub fn new(count: usize, initial: Duration) -> Self {
        Self {
            loads: vec![initial; count],
        }
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn loads(&self) -> &[Duration] {
        &self.loads
    }

    pub fn load(&self, index: usize) -> Option<Duration> {
        self.loads.get(index).copied()
    }

    /// Index of the least-loaded slot. Ties go to the lowest index.
    pub fn find_slot(&self) -> Result<usize, SlotError> {
        let (first, rest) = self.loads.split_first().ok_or(SlotError::NoSlots)?;
        let mut best = (0, *first);
        for (index, load) in rest.iter().enumerate() {
            if *load < best.1 {
                best = (index + 1, *load);
            }
        }
        Ok(best.0)
    }

    /// Take the least-loaded slot: its current load is returned as the
    /// task's delay, then `duration` is committed onto it.
    pub fn read_and_add(&mut self, duration: Duration) -> Result<(Duration, usize), SlotError> {
        let index = self.find_slot()?;
        let previous = self.loads[index];
        self.loads[index] = previous
            .checked_add(&duration)
            .ok_or(SlotError::Overflow { index })?;
        Ok((previous, index))
    }

    /// Overwrite a slot's load; nothing is added to what it held.
    pub fn force_set(&mut self, index: usize, value: Duration) -> Result<(), SlotError> {
        let len = self.loads.len();
        let load = self
            .loads
            .get_mut(index)
            .ok_or(SlotError::OutOfRange { index, len })?;
        *load = value;
        Ok(())
    }
}
