//! Boundary to the issue tracker / Gantt service that owns the tasks.

use crate::calendar::{Calendar, CalendarError, DateId};
use crate::task::{AttributeParseError, ConcurrencyStamp, Issue, RowId, TaskAttributes};
use chrono::Duration;
use std::collections::HashMap;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("row {row_id} was modified concurrently (stale stamp {stamp:?})")]
    Conflict {
        row_id: RowId,
        stamp: ConcurrencyStamp,
    },
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<CalendarError> for ServiceError {
    fn from(value: CalendarError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl From<AttributeParseError> for ServiceError {
    fn from(value: AttributeParseError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Gantt chart settings of a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GanttMeta {
    pub calendar: Calendar,
    pub start_date_id: DateId,
    pub zone_id: String,
}

/// Everything a leveling run reads from and writes to the outside world.
pub trait GanttService {
    fn gantt_meta(&self, structure_id: i64) -> ServiceResult<GanttMeta>;

    /// Issue id to row id for every issue row of the structure.
    fn row_mapping(&self, structure_id: i64) -> ServiceResult<HashMap<String, RowId>>;

    /// Issues selected by `query`, ordered by ascending planned finish.
    fn ordered_issues(&self, query: &str) -> ServiceResult<Vec<Issue>>;

    fn row_attributes(&self, structure_id: i64, row_id: RowId) -> ServiceResult<TaskAttributes>;

    /// Store a leveling delay. Fails with [`ServiceError::Conflict`] when
    /// `stamp` is no longer the current one.
    fn write_leveling_delay(
        &mut self,
        structure_id: i64,
        row_id: RowId,
        delay: Duration,
        stamp: ConcurrencyStamp,
    ) -> ServiceResult<()>;
}

/// Issue id to row id from a forest formula (`rowId:depth:itemIdentity,...`).
/// Items that are not issues (identity containing `/`) and incomplete items
/// are skipped.
pub fn parse_forest_formula(formula: &str) -> ServiceResult<HashMap<String, RowId>> {
    let mut mapping = HashMap::new();
    for item in formula.split(',') {
        let parts: Vec<&str> = item.trim().split(':').collect();
        if parts.len() < 3 {
            continue;
        }
        let identity = parts[2];
        if identity.contains('/') {
            continue;
        }
        let row_id: RowId = parts[0].parse().map_err(|_| {
            ServiceError::InvalidData(format!("row id '{}' in forest item '{item}'", parts[0]))
        })?;
        mapping.insert(identity.to_string(), row_id);
    }
    Ok(mapping)
}
