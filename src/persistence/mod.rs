//! Local stand-ins for the Gantt service and export of leveling results.
//!
//! A [`GanttSnapshot`] is a JSON document holding what a leveling run needs
//! from the service: calendars, structures with their forest formula and
//! row attributes, and the issue lists returned by task queries.

use crate::calendar::{Calendar, CalendarConfig, DateId};
use crate::service::{GanttMeta, ServiceError, ServiceResult};
use crate::task::{ConcurrencyStamp, Issue, RawRowAttributes, RowId, TaskAttributes};
use serde::{Deserialize, Serialize};

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{FileGanttStore, load_results_from_json, save_results_to_csv, save_results_to_json};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGanttStore;

pub const DEFAULT_ZONE_ID: &str = "Etc/UTC";

fn default_zone_id() -> String {
    DEFAULT_ZONE_ID.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanttSnapshot {
    #[serde(default)]
    pub calendars: Vec<CalendarConfig>,
    #[serde(default)]
    pub structures: Vec<StructureSnapshot>,
    #[serde(default)]
    pub queries: Vec<QuerySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub id: i64,
    pub calendar_id: i64,
    pub start_date_id: DateId,
    #[serde(default = "default_zone_id")]
    pub zone_id: String,
    /// Forest formula, `rowId:depth:itemIdentity` items separated by commas.
    #[serde(default)]
    pub forest: String,
    #[serde(default)]
    pub stamp: ConcurrencyStamp,
    #[serde(default)]
    pub rows: Vec<RowSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub row_id: RowId,
    #[serde(default)]
    pub attributes: RawRowAttributes,
    #[serde(default)]
    pub leveling_delay_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub query: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl GanttSnapshot {
    pub fn structure(&self, structure_id: i64) -> ServiceResult<&StructureSnapshot> {
        self.structures
            .iter()
            .find(|structure| structure.id == structure_id)
            .ok_or_else(|| ServiceError::NotFound(format!("structure {structure_id}")))
    }

    pub fn structure_mut(&mut self, structure_id: i64) -> ServiceResult<&mut StructureSnapshot> {
        self.structures
            .iter_mut()
            .find(|structure| structure.id == structure_id)
            .ok_or_else(|| ServiceError::NotFound(format!("structure {structure_id}")))
    }

    pub fn calendar(&self, calendar_id: i64) -> ServiceResult<Calendar> {
        let config = self
            .calendars
            .iter()
            .find(|calendar| calendar.id == calendar_id)
            .ok_or_else(|| ServiceError::NotFound(format!("calendar with ID {calendar_id}")))?;
        Ok(Calendar::from_config(config)?)
    }

    pub fn gantt_meta(&self, structure_id: i64) -> ServiceResult<GanttMeta> {
        let structure = self.structure(structure_id)?;
        Ok(GanttMeta {
            calendar: self.calendar(structure.calendar_id)?,
            start_date_id: structure.start_date_id,
            zone_id: structure.zone_id.clone(),
        })
    }

    pub fn issues(&self, query: &str) -> ServiceResult<Vec<Issue>> {
        self.queries
            .iter()
            .find(|snapshot| snapshot.query == query)
            .map(|snapshot| snapshot.issues.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("query '{query}'")))
    }
}

impl StructureSnapshot {
    pub fn row(&self, row_id: RowId) -> ServiceResult<&RowSnapshot> {
        self.rows
            .iter()
            .find(|row| row.row_id == row_id)
            .ok_or_else(|| ServiceError::NotFound(format!("row {row_id} in structure {}", self.id)))
    }

    pub fn row_attributes(&self, row_id: RowId) -> ServiceResult<TaskAttributes> {
        Ok(self.row(row_id)?.attributes.parse(self.stamp)?)
    }
}
