pub mod calendar;
pub mod config;
pub mod duration;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod leveling;
pub mod persistence;
pub mod runner;
pub mod service;
pub mod slots;
pub mod task;

pub use calendar::{
    Calendar, CalendarConfig, CalendarError, DateId, DaySchedule, TimeOfDayId, TimeRange,
    date_id_from, parse_date_id, parse_time_id,
};
pub use config::{ConfigError, LevelerConfig, SourceConfig, SourceKind, StructureConfig};
pub use duration::{DurationParseError, format_duration, parse_gantt_duration};
pub use leveling::{LevelingError, LevelingPlanner, LevelingTask, Placement, level_delays};
pub use persistence::{
    FileGanttStore, GanttSnapshot, save_results_to_csv, save_results_to_json,
};
#[cfg(feature = "sqlite")]
pub use persistence::SqliteGanttStore;
pub use runner::{RunError, RunOptions, RunSummary, level_structure};
pub use service::{GanttMeta, GanttService, ServiceError, ServiceResult};
pub use slots::{SlotError, Slots};
pub use task::{ConcurrencyStamp, Issue, LevelingResult, RawRowAttributes, RowId, TaskAttributes};
