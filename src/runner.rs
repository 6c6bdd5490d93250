//! One leveling pass over a structure, from fetching its tasks to writing
//! their delays back.

use crate::calendar::DateId;
use crate::config::StructureConfig;
use crate::duration::format_duration;
use crate::leveling::{LevelingError, LevelingPlanner, LevelingTask, resolve_today};
use crate::service::{GanttService, ServiceError};
use crate::task::LevelingResult;
use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: String,
        #[source]
        source: ServiceError,
    },
    #[error(transparent)]
    Leveling(#[from] LevelingError),
    #[error("failed to write leveling delay for {issue_key}: {source}")]
    WriteBack {
        issue_key: String,
        #[source]
        source: ServiceError,
    },
}

impl RunError {
    fn fetch(what: impl Into<String>) -> impl FnOnce(ServiceError) -> Self {
        let what = what.into();
        move |source| RunError::Fetch { what, source }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Date to level from instead of the structure's configured date or today.
    pub today_override: Option<DateId>,
    /// Compute delays without writing them back.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub structure_id: i64,
    pub today: DateId,
    pub initial_offset: Duration,
    pub results: Vec<LevelingResult>,
    /// Keys of issues that have no row in the structure.
    pub skipped: Vec<String>,
    pub written: usize,
}

impl RunSummary {
    pub fn to_cli_summary(&self) -> String {
        let pinned = self.results.iter().filter(|result| result.pinned).count();
        format!(
            "structure={}, today={}, offset={}, leveled={}, pinned={}, skipped={}, written={}",
            self.structure_id,
            self.today,
            format_duration(self.initial_offset),
            self.results.len(),
            pinned,
            self.skipped.len(),
            self.written
        )
    }
}

/// Level one structure.
///
/// Attributes are read right before each write so the write carries a fresh
/// concurrency stamp. The first failed write aborts the run; delays written
/// before it stay in place.
pub fn level_structure<S: GanttService + ?Sized>(
    service: &mut S,
    structure: &StructureConfig,
    options: RunOptions,
) -> Result<RunSummary, RunError> {
    let structure_id = structure.id;

    info!(structure_id, "fetching gantt meta");
    let meta = service
        .gantt_meta(structure_id)
        .map_err(RunError::fetch("gantt meta"))?;

    info!(structure_id, "fetching issue to row mapping");
    let mapping = service
        .row_mapping(structure_id)
        .map_err(RunError::fetch("row mapping"))?;

    info!(query = %structure.query, "fetching ordered issues");
    let issues = service
        .ordered_issues(&structure.query)
        .map_err(RunError::fetch("issues"))?;

    let today = resolve_today(options.today_override.or(structure.start_date_id()));
    let mut planner = LevelingPlanner::new(
        &meta.calendar,
        meta.start_date_id,
        today,
        structure.parallel_projects,
    )?;
    info!(
        structure_id,
        today,
        tracks = structure.parallel_projects,
        offset = %format_duration(planner.initial_offset()),
        "seeded tracks"
    );

    let mut summary = RunSummary {
        structure_id,
        today,
        initial_offset: planner.initial_offset(),
        results: Vec::with_capacity(issues.len()),
        skipped: Vec::new(),
        written: 0,
    };

    for issue in issues {
        let Some(&row_id) = mapping.get(&issue.id) else {
            warn!(
                issue = %issue.key,
                issue_id = %issue.id,
                structure_id,
                "issue is not in the structure, skipping"
            );
            summary.skipped.push(issue.key);
            continue;
        };

        let attributes = service
            .row_attributes(structure_id, row_id)
            .map_err(RunError::fetch(format!("attributes of {}", issue.key)))?;
        let result = planner.level(&LevelingTask::new(row_id, issue.key, attributes))?;

        if !options.dry_run {
            info!(
                issue = %result.issue_key,
                row_id,
                delay = %format_duration(result.delay),
                "writing leveling delay"
            );
            service
                .write_leveling_delay(structure_id, row_id, result.delay, result.stamp)
                .map_err(|source| RunError::WriteBack {
                    issue_key: result.issue_key.clone(),
                    source,
                })?;
            summary.written += 1;
        }
        summary.results.push(result);
    }

    Ok(summary)
}
