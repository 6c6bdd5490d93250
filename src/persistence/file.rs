use super::GanttSnapshot;
use crate::duration::format_duration;
use crate::service::{GanttMeta, GanttService, ServiceError, ServiceResult, parse_forest_formula};
use crate::task::{ConcurrencyStamp, Issue, LevelingResult, RowId, TaskAttributes};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Gantt service backed by a JSON snapshot file.
///
/// Writes are applied in memory; call [`FileGanttStore::save`] to persist them.
#[derive(Debug, Clone)]
pub struct FileGanttStore {
    path: Option<PathBuf>,
    snapshot: GanttSnapshot,
}

impl FileGanttStore {
    pub fn open<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let file = File::open(path.as_ref())?;
        let snapshot: GanttSnapshot = serde_json::from_reader(file)?;
        Ok(Self {
            path: Some(path.as_ref().to_path_buf()),
            snapshot,
        })
    }

    pub fn from_snapshot(snapshot: GanttSnapshot) -> Self {
        Self {
            path: None,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> &GanttSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> GanttSnapshot {
        self.snapshot
    }

    /// Write the snapshot back to the file it was opened from.
    pub fn save(&self) -> ServiceResult<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| ServiceError::NotFound("snapshot path".into()))?;
        self.save_to(path)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ServiceResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.snapshot)?;
        Ok(())
    }
}

impl GanttService for FileGanttStore {
    fn gantt_meta(&self, structure_id: i64) -> ServiceResult<GanttMeta> {
        self.snapshot.gantt_meta(structure_id)
    }

    fn row_mapping(&self, structure_id: i64) -> ServiceResult<HashMap<String, RowId>> {
        parse_forest_formula(&self.snapshot.structure(structure_id)?.forest)
    }

    fn ordered_issues(&self, query: &str) -> ServiceResult<Vec<Issue>> {
        self.snapshot.issues(query)
    }

    fn row_attributes(&self, structure_id: i64, row_id: RowId) -> ServiceResult<TaskAttributes> {
        self.snapshot.structure(structure_id)?.row_attributes(row_id)
    }

    fn write_leveling_delay(
        &mut self,
        structure_id: i64,
        row_id: RowId,
        delay: Duration,
        stamp: ConcurrencyStamp,
    ) -> ServiceResult<()> {
        let structure = self.snapshot.structure_mut(structure_id)?;
        if structure.stamp != stamp {
            return Err(ServiceError::Conflict { row_id, stamp });
        }
        let row = structure
            .rows
            .iter_mut()
            .find(|row| row.row_id == row_id)
            .ok_or_else(|| ServiceError::NotFound(format!("row {row_id} in structure {structure_id}")))?;
        row.leveling_delay_ms = delay.num_milliseconds();
        structure.stamp = structure.stamp.next();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultCsvRecord {
    row_id: RowId,
    issue_key: String,
    delay_ms: i64,
    delay: String,
    pinned: bool,
    signature: i64,
    version: i64,
}

impl From<&LevelingResult> for ResultCsvRecord {
    fn from(result: &LevelingResult) -> Self {
        Self {
            row_id: result.row_id,
            issue_key: result.issue_key.clone(),
            delay_ms: result.delay.num_milliseconds(),
            delay: format_duration(result.delay),
            pinned: result.pinned,
            signature: result.stamp.signature,
            version: result.stamp.version,
        }
    }
}

pub fn save_results_to_csv<P: AsRef<Path>>(results: &[LevelingResult], path: P) -> ServiceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for result in results {
        writer.serialize(ResultCsvRecord::from(result))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_results_to_json<P: AsRef<Path>>(results: &[LevelingResult], path: P) -> ServiceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

pub fn load_results_from_json<P: AsRef<Path>>(path: P) -> ServiceResult<Vec<LevelingResult>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}
