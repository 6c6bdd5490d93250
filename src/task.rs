use crate::duration::{self, DurationParseError};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a row inside a Gantt structure.
pub type RowId = i64;

/// Text layout of Gantt attribute dates, e.g. `15/Jan/24 09:00 PM`.
pub const ATTRIBUTE_DATE_FORMAT: &str = "%d/%b/%y %I:%M %p";

/// Layout for values that carry a 24-hour clock next to the marker,
/// e.g. `15/Jan/24 21:00 PM` or `15/Jan/24 00:30 AM`.
const ATTRIBUTE_DATE_FORMAT_24H: &str = "%d/%b/%y %H:%M %p";

/// Issue as returned by the ordered task query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
}

impl Issue {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
        }
    }
}

/// Signature and version of the structure state an attribute read observed.
/// The write-back is rejected when it no longer matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcurrencyStamp {
    pub signature: i64,
    pub version: i64,
}

impl ConcurrencyStamp {
    pub fn new(signature: i64, version: i64) -> Self {
        Self { signature, version }
    }

    /// Stamp that follows this one after a successful write.
    pub fn next(&self) -> Self {
        Self {
            signature: self.signature,
            version: self.version + 1,
        }
    }
}

/// Scheduling attributes of one row, read just before leveling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttributes {
    #[serde(with = "duration::millis", rename = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_finish: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<NaiveDateTime>,
    #[serde(default)]
    pub stamp: ConcurrencyStamp,
}

impl TaskAttributes {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            manual_start: None,
            manual_finish: None,
            start: None,
            finish: None,
            stamp: ConcurrencyStamp::default(),
        }
    }

    /// Pin the task to a manual start; its scheduled start follows it.
    pub fn pinned_at(mut self, manual_start: NaiveDateTime) -> Self {
        self.manual_start = Some(manual_start);
        self.start = Some(manual_start);
        self
    }

    pub fn with_stamp(mut self, stamp: ConcurrencyStamp) -> Self {
        self.stamp = stamp;
        self
    }

    /// A task with either manual date set is fixed in place and not leveled.
    pub fn is_pinned(&self) -> bool {
        self.manual_start.is_some() || self.manual_finish.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeParseError {
    #[error("invalid {field} '{value}'")]
    Date { field: &'static str, value: String },
    #[error("invalid duration: {0}")]
    Duration(#[from] DurationParseError),
}

/// Row attributes in the text format the Gantt service reports them.
/// Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRowAttributes {
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub manual_start: String,
    #[serde(default)]
    pub manual_finish: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub finish: String,
}

impl RawRowAttributes {
    pub fn parse(&self, stamp: ConcurrencyStamp) -> Result<TaskAttributes, AttributeParseError> {
        Ok(TaskAttributes {
            duration: duration::parse_gantt_duration(&self.duration)?,
            manual_start: parse_attribute_date("manualStart", &self.manual_start)?,
            manual_finish: parse_attribute_date("manualFinish", &self.manual_finish)?,
            start: parse_attribute_date("start", &self.start)?,
            finish: parse_attribute_date("finish", &self.finish)?,
            stamp,
        })
    }
}

/// Hours are read on a 12-hour clock when they fit one (`09:00 PM` is 21:00,
/// `12:00 AM` is midnight), otherwise as a 24-hour clock.
pub fn parse_attribute_date(
    field: &'static str,
    value: &str,
) -> Result<Option<NaiveDateTime>, AttributeParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, ATTRIBUTE_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, ATTRIBUTE_DATE_FORMAT_24H))
        .map(Some)
        .map_err(|_| AttributeParseError::Date {
            field,
            value: value.to_string(),
        })
}

/// Delay computed for one row, ready for write-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelingResult {
    pub row_id: RowId,
    #[serde(default)]
    pub issue_key: String,
    #[serde(with = "duration::millis", rename = "delay_ms")]
    pub delay: Duration,
    /// Manually pinned rows always get a zero delay.
    pub pinned: bool,
    #[serde(default)]
    pub stamp: ConcurrencyStamp,
}
