//! Working-time calendar.
//!
//! Dates are exchanged as `DateId` integers (`YYYYMMDD`) and times of day as
//! `TimeOfDayId` integers (`HHMMSS`). A [`Calendar`] maps every date to the
//! amount of working time it holds: per-date overrides first, then the
//! Monday-first weekday schedule.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Calendar date encoded as `YYYYMMDD`, e.g. `20240115`.
pub type DateId = i32;

/// Time of day encoded as `HHMMSS`, e.g. `93000` for 09:30:00.
pub type TimeOfDayId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("calendar needs {expected} weekday schedules, got {got}")]
    WeekdayCount { expected: usize, got: usize },
    #[error("invalid time of day id {0}")]
    InvalidTimeId(TimeOfDayId),
    #[error("time range {start}..{finish} finishes before it starts")]
    InvertedRange {
        start: TimeOfDayId,
        finish: TimeOfDayId,
    },
    #[error("time ranges {first_finish} and {second_start} overlap or are out of order")]
    OverlappingRanges {
        first_finish: TimeOfDayId,
        second_start: TimeOfDayId,
    },
    #[error("invalid date id {0}")]
    InvalidDateId(DateId),
}

/// Decode a `DateId`. Returns `None` for anything that is not a real
/// eight-digit calendar date.
pub fn parse_date_id(date_id: DateId) -> Option<NaiveDate> {
    if !(10_000_000..=99_999_999).contains(&date_id) {
        return None;
    }
    let year = date_id / 10_000;
    let month = (date_id / 100 % 100) as u32;
    let day = (date_id % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn date_id_from(date: NaiveDate) -> DateId {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Offset from midnight encoded by a `TimeOfDayId`.
pub fn parse_time_id(time_id: TimeOfDayId) -> Duration {
    let hours = time_id / 10_000;
    let minutes = (time_id / 100) % 100;
    let seconds = time_id % 100;
    Duration::hours(hours as i64) + Duration::minutes(minutes as i64) + Duration::seconds(seconds as i64)
}

fn validate_time_id(time_id: TimeOfDayId) -> Result<(), CalendarError> {
    let minutes = (time_id / 100) % 100;
    let seconds = time_id % 100;
    if time_id < 0 || time_id > 240_000 || minutes > 59 || seconds > 59 {
        return Err(CalendarError::InvalidTimeId(time_id));
    }
    Ok(())
}

/// One working interval within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time_id: TimeOfDayId,
    pub finish_time_id: TimeOfDayId,
}

impl TimeRange {
    pub fn new(start_time_id: TimeOfDayId, finish_time_id: TimeOfDayId) -> Self {
        Self {
            start_time_id,
            finish_time_id,
        }
    }

    pub fn duration(&self) -> Duration {
        parse_time_id(self.finish_time_id) - parse_time_id(self.start_time_id)
    }
}

/// Ordered working intervals of a single day with their precomputed total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    time_ranges: Vec<TimeRange>,
    duration: Duration,
}

impl DaySchedule {
    /// Build a schedule from ordered, non-overlapping ranges.
    pub fn new(time_ranges: Vec<TimeRange>) -> Result<Self, CalendarError> {
        for range in &time_ranges {
            validate_time_id(range.start_time_id)?;
            validate_time_id(range.finish_time_id)?;
            if range.finish_time_id < range.start_time_id {
                return Err(CalendarError::InvertedRange {
                    start: range.start_time_id,
                    finish: range.finish_time_id,
                });
            }
        }
        for pair in time_ranges.windows(2) {
            if pair[1].start_time_id < pair[0].finish_time_id {
                return Err(CalendarError::OverlappingRanges {
                    first_finish: pair[0].finish_time_id,
                    second_start: pair[1].start_time_id,
                });
            }
        }

        let duration = time_ranges
            .iter()
            .fold(Duration::zero(), |total, range| total + range.duration());
        Ok(Self {
            time_ranges,
            duration,
        })
    }

    /// A day without working time (weekend, holiday).
    pub fn non_working() -> Self {
        Self {
            time_ranges: Vec::new(),
            duration: Duration::zero(),
        }
    }

    /// Classic 09:00-13:00 / 14:00-18:00 day, eight working hours.
    pub fn business_day() -> Self {
        let time_ranges = vec![TimeRange::new(90_000, 130_000), TimeRange::new(140_000, 180_000)];
        Self {
            duration: Duration::hours(8),
            time_ranges,
        }
    }

    pub fn time_ranges(&self) -> &[TimeRange] {
        &self.time_ranges
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_working(&self) -> bool {
        self.duration > Duration::zero()
    }
}

/// Serializable form of a [`DaySchedule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayScheduleConfig {
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDayConfig {
    pub date_id: DateId,
    pub schedule: DayScheduleConfig,
}

/// Serializable form of a [`Calendar`]. Weekdays are listed Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub week_days: Vec<DayScheduleConfig>,
    #[serde(default)]
    pub custom_days: Vec<CustomDayConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    id: i64,
    name: String,
    week_days: [DaySchedule; Calendar::WEEKDAY_COUNT],
    custom_days: HashMap<DateId, DaySchedule>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::business_week(0, "Standard")
    }
}

impl Calendar {
    pub const WEEKDAY_COUNT: usize = 7;

    /// `week_days` is indexed Monday (0) through Sunday (6).
    pub fn new(id: i64, name: impl Into<String>, week_days: [DaySchedule; Self::WEEKDAY_COUNT]) -> Self {
        Self {
            id,
            name: name.into(),
            week_days,
            custom_days: HashMap::new(),
        }
    }

    /// Monday to Friday business days, weekends off.
    pub fn business_week(id: i64, name: impl Into<String>) -> Self {
        let week_days = std::array::from_fn(|idx| {
            if idx < 5 {
                DaySchedule::business_day()
            } else {
                DaySchedule::non_working()
            }
        });
        Self::new(id, name, week_days)
    }

    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        if config.week_days.len() != Self::WEEKDAY_COUNT {
            return Err(CalendarError::WeekdayCount {
                expected: Self::WEEKDAY_COUNT,
                got: config.week_days.len(),
            });
        }

        let mut week_days = Vec::with_capacity(Self::WEEKDAY_COUNT);
        for day in &config.week_days {
            week_days.push(DaySchedule::new(day.time_ranges.clone())?);
        }
        let week_days: [DaySchedule; Self::WEEKDAY_COUNT] =
            week_days
                .try_into()
                .map_err(|days: Vec<DaySchedule>| CalendarError::WeekdayCount {
                    expected: Self::WEEKDAY_COUNT,
                    got: days.len(),
                })?;

        let mut custom_days = HashMap::with_capacity(config.custom_days.len());
        for custom in &config.custom_days {
            if parse_date_id(custom.date_id).is_none() {
                return Err(CalendarError::InvalidDateId(custom.date_id));
            }
            custom_days.insert(
                custom.date_id,
                DaySchedule::new(custom.schedule.time_ranges.clone())?,
            );
        }

        Ok(Self {
            id: config.id,
            name: config.name.clone(),
            week_days,
            custom_days,
        })
    }

    pub fn to_config(&self) -> CalendarConfig {
        CalendarConfig::from(self)
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn week_day(&self, index: usize) -> Option<&DaySchedule> {
        self.week_days.get(index)
    }

    /// Override the schedule of a single date (holiday, half-day, extra working day).
    pub fn set_custom_day(&mut self, date_id: DateId, schedule: DaySchedule) {
        self.custom_days.insert(date_id, schedule);
    }

    pub fn with_custom_day(mut self, date_id: DateId, schedule: DaySchedule) -> Self {
        self.set_custom_day(date_id, schedule);
        self
    }

    pub fn remove_custom_day(&mut self, date_id: DateId) -> Option<DaySchedule> {
        self.custom_days.remove(&date_id)
    }

    pub fn custom_day(&self, date_id: DateId) -> Option<&DaySchedule> {
        self.custom_days.get(&date_id)
    }

    /// Monday-first weekday index (Monday = 0, Sunday = 6).
    pub fn weekday_index(date: NaiveDate) -> usize {
        date.weekday().num_days_from_monday() as usize
    }

    /// Schedule in force on a date: the override if any, else the weekday schedule.
    /// `None` when the date id cannot be decoded and has no override.
    pub fn day_schedule(&self, date_id: DateId) -> Option<&DaySchedule> {
        if let Some(day) = self.custom_days.get(&date_id) {
            return Some(day);
        }
        let date = parse_date_id(date_id)?;
        self.week_days.get(Self::weekday_index(date))
    }

    /// Working time on a single date. A malformed date id counts as a
    /// non-working day instead of failing.
    pub fn working_duration(&self, date_id: DateId) -> Duration {
        self.day_schedule(date_id)
            .map(DaySchedule::duration)
            .unwrap_or_else(Duration::zero)
    }

    /// Working time over the half-open date range `[start_id, finish_id)`.
    ///
    /// Zero when `finish_id` is not after `start_id` or either bound is malformed.
    pub fn working_duration_between(&self, start_id: DateId, finish_id: DateId) -> Duration {
        let (Some(start), Some(finish)) = (parse_date_id(start_id), parse_date_id(finish_id)) else {
            return Duration::zero();
        };

        start
            .iter_days()
            .take_while(|date| *date < finish)
            .fold(Duration::zero(), |total, date| {
                total + self.working_duration(date_id_from(date))
            })
    }

    /// Working time over `[start, finish)` for `NaiveDate` bounds.
    pub fn working_duration_between_dates(&self, start: NaiveDate, finish: NaiveDate) -> Duration {
        self.working_duration_between(date_id_from(start), date_id_from(finish))
    }
}

impl From<&DaySchedule> for DayScheduleConfig {
    fn from(day: &DaySchedule) -> Self {
        Self {
            time_ranges: day.time_ranges.clone(),
        }
    }
}

impl From<&Calendar> for CalendarConfig {
    fn from(calendar: &Calendar) -> Self {
        let mut custom_days: Vec<CustomDayConfig> = calendar
            .custom_days
            .iter()
            .map(|(date_id, day)| CustomDayConfig {
                date_id: *date_id,
                schedule: DayScheduleConfig::from(day),
            })
            .collect();
        custom_days.sort_by_key(|custom| custom.date_id);

        Self {
            id: calendar.id,
            name: calendar.name.clone(),
            week_days: calendar.week_days.iter().map(DayScheduleConfig::from).collect(),
            custom_days,
        }
    }
}
