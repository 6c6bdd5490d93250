//! Gantt duration text and millisecond encodings of `chrono::Duration`.

use chrono::Duration;
use thiserror::Error;

/// Working hours in one Gantt day.
pub const HOURS_PER_DAY: i64 = 8;
/// Working days in one Gantt week.
pub const DAYS_PER_WEEK: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("malformed duration token '{0}'")]
    Malformed(String),
    #[error("unknown duration unit '{unit}' in '{token}'")]
    UnknownUnit { token: String, unit: String },
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse Gantt duration text such as `"1w 2d 3h 30m"`.
///
/// Units count working time: `w` is five working days, `d` is eight hours.
/// Empty input is a zero duration.
pub fn parse_gantt_duration(input: &str) -> Result<Duration, DurationParseError> {
    let mut total = Duration::zero();
    for token in input.split_whitespace() {
        let split = token
            .find(|c: char| !(c.is_ascii_digit() || c == '-'))
            .ok_or_else(|| DurationParseError::Malformed(token.to_string()))?;
        let (number, unit) = token.split_at(split);
        let value: i64 = number
            .parse()
            .map_err(|_| DurationParseError::Malformed(token.to_string()))?;

        let amount = match unit {
            "w" => value
                .checked_mul(DAYS_PER_WEEK * HOURS_PER_DAY)
                .and_then(Duration::try_hours),
            "d" => value.checked_mul(HOURS_PER_DAY).and_then(Duration::try_hours),
            "h" => Duration::try_hours(value),
            "m" => Duration::try_minutes(value),
            _ => {
                return Err(DurationParseError::UnknownUnit {
                    token: token.to_string(),
                    unit: unit.to_string(),
                });
            }
        };
        total = amount
            .and_then(|amount| total.checked_add(&amount))
            .ok_or_else(|| DurationParseError::OutOfRange(token.to_string()))?;
    }
    Ok(total)
}

/// Compact rendering for logs and CLI output: `16h`, `1h30m`, `45s`, `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    if total == 0 {
        return "0s".to_string();
    }

    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);

    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

/// Serde adapter storing a `chrono::Duration` as integer milliseconds.
pub mod millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(ms)
            .ok_or_else(|| de::Error::custom(format!("{ms} ms is out of range for a duration")))
    }
}
