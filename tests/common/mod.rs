#![allow(dead_code)]

use gantt_leveler::calendar::Calendar;
use gantt_leveler::persistence::{GanttSnapshot, QuerySnapshot, RowSnapshot, StructureSnapshot};
use gantt_leveler::task::{ConcurrencyStamp, Issue, RawRowAttributes};

pub const STRUCTURE_ID: i64 = 42;
pub const QUERY: &str = "project = OPS ORDER BY due";

pub fn raw(duration: &str) -> RawRowAttributes {
    RawRowAttributes {
        duration: duration.into(),
        ..RawRowAttributes::default()
    }
}

/// Structure 42 on a business-week calendar starting Monday 2024-01-08.
///
/// The query returns OPS-1 (8h), OPS-2 (8h), OPS-9 (not in the structure)
/// and OPS-3 (16h), in that order.
pub fn snapshot() -> GanttSnapshot {
    GanttSnapshot {
        calendars: vec![Calendar::business_week(7, "Office").to_config()],
        structures: vec![StructureSnapshot {
            id: STRUCTURE_ID,
            calendar_id: 7,
            start_date_id: 20240108,
            zone_id: "Europe/Paris".into(),
            forest: "501:0:10001,502:0:10002,503:1:10003,504:0:gantt/milestone/1".into(),
            stamp: ConcurrencyStamp::new(900, 1),
            rows: vec![
                RowSnapshot {
                    row_id: 501,
                    attributes: raw("1d"),
                    leveling_delay_ms: 0,
                },
                RowSnapshot {
                    row_id: 502,
                    attributes: raw("8h"),
                    leveling_delay_ms: 0,
                },
                RowSnapshot {
                    row_id: 503,
                    attributes: raw("2d"),
                    leveling_delay_ms: 0,
                },
            ],
        }],
        queries: vec![QuerySnapshot {
            query: QUERY.into(),
            issues: vec![
                Issue::new("10001", "OPS-1"),
                Issue::new("10002", "OPS-2"),
                Issue::new("10009", "OPS-9"),
                Issue::new("10003", "OPS-3"),
            ],
        }],
    }
}
