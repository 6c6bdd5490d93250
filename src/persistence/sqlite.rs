use super::{GanttSnapshot, QuerySnapshot, RowSnapshot, StructureSnapshot};
use crate::calendar::{Calendar, CalendarConfig, DateId};
use crate::service::{GanttMeta, GanttService, ServiceError, ServiceResult, parse_forest_formula};
use crate::task::{ConcurrencyStamp, Issue, RawRowAttributes, RowId, TaskAttributes};
use chrono::Duration;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Gantt service backed by a SQLite database.
///
/// Leveling writes are conditional on the structure's stamp, so a stale
/// writer gets [`ServiceError::Conflict`] and changes nothing.
pub struct SqliteGanttStore {
    connection: Mutex<Connection>,
}

impl SqliteGanttStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> ServiceResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> ServiceResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> ServiceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> ServiceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS calendars (
                id INTEGER PRIMARY KEY,
                config_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS structures (
                id INTEGER PRIMARY KEY,
                calendar_id INTEGER NOT NULL,
                start_date_id INTEGER NOT NULL,
                zone_id TEXT NOT NULL,
                forest TEXT NOT NULL,
                signature INTEGER NOT NULL,
                version INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS structure_rows (
                structure_id INTEGER NOT NULL REFERENCES structures(id) ON DELETE CASCADE,
                row_id INTEGER NOT NULL,
                attributes_json TEXT NOT NULL,
                leveling_delay_ms INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (structure_id, row_id)
            );
            CREATE TABLE IF NOT EXISTS queries (
                query TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS query_issues (
                query TEXT NOT NULL REFERENCES queries(query) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                issue_id TEXT NOT NULL,
                issue_key TEXT NOT NULL,
                PRIMARY KEY (query, position)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| ServiceError::Transport("sqlite connection lock poisoned".into()))
    }

    /// Replace the stored contents with a snapshot.
    pub fn import_snapshot(&self, snapshot: &GanttSnapshot) -> ServiceResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM query_issues", [])?;
        tx.execute("DELETE FROM queries", [])?;
        tx.execute("DELETE FROM structure_rows", [])?;
        tx.execute("DELETE FROM structures", [])?;
        tx.execute("DELETE FROM calendars", [])?;

        for calendar in &snapshot.calendars {
            tx.execute(
                "INSERT INTO calendars (id, config_json) VALUES (?1, ?2)",
                params![calendar.id, serde_json::to_string(calendar)?],
            )?;
        }
        for structure in &snapshot.structures {
            tx.execute(
                "INSERT INTO structures (id, calendar_id, start_date_id, zone_id, forest, signature, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    structure.id,
                    structure.calendar_id,
                    structure.start_date_id,
                    structure.zone_id,
                    structure.forest,
                    structure.stamp.signature,
                    structure.stamp.version
                ],
            )?;
            for row in &structure.rows {
                tx.execute(
                    "INSERT INTO structure_rows (structure_id, row_id, attributes_json, leveling_delay_ms)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        structure.id,
                        row.row_id,
                        serde_json::to_string(&row.attributes)?,
                        row.leveling_delay_ms
                    ],
                )?;
            }
        }
        for query in &snapshot.queries {
            tx.execute("INSERT INTO queries (query) VALUES (?1)", params![query.query])?;
            for (position, issue) in query.issues.iter().enumerate() {
                tx.execute(
                    "INSERT INTO query_issues (query, position, issue_id, issue_key) VALUES (?1, ?2, ?3, ?4)",
                    params![query.query, position as i64, issue.id, issue.key],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn export_snapshot(&self) -> ServiceResult<GanttSnapshot> {
        let conn = self.lock()?;

        let mut calendars = Vec::new();
        let mut stmt = conn.prepare("SELECT config_json FROM calendars ORDER BY id ASC")?;
        for json in stmt.query_map([], |row| row.get::<_, String>(0))? {
            calendars.push(serde_json::from_str::<CalendarConfig>(&json?)?);
        }

        let mut structures = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT id, calendar_id, start_date_id, zone_id, forest, signature, version
             FROM structures ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StructureSnapshot {
                id: row.get(0)?,
                calendar_id: row.get(1)?,
                start_date_id: row.get(2)?,
                zone_id: row.get(3)?,
                forest: row.get(4)?,
                stamp: ConcurrencyStamp::new(row.get(5)?, row.get(6)?),
                rows: Vec::new(),
            })
        })?;
        for structure in rows {
            structures.push(structure?);
        }

        let mut stmt = conn.prepare(
            "SELECT row_id, attributes_json, leveling_delay_ms FROM structure_rows
             WHERE structure_id = ?1 ORDER BY row_id ASC",
        )?;
        for structure in &mut structures {
            let rows = stmt.query_map(params![structure.id], |row| {
                Ok((
                    row.get::<_, RowId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            for row in rows {
                let (row_id, json, leveling_delay_ms) = row?;
                structure.rows.push(RowSnapshot {
                    row_id,
                    attributes: serde_json::from_str(&json)?,
                    leveling_delay_ms,
                });
            }
        }

        let mut stmt = conn.prepare("SELECT query FROM queries ORDER BY query ASC")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut queries = Vec::with_capacity(names.len());
        for query in names {
            let issues = Self::query_issues(&conn, &query)?;
            queries.push(QuerySnapshot { query, issues });
        }

        Ok(GanttSnapshot {
            calendars,
            structures,
            queries,
        })
    }

    /// Leveling delay currently stored for a row.
    pub fn leveling_delay(&self, structure_id: i64, row_id: RowId) -> ServiceResult<Option<Duration>> {
        let conn = self.lock()?;
        let delay_ms: Option<i64> = conn
            .query_row(
                "SELECT leveling_delay_ms FROM structure_rows WHERE structure_id = ?1 AND row_id = ?2",
                params![structure_id, row_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(delay_ms.map(Duration::milliseconds))
    }

    fn query_issues(conn: &Connection, query: &str) -> ServiceResult<Vec<Issue>> {
        let mut stmt = conn.prepare(
            "SELECT issue_id, issue_key FROM query_issues WHERE query = ?1 ORDER BY position ASC",
        )?;
        let issues = stmt
            .query_map(params![query], |row| {
                Ok(Issue::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    fn structure_stamp(conn: &Connection, structure_id: i64) -> ServiceResult<ConcurrencyStamp> {
        conn.query_row(
            "SELECT signature, version FROM structures WHERE id = ?1",
            params![structure_id],
            |row| Ok(ConcurrencyStamp::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| ServiceError::NotFound(format!("structure {structure_id}")))
    }
}

impl GanttService for SqliteGanttStore {
    fn gantt_meta(&self, structure_id: i64) -> ServiceResult<GanttMeta> {
        let conn = self.lock()?;
        let (calendar_id, start_date_id, zone_id) = conn
            .query_row(
                "SELECT calendar_id, start_date_id, zone_id FROM structures WHERE id = ?1",
                params![structure_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, DateId>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| ServiceError::NotFound(format!("structure {structure_id}")))?;

        let config_json: String = conn
            .query_row(
                "SELECT config_json FROM calendars WHERE id = ?1",
                params![calendar_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ServiceError::NotFound(format!("calendar with ID {calendar_id}")))?;
        let config: CalendarConfig = serde_json::from_str(&config_json)?;

        Ok(GanttMeta {
            calendar: Calendar::from_config(&config)?,
            start_date_id,
            zone_id,
        })
    }

    fn row_mapping(&self, structure_id: i64) -> ServiceResult<HashMap<String, RowId>> {
        let conn = self.lock()?;
        let forest: String = conn
            .query_row(
                "SELECT forest FROM structures WHERE id = ?1",
                params![structure_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ServiceError::NotFound(format!("structure {structure_id}")))?;
        parse_forest_formula(&forest)
    }

    fn ordered_issues(&self, query: &str) -> ServiceResult<Vec<Issue>> {
        let conn = self.lock()?;
        let known: Option<String> = conn
            .query_row(
                "SELECT query FROM queries WHERE query = ?1",
                params![query],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(ServiceError::NotFound(format!("query '{query}'")));
        }
        Self::query_issues(&conn, query)
    }

    fn row_attributes(&self, structure_id: i64, row_id: RowId) -> ServiceResult<TaskAttributes> {
        let conn = self.lock()?;
        let stamp = Self::structure_stamp(&conn, structure_id)?;
        let json: String = conn
            .query_row(
                "SELECT attributes_json FROM structure_rows WHERE structure_id = ?1 AND row_id = ?2",
                params![structure_id, row_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ServiceError::NotFound(format!("row {row_id} in structure {structure_id}")))?;
        let raw: RawRowAttributes = serde_json::from_str(&json)?;
        Ok(raw.parse(stamp)?)
    }

    fn write_leveling_delay(
        &mut self,
        structure_id: i64,
        row_id: RowId,
        delay: Duration,
        stamp: ConcurrencyStamp,
    ) -> ServiceResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let bumped = tx.execute(
            "UPDATE structures SET version = version + 1
             WHERE id = ?1 AND signature = ?2 AND version = ?3",
            params![structure_id, stamp.signature, stamp.version],
        )?;
        if bumped == 0 {
            Self::structure_stamp(&tx, structure_id)?;
            return Err(ServiceError::Conflict { row_id, stamp });
        }

        let updated = tx.execute(
            "UPDATE structure_rows SET leveling_delay_ms = ?3 WHERE structure_id = ?1 AND row_id = ?2",
            params![structure_id, row_id, delay.num_milliseconds()],
        )?;
        if updated == 0 {
            return Err(ServiceError::NotFound(format!(
                "row {row_id} in structure {structure_id}"
            )));
        }

        tx.commit()?;
        Ok(())
    }
}
