use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Duration;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    Calendar, CalendarConfig, CalendarError, DateId, LevelingError, LevelingPlanner, LevelingResult,
    LevelingTask, RowId, SlotError, TaskAttributes, duration, format_duration, leveling::resolve_today,
};

#[derive(Clone, Default)]
pub struct AppState {
    calendars: Arc<RwLock<HashMap<i64, Calendar>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendars<I: IntoIterator<Item = Calendar>>(calendars: I) -> Self {
        let calendars = calendars
            .into_iter()
            .map(|calendar| (calendar.id(), calendar))
            .collect();
        Self {
            calendars: Arc::new(RwLock::new(calendars)),
        }
    }

    fn calendar(&self, id: i64) -> Result<Calendar, ApiError> {
        self.calendars
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("calendar {id} not found")))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Invalid(String),
    Unprocessable(&'static str, String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<CalendarError> for ApiError {
    fn from(value: CalendarError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl From<LevelingError> for ApiError {
    fn from(value: LevelingError) -> Self {
        let error = match value {
            LevelingError::Slots(SlotError::NoSlots) => "no_slots",
            LevelingError::Slots(SlotError::Overflow { .. }) => "duration_overflow",
            LevelingError::Slots(SlotError::OutOfRange { .. }) => "invalid_slot",
        };
        ApiError::Unprocessable(error, value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Unprocessable(error, message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, error, message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct DurationQuery {
    start: DateId,
    finish: DateId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkingDurationResponse {
    pub start: DateId,
    pub finish: DateId,
    #[serde(with = "duration::millis")]
    pub duration_ms: Duration,
    pub duration: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LevelTaskPayload {
    pub row_id: RowId,
    #[serde(default)]
    pub issue_key: String,
    pub attributes: TaskAttributes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LevelRequest {
    /// Inline calendar; takes precedence over `calendar_id`.
    #[serde(default)]
    pub calendar: Option<CalendarConfig>,
    #[serde(default)]
    pub calendar_id: Option<i64>,
    pub project_start_date_id: DateId,
    #[serde(default)]
    pub today_date_id: Option<DateId>,
    pub track_count: usize,
    #[serde(default)]
    pub tasks: Vec<LevelTaskPayload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LevelResponse {
    pub today_date_id: DateId,
    #[serde(with = "duration::millis")]
    pub initial_offset_ms: Duration,
    pub results: Vec<LevelingResult>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calendars/:id", get(get_calendar).put(put_calendar))
        .route("/calendars/:id/working-duration", get(working_duration))
        .route("/level", post(level))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_calendar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CalendarConfig>, ApiError> {
    Ok(Json(state.calendar(id)?.to_config()))
}

async fn put_calendar(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut config): Json<CalendarConfig>,
) -> Result<Json<CalendarConfig>, ApiError> {
    config.id = id;
    let calendar = Calendar::from_config(&config)?;
    let stored = calendar.to_config();
    state.calendars.write().insert(id, calendar);
    info!(calendar_id = id, "calendar stored");
    Ok(Json(stored))
}

async fn working_duration(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DurationQuery>,
) -> Result<Json<WorkingDurationResponse>, ApiError> {
    let calendar = state.calendar(id)?;
    let duration = calendar.working_duration_between(query.start, query.finish);
    Ok(Json(WorkingDurationResponse {
        start: query.start,
        finish: query.finish,
        duration_ms: duration,
        duration: format_duration(duration),
    }))
}

async fn level(
    State(state): State<AppState>,
    Json(request): Json<LevelRequest>,
) -> Result<Json<LevelResponse>, ApiError> {
    let calendar = match (&request.calendar, request.calendar_id) {
        (Some(config), _) => Calendar::from_config(config)?,
        (None, Some(id)) => state.calendar(id)?,
        (None, None) => return Err(ApiError::invalid("either calendar or calendar_id is required")),
    };

    let today = resolve_today(request.today_date_id);
    let mut planner = LevelingPlanner::new(
        &calendar,
        request.project_start_date_id,
        today,
        request.track_count,
    )?;
    let mut results = Vec::with_capacity(request.tasks.len());
    for task in request.tasks {
        let task = LevelingTask::new(task.row_id, task.issue_key, task.attributes);
        results.push(planner.level(&task)?);
    }

    Ok(Json(LevelResponse {
        today_date_id: today,
        initial_offset_ms: planner.initial_offset(),
        results,
    }))
}
