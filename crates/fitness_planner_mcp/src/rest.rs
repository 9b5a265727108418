//! Plain HTTP routes over the same [`FitnessManager`] the MCP tools use.

use std::sync::Arc;

use axum::debug_handler;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Serialize;
use serde_json::{Map, Value};

use fitness_planner::build_info::BuildInfo;
use fitness_planner::observability::Health;
use fitness_planner::overview::{EventOverview, export_file_name};
use fitness_planner::{
    FitnessEvent, FitnessManager, Outcome, PlannerError, SkipReason, TrainingWeek, WeekRef,
    WorkoutId,
};

use crate::McpError;

type ApiError = (StatusCode, String);

pub struct AppState {
    pub manager: Arc<FitnessManager>,
}

#[derive(Serialize)]
struct VersionDto {
    #[serde(flatten)]
    info: BuildInfo,
    display: String,
}

fn map_err(e: PlannerError) -> ApiError {
    let e = McpError::from(e);
    (e.status(), e.to_string())
}

fn not_found(what: String) -> ApiError {
    let e = McpError::NotFound(what);
    (e.status(), e.to_string())
}

/// Skipped operations keep their outcome body but get a client-error status.
fn outcome_response(outcome: Outcome, success: StatusCode) -> (StatusCode, Json<Outcome>) {
    let status = match &outcome {
        Outcome::Skipped {
            reason: SkipReason::MissingId,
        } => StatusCode::BAD_REQUEST,
        Outcome::Skipped { .. } => StatusCode::NOT_FOUND,
        _ => success,
    };
    (status, Json(outcome))
}

fn parse_week(raw: &str) -> Result<WeekRef, (StatusCode, Json<Outcome>)> {
    WeekRef::parse(raw)
        .ok_or_else(|| outcome_response(SkipReason::MissingId.into(), StatusCode::OK))
}

#[debug_handler]
async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(state.manager.health().await)
}

#[debug_handler]
async fn version() -> impl IntoResponse {
    let info = BuildInfo::current();
    Json(VersionDto {
        display: info.display(),
        info,
    })
}

#[debug_handler]
async fn list_events(State(state): State<Arc<AppState>>) -> Json<Vec<FitnessEvent>> {
    Json(state.manager.events().await.as_ref().clone())
}

#[debug_handler]
async fn overview(State(state): State<Arc<AppState>>) -> Json<Vec<EventOverview>> {
    Json(state.manager.overview().await)
}

#[debug_handler]
async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(ev): Json<FitnessEvent>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let outcome = state.manager.add_event(ev).await.map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::CREATED))
}

#[debug_handler]
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FitnessEvent>, ApiError> {
    state
        .manager
        .event(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("event {id}")))
}

#[debug_handler]
async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(ev): Json<FitnessEvent>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    if ev.id != id {
        let e = McpError::Validation(format!("body id {} does not match path id {id}", ev.id));
        return Err((e.status(), e.to_string()));
    }
    let outcome = state.manager.update_event(ev).await.map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

#[debug_handler]
async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let outcome = state.manager.delete_event(&id).await.map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

#[debug_handler]
async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TrainingWeek>>, ApiError> {
    state
        .manager
        .plan(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("plan for event {id}")))
}

#[debug_handler]
async fn export_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .manager
        .event(&id)
        .await
        .ok_or_else(|| not_found(format!("event {id}")))?;
    let weeks = state.manager.plan(&id).await.unwrap_or_default();
    let body = serde_json::to_vec_pretty(&serde_json::json!({
        "event": event,
        "weeks": weeks,
    }))
    .map_err(|e| map_err(e.into()))?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&event, state.manager.now_millis())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[debug_handler]
async fn update_training_week(
    State(state): State<Arc<AppState>>,
    Path((id, week)): Path<(String, String)>,
    Json(updates): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let week = match parse_week(&week) {
        Ok(w) => w,
        Err(resp) => return Ok(resp),
    };
    let outcome = state
        .manager
        .update_training_week(&id, &week, updates)
        .await
        .map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

#[debug_handler]
async fn add_workout(
    State(state): State<Arc<AppState>>,
    Path((id, week, kind)): Path<(String, String, String)>,
    Json(data): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let week = match parse_week(&week) {
        Ok(w) => w,
        Err(resp) => return Ok(resp),
    };
    let outcome = state
        .manager
        .add_workout(&id, &week, &kind, data)
        .await
        .map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::CREATED))
}

#[debug_handler]
async fn update_workout(
    State(state): State<Arc<AppState>>,
    Path((id, week, kind, workout)): Path<(String, String, String, String)>,
    Json(updates): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let week = match parse_week(&week) {
        Ok(w) => w,
        Err(resp) => return Ok(resp),
    };
    let outcome = state
        .manager
        .update_workout(&id, &week, &kind, &WorkoutId::parse(&workout), updates)
        .await
        .map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

#[debug_handler]
async fn delete_workout(
    State(state): State<Arc<AppState>>,
    Path((id, week, kind, workout)): Path<(String, String, String, String)>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let week = match parse_week(&week) {
        Ok(w) => w,
        Err(resp) => return Ok(resp),
    };
    let outcome = state
        .manager
        .delete_workout(&id, &week, &kind, &WorkoutId::parse(&workout))
        .await
        .map_err(map_err)?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

/// REST routes for events, plans and workouts plus `/health` and `/version`.
pub fn router(manager: Arc<FitnessManager>) -> Router {
    let state = Arc::new(AppState { manager });
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/overview", get(overview))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/{id}/plan", get(get_plan))
        .route("/events/{id}/plan/export", get(export_plan))
        .route("/events/{id}/weeks/{week}", patch(update_training_week))
        .route("/events/{id}/weeks/{week}/{kind}", post(add_workout))
        .route(
            "/events/{id}/weeks/{week}/{kind}/{workout}",
            patch(update_workout).delete(delete_workout),
        )
        .with_state(state)
}
