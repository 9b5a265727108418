use std::sync::Arc;

use rmcp::Json;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, GetPromptRequestParams, GetPromptResult, ListPromptsResult, ListResourcesResult,
    PaginatedRequestParams, RawResource, ReadResourceRequestParam, ReadResourceResult,
    ResourceContents,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer};
use rmcp::{prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fitness_planner::build_info::BuildInfo;
use fitness_planner::overview::EventOverview;
use fitness_planner::utils::format_date;
use fitness_planner::{
    FitnessEvent, FitnessManager, Outcome, SkipReason, TrainingWeek, ViewMode, WeekRef, WorkoutId,
};

pub mod error;
mod prompts;
pub mod rest;

pub use error::{McpError, McpResult};

pub const EVENTS_RESOURCE_URI: &str = "fitness-planner://events";

/// Log filter for both binaries: `FITNESS_PLANNER_LOG_LEVEL`, then
/// `RUST_LOG`, then `info`, with rmcp internals kept at `warn`.
pub fn log_filter(level: Option<String>, rust_log: Option<String>) -> String {
    let log_env = level
        .or(rust_log)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    format!("{},rmcp=warn,serve_inner=warn", log_env)
}

#[derive(Clone)]
pub struct FitnessMcpHandler {
    manager: Arc<FitnessManager>,
    tool_router: rmcp::handler::server::tool::ToolRouter<FitnessMcpHandler>,
    prompt_router: rmcp::handler::server::router::prompt::PromptRouter<FitnessMcpHandler>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct EventIdParam {
    pub event_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateWeekParams {
    pub event_id: String,
    /// `week-<N>` matches by id or week number; anything else matches the id exactly.
    pub week_id: String,
    /// Fields to merge onto the week. `null` values are ignored.
    pub updates: Value,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateWorkoutParams {
    pub event_id: String,
    pub week_id: String,
    /// Collection name, e.g. `swim`, `bike`, `run`.
    pub workout_type: String,
    pub workout_id: WorkoutId,
    pub updates: Value,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AddWorkoutParams {
    pub event_id: String,
    pub week_id: String,
    pub workout_type: String,
    /// Workout attributes. Any `id` is replaced by a generated one.
    pub workout: Value,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeleteWorkoutParams {
    pub event_id: String,
    pub week_id: String,
    pub workout_type: String,
    pub workout_id: WorkoutId,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SelectEventParams {
    /// Omit to clear the selection.
    pub event_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ViewModeParams {
    pub mode: ViewMode,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct EventsResult {
    pub events: Vec<FitnessEvent>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PlanResult {
    pub event_id: String,
    /// False until the first plan edit creates the plan.
    pub initialized: bool,
    pub weeks: Vec<TrainingWeek>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OperationResult {
    pub outcome: Outcome,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OverviewResult {
    pub view_mode: ViewMode,
    pub selected_event_id: Option<String>,
    pub events: Vec<EventOverview>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BuildInfoResult {
    #[serde(flatten)]
    pub info: BuildInfo,
    pub display: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PlanTrainingWeekParams {
    pub event_id: Option<String>,
    pub week_id: Option<String>,
    pub focus: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RaceCountdownParams {
    pub event_id: Option<String>,
}

/// Accept a JSON object or `null` as a field map.
pub fn object_or_empty(value: Value) -> McpResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(McpError::Validation(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

fn applied(outcome: Outcome) -> Json<OperationResult> {
    Json(OperationResult { outcome })
}

fn missing_week() -> Json<OperationResult> {
    applied(SkipReason::MissingId.into())
}

#[tool_router]
#[prompt_router]
impl FitnessMcpHandler {
    pub fn new(manager: Arc<FitnessManager>) -> Self {
        Self {
            manager,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn manager(&self) -> &Arc<FitnessManager> {
        &self.manager
    }

    pub fn tool_count(&self) -> usize {
        self.tool_router.list_all().len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_router.list_all().len()
    }

    /// Selected event, else the first event.
    async fn focus_event(&self, event_id: Option<String>) -> Option<FitnessEvent> {
        match event_id {
            Some(id) => self.manager.event(&id).await,
            None => match self.manager.selected_event().await {
                Some(ev) => Some(ev),
                None => self.manager.events().await.first().cloned(),
            },
        }
    }

    // === Events ===

    #[tool(name = "list_events", description = "List all target events")]
    async fn list_events(&self) -> Result<Json<EventsResult>, String> {
        let events = self.manager.events().await;
        Ok(Json(EventsResult {
            events: events.as_ref().clone(),
        }))
    }

    #[tool(name = "get_event", description = "Get a target event by id")]
    async fn get_event(
        &self,
        params: Parameters<EventIdParam>,
    ) -> Result<Json<FitnessEvent>, String> {
        let id = params.0.event_id;
        match self.manager.event(&id).await {
            Some(ev) => Ok(Json(ev)),
            None => Err(McpError::NotFound(format!("event {id}")).into()),
        }
    }

    #[tool(
        name = "add_event",
        description = "Add a target event. The date must be YYYY-MM-DD or an ISO datetime"
    )]
    async fn add_event(
        &self,
        params: Parameters<FitnessEvent>,
    ) -> Result<Json<OperationResult>, String> {
        let outcome = self
            .manager
            .add_event(params.0)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    #[tool(
        name = "update_event",
        description = "Replace the event with the same id"
    )]
    async fn update_event(
        &self,
        params: Parameters<FitnessEvent>,
    ) -> Result<Json<OperationResult>, String> {
        let outcome = self
            .manager
            .update_event(params.0)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    #[tool(
        name = "delete_event",
        description = "Delete an event together with its training plan"
    )]
    async fn delete_event(
        &self,
        params: Parameters<EventIdParam>,
    ) -> Result<Json<OperationResult>, String> {
        let outcome = self
            .manager
            .delete_event(&params.0.event_id)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    // === Training plans ===

    #[tool(name = "get_plan", description = "Get the training plan of an event")]
    async fn get_plan(
        &self,
        params: Parameters<EventIdParam>,
    ) -> Result<Json<PlanResult>, String> {
        let event_id = params.0.event_id;
        let plan = self.manager.plan(&event_id).await;
        Ok(Json(PlanResult {
            initialized: plan.is_some(),
            weeks: plan.unwrap_or_default(),
            event_id,
        }))
    }

    #[tool(
        name = "update_training_week",
        description = "Merge fields onto a training week, creating the plan on first use"
    )]
    async fn update_training_week(
        &self,
        params: Parameters<UpdateWeekParams>,
    ) -> Result<Json<OperationResult>, String> {
        let p = params.0;
        let Some(week) = WeekRef::parse(&p.week_id) else {
            return Ok(missing_week());
        };
        let updates = object_or_empty(p.updates)?;
        let outcome = self
            .manager
            .update_training_week(&p.event_id, &week, updates)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    #[tool(
        name = "update_workout",
        description = "Merge fields onto one workout of a training week"
    )]
    async fn update_workout(
        &self,
        params: Parameters<UpdateWorkoutParams>,
    ) -> Result<Json<OperationResult>, String> {
        let p = params.0;
        let Some(week) = WeekRef::parse(&p.week_id) else {
            return Ok(missing_week());
        };
        let updates = object_or_empty(p.updates)?;
        let outcome = self
            .manager
            .update_workout(&p.event_id, &week, &p.workout_type, &p.workout_id, updates)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    #[tool(
        name = "add_workout",
        description = "Add a workout to a training week and return its generated id"
    )]
    async fn add_workout(
        &self,
        params: Parameters<AddWorkoutParams>,
    ) -> Result<Json<OperationResult>, String> {
        let p = params.0;
        let Some(week) = WeekRef::parse(&p.week_id) else {
            return Ok(missing_week());
        };
        let data = object_or_empty(p.workout)?;
        let outcome = self
            .manager
            .add_workout(&p.event_id, &week, &p.workout_type, data)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    #[tool(
        name = "delete_workout",
        description = "Remove a workout from a training week"
    )]
    async fn delete_workout(
        &self,
        params: Parameters<DeleteWorkoutParams>,
    ) -> Result<Json<OperationResult>, String> {
        let p = params.0;
        let Some(week) = WeekRef::parse(&p.week_id) else {
            return Ok(missing_week());
        };
        let outcome = self
            .manager
            .delete_workout(&p.event_id, &week, &p.workout_type, &p.workout_id)
            .await
            .map_err(McpError::from)?;
        Ok(applied(outcome))
    }

    // === View state ===

    #[tool(
        name = "select_event",
        description = "Select an event, or clear the selection when event_id is omitted"
    )]
    async fn select_event(
        &self,
        params: Parameters<SelectEventParams>,
    ) -> Result<Json<OperationResult>, String> {
        let outcome = self
            .manager
            .select_event(params.0.event_id.as_deref())
            .await;
        Ok(applied(outcome))
    }

    #[tool(
        name = "set_view_mode",
        description = "Switch between the events, training and stats views"
    )]
    async fn set_view_mode(
        &self,
        params: Parameters<ViewModeParams>,
    ) -> Result<Json<OverviewResult>, String> {
        self.manager.set_view_mode(params.0.mode).await;
        self.get_overview().await
    }

    #[tool(
        name = "get_overview",
        description = "Countdown, current week and completion for every event"
    )]
    async fn get_overview(&self) -> Result<Json<OverviewResult>, String> {
        Ok(Json(OverviewResult {
            view_mode: self.manager.view_mode().await,
            selected_event_id: self.manager.selected_event().await.map(|e| e.id),
            events: self.manager.overview().await,
        }))
    }

    #[tool(name = "get_build_info", description = "Build hash and time of this server")]
    async fn get_build_info(&self) -> Result<Json<BuildInfoResult>, String> {
        let info = BuildInfo::current();
        Ok(Json(BuildInfoResult {
            display: info.display(),
            info,
        }))
    }

    // === MCP Prompts ===

    /// Weekly session planning for one event
    #[prompt(
        name = "plan-training-week",
        description = "Plan the sessions of one training week"
    )]
    async fn plan_training_week(
        &self,
        params: Parameters<PlanTrainingWeekParams>,
    ) -> GetPromptResult {
        let p = params.0;
        let event_id = match self.focus_event(p.event_id.clone()).await {
            Some(ev) => ev.id,
            None => p.event_id.unwrap_or_default(),
        };
        let week_id = p.week_id.unwrap_or_else(|| "week-1".to_string());
        let focus = p
            .focus
            .unwrap_or_else(|| "balanced progression".to_string());

        prompts::plan_training_week_prompt(&event_id, &week_id, &focus)
    }

    /// Race-day countdown with training progress
    #[prompt(
        name = "race-countdown",
        description = "Summarize training progress ahead of an event"
    )]
    async fn race_countdown(&self, params: Parameters<RaceCountdownParams>) -> GetPromptResult {
        let Some(event) = self.focus_event(params.0.event_id).await else {
            return prompts::race_countdown_prompt("my next event", "an unknown date", "unknown");
        };
        let countdown = self
            .manager
            .overview()
            .await
            .into_iter()
            .find(|o| o.id == event.id)
            .map(|o| o.countdown)
            .unwrap_or_default();

        prompts::race_countdown_prompt(&event.name, &format_date(&event.date), &countdown)
    }
}

#[tool_handler]
#[prompt_handler(router = self.prompt_router)]
impl rmcp::ServerHandler for FitnessMcpHandler {
    // === Server Info & Capabilities ===
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo::new(
            rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
        )
        .with_instructions(format!(
            "Fitness planner MCP server ({}) - manages target events and their \
             week-by-week training plans.",
            BuildInfo::current().display()
        ))
    }

    // === MCP Resource Implementation ===

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let mut res = RawResource::new(EVENTS_RESOURCE_URI, "Target Events").no_annotation();
        res.description = Some("All target events with their plans".to_string());
        res.mime_type = Some("application/json".to_string());

        Ok(ListResourcesResult {
            resources: vec![res],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        if request.uri != EVENTS_RESOURCE_URI {
            return Err(ErrorData::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ));
        }
        let snapshot = self.manager.snapshot().await;
        let body = serde_json::json!({
            "events": snapshot.events.as_ref(),
            "plans": snapshot.plans.as_ref(),
        });
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

        Ok(ReadResourceResult::new(vec![
            ResourceContents::TextResourceContents {
                uri: request.uri.clone(),
                mime_type: Some("application/json".to_string()),
                text,
                meta: None,
            },
        ]))
    }
}
