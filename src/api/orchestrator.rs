//! Orchestrator API handlers
//!
//! `POST /api/run` waits for the whole run and returns a JSON report.
//! `POST /api/run/stream` streams [`RunEvent`]s as SSE (Server-Sent Events)
//! while the run progresses in a background task, ending with `[DONE]`.

use crate::error::AppError;
use crate::orchestrator::baseline::{run_baseline, BaselineAnswer};
use crate::orchestrator::config::{
    validate_and_apply_config_update, ConfigUpdateRequest, OrchestratorConfig,
};
use crate::orchestrator::events::RunEvent;
use crate::orchestrator::plan_types::{Goal, RunTrace};
use crate::orchestrator::runner::trace_of;
use crate::state::{self, AppState};
use async_stream::stream;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Helper function to format a stream into SSE (Server-Sent Events) format
///
/// Takes a stream of `Result<String, axum::Error>` and converts it to SSE format
/// where each item is formatted as "data: <content>\n\n"
fn format_sse_stream(
    stream: impl futures_util::Stream<Item = Result<String, axum::Error>> + Send + 'static,
) -> impl futures_util::Stream<Item = Result<String, std::io::Error>> {
    stream.map(|event_result| {
        let sse_text = match event_result {
            Ok(data) => format!("data: {}\n\n", data),
            Err(e) => format!("data: [ERROR] {}\n\n", e),
        };
        Ok::<_, std::io::Error>(sse_text)
    })
}

/// Request carrying a goal
#[derive(Deserialize, Debug)]
pub struct GoalRequest {
    /// The goal to answer
    pub goal: String,
}

/// Report of a successful run
#[derive(Serialize, Debug)]
pub struct RunResponse {
    /// Run identifier (usable with `GET /api/runs/:id`)
    pub run_id: Uuid,
    /// Synthesized answer
    pub answer: String,
    /// Generation calls issued
    pub generation_calls: usize,
    /// Total run duration
    pub elapsed_ms: Option<i64>,
    /// Plan and step results
    pub trace: RunTrace,
}

async fn validated_goal(
    state: &Arc<RwLock<AppState>>,
    request: GoalRequest,
) -> Result<Goal, AppError> {
    let state_read = state.read().await;
    state_read
        .config()
        .validate_goal(&request.goal)
        .map_err(AppError::InvalidGoal)?;
    Ok(Goal::new(request.goal))
}

/// POST /api/run - Run the plan-execute-synthesize pipeline
///
/// # Returns
/// * `Ok(Json<RunResponse>)` - Answer plus the full trace
/// * `Err(AppError)` - `InvalidGoal` (400) or `RunFailed` (502, with the partial trace)
pub async fn run(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<GoalRequest>,
) -> Result<Json<RunResponse>, AppError> {
    let goal = validated_goal(&state, request).await?;

    // Build the orchestrator under the read lock, run without holding it
    let orchestrator = state.read().await.orchestrator();
    let result = orchestrator.run_goal(goal).await;

    state::record_run(&state, trace_of(&result).clone()).await;

    let outcome = result?;
    Ok(Json(RunResponse {
        run_id: outcome.trace.run_id,
        answer: outcome.answer.text,
        generation_calls: outcome.trace.generation_calls,
        elapsed_ms: outcome.trace.elapsed_ms(),
        trace: outcome.trace,
    }))
}

/// POST /api/run/stream - Run the pipeline and stream progress events
///
/// Each SSE message is one JSON-encoded [`RunEvent`]. The run continues (and
/// is recorded) even if the client disconnects.
pub async fn run_stream(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<GoalRequest>,
) -> Result<Response, AppError> {
    let goal = validated_goal(&state, request).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();
    let orchestrator = state.read().await.orchestrator().with_events(tx);

    let state_clone = state.clone();
    tokio::spawn(async move {
        let result = orchestrator.run_goal(goal).await;
        state::record_run(&state_clone, trace_of(&result).clone()).await;
        // dropping the orchestrator closes the event channel
    });

    let stream = stream! {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok::<String, axum::Error>(json),
                Err(e) => yield Err(axum::Error::new(e)),
            }
        }
        yield Ok::<String, axum::Error>("[DONE]".to_string());
    };

    // Convert stream to SSE format
    let sse_stream = format_sse_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(sse_stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}

/// POST /api/baseline - Answer the goal with a single call
pub async fn baseline(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<GoalRequest>,
) -> Result<Json<BaselineAnswer>, AppError> {
    let goal = validated_goal(&state, request).await?;

    let (service, settings) = {
        let state_read = state.read().await;
        (state_read.service(), state_read.config().baseline)
    };

    let answer = run_baseline(service.as_ref(), &goal, settings).await?;
    Ok(Json(answer))
}

/// GET /api/runs/:id - Trace of a finished or failed run
pub async fn get_run(
    State(state): State<Arc<RwLock<AppState>>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunTrace>, AppError> {
    let id = Uuid::parse_str(&run_id).map_err(|_| AppError::RunNotFound(run_id.clone()))?;

    let trace = state::find_run(&state, id).await?;
    trace.map(Json).ok_or(AppError::RunNotFound(run_id))
}

/// Known run ids
#[derive(Serialize, Debug)]
pub struct RunListResponse {
    /// Ids of runs held in memory or persisted, sorted
    pub runs: Vec<Uuid>,
}

/// GET /api/runs - Ids of every run whose trace can be fetched
pub async fn list_runs(
    State(state): State<Arc<RwLock<AppState>>>,
) -> Result<Json<RunListResponse>, AppError> {
    let runs = state::list_runs(&state).await?;
    Ok(Json(RunListResponse { runs }))
}

/// GET /api/config - Current orchestrator configuration
pub async fn get_config(
    State(state): State<Arc<RwLock<AppState>>>,
) -> Json<OrchestratorConfig> {
    Json(state.read().await.config().clone())
}

/// POST /api/config - Apply a partial configuration update
///
/// The whole update is validated before anything is applied.
pub async fn update_config(
    State(state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<OrchestratorConfig>, AppError> {
    let mut state_write = state.write().await;
    let updated = validate_and_apply_config_update(state_write.config().clone(), request)?;

    tracing::info!(config = ?updated, "Orchestrator configuration updated");
    state_write.set_config(updated.clone());
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedService;

    fn state_with(service: ScriptedService) -> Arc<RwLock<AppState>> {
        Arc::new(RwLock::new(AppState::new(
            Arc::new(service),
            OrchestratorConfig::default(),
        )))
    }

    #[tokio::test]
    async fn test_run_rejects_long_goal() {
        let service = ScriptedService::new(Vec::new());
        let state = state_with(service);
        let result = run(
            State(state),
            Json(GoalRequest {
                goal: "x".repeat(10001),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::InvalidGoal(_))));
    }

    #[tokio::test]
    async fn test_get_run_unknown_id() {
        let state = state_with(ScriptedService::new(Vec::new()));
        let result = get_run(State(state.clone()), Path("not-a-uuid".to_string())).await;
        assert!(matches!(result, Err(AppError::RunNotFound(_))));

        let result = get_run(State(state), Path(Uuid::new_v4().to_string())).await;
        assert!(matches!(result, Err(AppError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_runs_after_run() {
        let state = state_with(ScriptedService::from_texts(["1. A", "a", "done"]));
        let Json(empty) = list_runs(State(state.clone())).await.unwrap();
        assert!(empty.runs.is_empty());

        let Json(response) = run(
            State(state.clone()),
            Json(GoalRequest {
                goal: "goal".to_string(),
            }),
        )
        .await
        .unwrap();

        let Json(listed) = list_runs(State(state)).await.unwrap();
        assert_eq!(listed.runs, vec![response.run_id]);
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid() {
        let state = state_with(ScriptedService::new(Vec::new()));
        let request: ConfigUpdateRequest =
            serde_json::from_str(r#"{"max_parallel_steps": 0}"#).unwrap();

        let result = update_config(State(state.clone()), Json(request)).await;
        assert!(matches!(result, Err(AppError::InvalidConfig(_))));

        let Json(config) = get_config(State(state)).await;
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[tokio::test]
    async fn test_run_stream_returns_event_stream() {
        let state = state_with(ScriptedService::from_texts(["1. A", "a", "done"]));
        let response = run_stream(
            State(state),
            Json(GoalRequest {
                goal: "goal".to_string(),
            }),
        )
        .await
        .unwrap();

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok());
        assert_eq!(content_type, Some("text/event-stream"));
    }
}
