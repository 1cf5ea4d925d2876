//! `POST /api/orchestrate`: one game-master turn over HTTP.
//!
//! Request body:
//!
//! ```json
//! {"user_input": "I open the door", "conversation_history": [...], "user_guid": "..."}
//! ```
//!
//! Response body:
//!
//! ```json
//! {"assistant_response": "...", "game_data": "{...}", "agent_logs": "...", "user_guid": "..."}
//! ```

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use questweaver_agent::TurnRequest;

use crate::SharedState;

#[derive(Debug, Serialize, Deserialize)]
pub struct OrchestrateResponse {
    pub assistant_response: String,
    /// Serialized JSON
    pub game_data: String,
    /// Newline-joined agent logs
    pub agent_logs: String,
    pub user_guid: String,
}

/// Boundary failures. Everything past validation is a 200 unless the turn
/// task itself dies.
#[derive(Debug, PartialEq, Eq)]
pub enum OrchestrateError {
    InvalidJson,
    MissingPayload,
    EmptyInput,
    Internal(String),
}

impl IntoResponse for OrchestrateError {
    fn into_response(self) -> Response {
        match self {
            OrchestrateError::InvalidJson => {
                (StatusCode::BAD_REQUEST, "Invalid JSON in request body").into_response()
            }
            OrchestrateError::MissingPayload => {
                (StatusCode::BAD_REQUEST, "Missing JSON payload in request body").into_response()
            }
            OrchestrateError::EmptyInput => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Missing or empty user_input in JSON payload"})),
            )
                .into_response(),
            OrchestrateError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error", "details": details})),
            )
                .into_response(),
        }
    }
}

pub async fn orchestrate_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<OrchestrateResponse>, OrchestrateError> {
    let request = parse_request(&body)?;
    info!(
        input_len = request.user_input.len(),
        history = request.conversation_history.len(),
        explicit_guid = request.user_guid.is_some(),
        "Orchestrate request"
    );

    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::spawn(async move { orchestrator.respond(request).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Turn task failed");
            OrchestrateError::Internal(e.to_string())
        })?;

    let agent_logs = outcome.result.agent_logs_joined();
    Ok(Json(OrchestrateResponse {
        assistant_response: outcome.result.narrative,
        game_data: outcome.result.game_data,
        agent_logs,
        user_guid: outcome.user_guid.to_string(),
    }))
}

/// Validate the body and pull out the turn fields.
///
/// `user_input` may be any JSON value (non-strings are used as their JSON
/// text); a history that is not an array is ignored.
pub fn parse_request(body: &[u8]) -> Result<TurnRequest, OrchestrateError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(OrchestrateError::MissingPayload);
    }

    let payload: Value = serde_json::from_slice(body).map_err(|_| OrchestrateError::InvalidJson)?;
    let map = match payload {
        Value::Object(map) if !map.is_empty() => map,
        _ => return Err(OrchestrateError::MissingPayload),
    };

    let user_input = match map.get("user_input") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    if user_input.trim().is_empty() {
        return Err(OrchestrateError::EmptyInput);
    }

    let conversation_history = match map.get("conversation_history") {
        Some(Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    };

    let user_guid = map
        .get("user_guid")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    Ok(TurnRequest {
        user_input,
        conversation_history,
        user_guid,
    })
}
