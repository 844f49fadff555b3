//! Axum Handlers
//!
//! Twilio voice webhooks and the operational health endpoints.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    Form,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tablecall_core::VoiceAction;
use tracing::{error, info, warn};

use crate::{
    models::{
        ConfigStatusResponse, DatabaseStatusResponse, ErrorResponse, HealthResponse,
        VoiceWebhookForm,
    },
    state::AppState,
    twiml::TWIML_CONTENT_TYPE,
};

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn call_id(form: &VoiceWebhookForm) -> Result<&str, ApiError> {
    form.call_sid
        .as_deref()
        .map(str::trim)
        .filter(|sid| !sid.is_empty())
        .ok_or_else(|| ApiError::BadRequest("CallSid is required".to_string()))
}

fn twiml(state: &AppState, action: &VoiceAction) -> Response {
    (
        [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)],
        state.voice.render(action),
    )
        .into_response()
}

/// Inbound call webhook: greets the caller or repeats the current question.
#[utoipa::path(
    post,
    path = "/voice",
    request_body(content = VoiceWebhookForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "TwiML for the current question", body = String, content_type = "text/xml"),
        (status = 400, description = "CallSid missing", body = ErrorResponse)
    )
)]
pub async fn voice(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceWebhookForm>,
) -> Result<Response, ApiError> {
    let call_id = call_id(&form)?;
    info!(call_id, caller = ?form.from, "Inbound call");
    let action = state.engine.begin(call_id).await;
    Ok(twiml(&state, &action))
}

/// Step webhook: consumes one transcribed answer and returns what to do next.
///
/// A request without `SpeechResult` counts as silence.
#[utoipa::path(
    post,
    path = "/voice/step",
    request_body(content = VoiceWebhookForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "TwiML for the next prompt, a transfer or a goodbye", body = String, content_type = "text/xml"),
        (status = 400, description = "CallSid missing", body = ErrorResponse)
    )
)]
pub async fn voice_step(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceWebhookForm>,
) -> Result<Response, ApiError> {
    let call_id = call_id(&form)?;
    let utterance = form.speech_result.as_deref().unwrap_or_default();
    let action = state.engine.handle_utterance(call_id, utterance).await;
    if action.is_terminal() {
        info!(call_id, "Call leaves the questionnaire");
    }
    Ok(twiml(&state, &action))
}

/// Call states after which Twilio sends no further webhooks for the call.
const FINAL_CALL_STATUSES: [&str; 5] = ["completed", "busy", "no-answer", "failed", "canceled"];

/// Status callback: forgets the session of a call that has ended.
///
/// Calls that finished the questionnaire are already gone; this catches callers
/// who hung up halfway.
#[utoipa::path(
    post,
    path = "/voice/status",
    request_body(content = VoiceWebhookForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 204, description = "Status recorded"),
        (status = 400, description = "CallSid missing", body = ErrorResponse)
    )
)]
pub async fn voice_status(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceWebhookForm>,
) -> Result<StatusCode, ApiError> {
    let call_id = call_id(&form)?;
    let status = form.call_status.as_deref().unwrap_or_default().trim();
    if FINAL_CALL_STATUSES.contains(&status) && state.engine.abandon(call_id).await {
        info!(call_id, status, "Dropped session of ended call");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.engine.sessions().len().await,
        checked_at: Utc::now(),
    })
}

/// Reports which collaborators are configured, without revealing any value.
#[utoipa::path(
    get,
    path = "/health/config",
    responses(
        (status = 200, description = "Collaborator configuration flags", body = ConfigStatusResponse)
    )
)]
pub async fn config_status(State(state): State<Arc<AppState>>) -> Json<ConfigStatusResponse> {
    let config = &state.config;
    Json(ConfigStatusResponse {
        calendar: config.calendar_configured(),
        messaging: config.messaging_configured(),
        forwarding: state.engine.policy().transfer_target().is_some(),
        persistence: state.db.is_some(),
        max_retries: state.engine.policy().max_retries,
    })
}

/// Readiness of the booking database.
#[utoipa::path(
    get,
    path = "/health/db",
    responses(
        (status = 200, description = "Database ready, or persistence disabled", body = DatabaseStatusResponse),
        (status = 503, description = "Database unreachable", body = DatabaseStatusResponse)
    )
)]
pub async fn db_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(db) = &state.db else {
        return (
            StatusCode::OK,
            Json(DatabaseStatusResponse {
                status: "disabled".to_string(),
                detail: "DATABASE_URL is not set".to_string(),
            }),
        );
    };
    match db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(DatabaseStatusResponse {
                status: "ready".to_string(),
                detail: "SELECT 1 succeeded".to_string(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DatabaseStatusResponse {
                    status: "degraded".to_string(),
                    detail: e.to_string(),
                }),
            )
        }
    }
}
