//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the Twilio webhooks, health probes and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ConfigStatusResponse, DatabaseStatusResponse, ErrorResponse, HealthResponse,
        VoiceWebhookForm,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::voice,
        handlers::voice_step,
        handlers::voice_status,
        handlers::health,
        handlers::config_status,
        handlers::db_status,
    ),
    components(
        schemas(VoiceWebhookForm, ErrorResponse, HealthResponse, ConfigStatusResponse, DatabaseStatusResponse)
    ),
    tags(
        (name = "TableCall API", description = "Phone reservation line webhooks and health probes")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/voice", post(handlers::voice))
        .route("/voice/step", post(handlers::voice_step))
        .route("/voice/status", post(handlers::voice_status))
        .route("/health", get(handlers::health))
        .route("/health/config", get(handlers::config_status))
        .route("/health/db", get(handlers::db_status))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
