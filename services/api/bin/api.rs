//! Main Entrypoint for the TableCall API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Connecting to the booking database and running migrations, when configured.
//! 3. Building the calendar and messaging clients, the dialogue engine and the session sweep.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use chrono::TimeDelta;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tablecall_api::{
    config::Config, db::Db, router::create_router, state::AppState, twiml::VoiceResponseBuilder,
};
use tablecall_core::{
    calendar::{GoogleCalendarClient, GoogleCalendarSettings},
    completion::{CompletionPipeline, CompletionSettings},
    dialogue::{DialogueEngine, DialoguePolicy},
    messaging::{TwilioMessagingClient, TwilioSettings},
    session::SessionStore,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let db = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("Failed to connect to database")?;
            let db = Arc::new(Db::new(pool));
            db.run_migrations().await?;
            info!("Database connection established and migrations are up-to-date.");
            Some(db)
        }
        None => {
            warn!("DATABASE_URL not set; bookings are kept in the calendar only.");
            None
        }
    };

    // --- 4. Initialize Collaborators and the Dialogue Engine ---
    if !config.calendar_configured() {
        warn!("Google Calendar is not fully configured; completed calls will fail to book.");
    }
    if !config.messaging_configured() {
        warn!("Twilio messaging is not fully configured; confirmations will not be sent.");
    }

    let calendar = GoogleCalendarClient::new(GoogleCalendarSettings {
        calendar_id: config.google_calendar_id.clone(),
        access_token: config.google_calendar_token.clone(),
        time_zone: config.calendar_timezone.name().to_string(),
    })
    .context("Failed to build calendar client")?;
    let messaging = TwilioMessagingClient::new(TwilioSettings {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        from_number: config.twilio_from_number.clone(),
    })
    .context("Failed to build messaging client")?;

    let mut pipeline = CompletionPipeline::new(
        Arc::new(calendar),
        Arc::new(messaging),
        CompletionSettings {
            event_duration_minutes: config.event_duration_minutes,
            restaurant_name: config.restaurant_name.clone(),
        },
    );
    if let Some(db) = &db {
        pipeline = pipeline.with_repository(db.clone());
    }

    let policy = DialoguePolicy {
        max_retries: config.max_retries,
        forwarding_enabled: config.forwarding_enabled,
        forward_target: config.forward_number.clone(),
    };
    if config.forwarding_enabled && !config.forwarding_configured() {
        warn!("FORWARDING_ENABLED is set without FORWARD_NUMBER; callers will get an apology instead.");
    }
    let engine = Arc::new(
        DialogueEngine::new(Arc::new(SessionStore::new()), Arc::new(pipeline), policy)
            .with_time_zone(config.calendar_timezone),
    );

    // Sessions of callers who hung up without a status callback reaching us.
    let sessions = engine.sessions().clone();
    let session_ttl = TimeDelta::minutes(config.session_ttl_minutes);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_older_than(session_ttl).await;
            if evicted > 0 {
                info!(evicted, "Swept stale call sessions");
            }
        }
    });

    let app_state = Arc::new(AppState {
        engine,
        db,
        voice: VoiceResponseBuilder::new(&config.public_base_url, &config.voice_language),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        restaurant = %config.restaurant_name,
        public_base_url = %config.public_base_url,
        max_retries = config.max_retries,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
