//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        GeminiAnalysisAdapter, GeminiChatAdapter, GeminiClient, GeminiImageAdapter,
        GeminiModuleAdapter, GeminiTextStreamAdapter, GeminiTtsAdapter, GeminiVideoAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        analyze_image_handler, analyze_video_handler, create_session_handler,
        delete_session_handler, generate_image_handler, module_handler, require_session,
        rest::ApiDoc,
        speech_handler,
        state::{AppState, SessionRegistry},
        ws_handler,
    },
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use skill_tutor_core::JobPoller;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Uploaded videos for analysis can be large.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// The longest an expired session can linger before it is dropped.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let client = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_base_url.clone())?;

    let module_adapter = Arc::new(GeminiModuleAdapter::new(
        client.clone(),
        config.content_model.clone(),
    ));
    let analysis_adapter = Arc::new(GeminiAnalysisAdapter::new(
        client.clone(),
        config.analysis_model.clone(),
    ));
    let image_adapter = Arc::new(GeminiImageAdapter::new(
        client.clone(),
        config.image_model.clone(),
    ));
    let tts_adapter = Arc::new(GeminiTtsAdapter::new(
        client.clone(),
        config.tts_model.clone(),
        config.tts_voice.clone(),
    ));
    let text_stream_adapter = Arc::new(GeminiTextStreamAdapter::new(
        client.clone(),
        config.fast_text_model.clone(),
    ));
    let chat_adapter = Arc::new(GeminiChatAdapter::new(
        client.clone(),
        config.chat_model.clone(),
    ));
    let video_adapter = Arc::new(GeminiVideoAdapter::new(client, config.video_model.clone()));
    let poller = Arc::new(JobPoller::new(video_adapter, config.poll_settings()));

    // --- 3. Build the Shared AppState ---
    let sessions = Arc::new(SessionRegistry::new(module_adapter, config.session_limits()));
    let sweeper = sessions.clone();
    let sweep_period = config.session_idle_timeout.min(SWEEP_PERIOD);
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(sweep_period);
        loop {
            ticks.tick().await;
            sweeper.sweep_idle().await;
        }
    });

    let app_state = Arc::new(AppState {
        sessions,
        analysis_adapter,
        image_adapter,
        tts_adapter,
        text_stream_adapter,
        chat_adapter,
        poller,
    });

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid ALLOWED_ORIGIN '{}': {}", config.allowed_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no session required)
    let public_routes = Router::new().route("/sessions", post(create_session_handler));

    // Session routes
    let session_routes = Router::new()
        .route("/sessions/current", delete(delete_session_handler))
        .route("/skills/{name}/module", get(module_handler))
        .route("/tools/analyze-image", post(analyze_image_handler))
        .route("/tools/analyze-video", post(analyze_video_handler))
        .route("/tools/generate-image", post(generate_image_handler))
        .route("/tools/speech", post(speech_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
