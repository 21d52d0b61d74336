use anyhow::Result;
use axum::{http::StatusCode, response::Html, routing::get, Router};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exam_grader::{
    api::{create_router, AppState},
    config::Config,
    exam_service::ExamService,
    gemini::GeminiClient,
    generation_cache::GenerationCache,
    session::ExamSession,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize comprehensive logging with file output
    let _guard = setup_logging()?;

    info!("Starting exam grader server...");

    // A credential/configuration failure here is fatal: the server must not
    // come up without a usable API key.
    let config = Config::from_env()?;
    config.validate()?;

    let model = GeminiClient::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    );
    info!(model = model_label(&config), "Initialized remote model client");

    let exam_service = ExamService::new(Arc::new(model), config.exam.num_questions)
        .with_cache(GenerationCache::new(32, config.exam.cache_ttl_minutes));

    // Create application state: one in-memory session, reset on each
    // successful generation.
    let state = AppState {
        exam_service,
        session: Arc::new(Mutex::new(ExamSession::new())),
    };

    // Build the application router
    let app = Router::new()
        // Serve static files
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/styles.css", get(serve_css))
        .route("/app.js", get(serve_js))
        // API routes
        .merge(create_router(state))
        // CORS middleware
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn model_label(config: &Config) -> String {
    config
        .llm
        .model
        .clone()
        .unwrap_or_else(|| "gemini-2.5-flash".to_string())
}

async fn serve_index() -> Result<Html<String>, StatusCode> {
    match fs::read_to_string("static/index.html").await {
        Ok(content) => Ok(Html(content)),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_css() -> Result<(StatusCode, [(&'static str, &'static str); 1], String), StatusCode> {
    match fs::read_to_string("static/styles.css").await {
        Ok(content) => Ok((StatusCode::OK, [("content-type", "text/css")], content)),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_js() -> Result<(StatusCode, [(&'static str, &'static str); 1], String), StatusCode> {
    match fs::read_to_string("static/app.js").await {
        Ok(content) => Ok((
            StatusCode::OK,
            [("content-type", "application/javascript")],
            content,
        )),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

fn setup_logging() -> Result<WorkerGuard> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create logs directory if it doesn't exist
    fs::create_dir_all("logs").unwrap_or_else(|e| {
        eprintln!("Warning: Could not create logs directory: {}", e);
    });

    // Configure log level from environment variable
    let default_log_level = "info,exam_grader=debug";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_level));

    // Set up file appender with daily rotation
    let file_appender = tracing_appender::rolling::daily("logs", "exam-grader.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // Configure console output
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    // Configure file output (no ANSI colors for files)
    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    // Initialize subscriber with both console and file outputs
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized - writing to logs/exam-grader.log with daily rotation");

    Ok(guard)
}
