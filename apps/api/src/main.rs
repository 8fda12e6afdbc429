mod config;
mod errors;
mod generation;
mod models;
mod normalize;
mod render;
mod routes;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::CvPipeline;
use crate::render::ChromiumEngine;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV API v{}", env!("CARGO_PKG_VERSION"));

    // Rendering engine: one fresh headless browser per request
    let settings = config.pipeline_settings();
    let engine = Arc::new(ChromiumEngine::new(settings.engine.clone()));
    info!(
        "Render engine: chromium ({}), {} retr{}, {}ms timeout",
        settings
            .engine
            .chrome_executable
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "autodetect".to_string()),
        settings.retry.extra_attempts,
        if settings.retry.extra_attempts == 1 { "y" } else { "ies" },
        settings.engine.session_timeout.as_millis()
    );

    // Templates and fonts are compiled/loaded lazily on first request
    let pipeline = CvPipeline::new(&settings, engine);
    info!(
        "Template '{}' from {}",
        config.template_name,
        config.template_dir.display()
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
