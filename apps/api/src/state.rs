use std::sync::Arc;

use crate::config::Config;
use crate::generation::CvPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Read-only after startup; its caches fill themselves on first use.
    pub pipeline: Arc<CvPipeline>,
}
