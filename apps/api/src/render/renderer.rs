//! Document Renderer: projection + assets + template -> PDF bytes, with retry.
//!
//! # Retry policy
//! The whole attempt (context merge, markup, engine session) is repeated up to
//! `extra_attempts` more times. A short fixed backoff separates attempts; a lost
//! engine connection gets the longer `connection_backoff` so the dead process can
//! exit before the next launch. Exhaustion collapses every cause into one
//! `GenerationExhausted`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::models::DisplayProjection;
use crate::render::engine::{PdfOptions, RenderEngine};
use crate::render::RenderError;
use crate::templates::{CompiledTemplate, RenderAsset};

/// Context key the template reads embedded assets from.
pub const ASSETS_KEY: &str = "assets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub extra_attempts: u32,
    pub backoff: Duration,
    pub connection_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            extra_attempts: 1,
            backoff: Duration::from_millis(500),
            connection_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, failure: &RenderError) -> Duration {
        if failure.is_connection_dropped() {
            self.connection_backoff
        } else {
            self.backoff
        }
    }
}

/// Successful render plus the failures absorbed on the way.
#[derive(Debug)]
pub struct RenderReport {
    pub bytes: Vec<u8>,
    pub attempts: u32,
    pub failures: Vec<RenderError>,
}

pub struct DocumentRenderer {
    engine: Arc<dyn RenderEngine>,
    retry: RetryPolicy,
    pdf: PdfOptions,
}

impl DocumentRenderer {
    pub fn new(engine: Arc<dyn RenderEngine>, retry: RetryPolicy) -> Self {
        Self {
            engine,
            retry,
            pdf: PdfOptions::a4(),
        }
    }

    /// Renders one document. Fails only with `GenerationExhausted`.
    pub async fn render(
        &self,
        projection: &DisplayProjection,
        assets: &BTreeMap<String, Arc<RenderAsset>>,
        template: &CompiledTemplate,
    ) -> Result<RenderReport, RenderError> {
        let total = self.retry.extra_attempts + 1;
        let mut failures = Vec::new();

        for attempt in 1..=total {
            match self.attempt(projection, assets, template).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        info!("Render succeeded on attempt {}/{}", attempt, total);
                    }
                    return Ok(RenderReport {
                        bytes,
                        attempts: attempt,
                        failures,
                    });
                }
                Err(e) => {
                    warn!("Render attempt {}/{} failed: {}", attempt, total, e);
                    let delay = self.retry.delay_after(&e);
                    failures.push(e);
                    if attempt < total {
                        debug!("Retrying render in {}ms", delay.as_millis());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(RenderError::GenerationExhausted {
            attempts: total,
            causes: failures,
        })
    }

    async fn attempt(
        &self,
        projection: &DisplayProjection,
        assets: &BTreeMap<String, Arc<RenderAsset>>,
        template: &CompiledTemplate,
    ) -> Result<Vec<u8>, RenderError> {
        let context = render_context(projection, assets)?;
        let html = template.render(&context)?;
        let bytes = self.engine.print_pdf(&html, &self.pdf).await?;
        if bytes.is_empty() {
            return Err(RenderError::Surface(
                "engine exported an empty document".to_string(),
            ));
        }
        Ok(bytes)
    }
}

/// Merges the projection with the asset map under [`ASSETS_KEY`].
pub fn render_context(
    projection: &DisplayProjection,
    assets: &BTreeMap<String, Arc<RenderAsset>>,
) -> Result<Value, RenderError> {
    let mut context = match serde_json::to_value(projection) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(RenderError::Markup(format!(
                "projection is not an object: {other}"
            )))
        }
        Err(e) => return Err(RenderError::Markup(e.to_string())),
    };

    let mut asset_map = Map::new();
    for (key, asset) in assets {
        let value =
            serde_json::to_value(asset.as_ref()).map_err(|e| RenderError::Markup(e.to_string()))?;
        asset_map.insert(key.clone(), value);
    }
    context.insert(ASSETS_KEY.to_string(), Value::Object(asset_map));

    Ok(Value::Object(context))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
