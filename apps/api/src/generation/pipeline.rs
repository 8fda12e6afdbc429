//! CV generation pipeline.
//!
//! Flow: normalize -> template lookup -> asset lookup -> render (with retry).
//!
//! Callers only ever see `AppError::GenerationFailed`; template and render
//! causes are logged here for operators and stop at this boundary.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{DisplayProjection, RawRecord};
use crate::normalize::normalize;
use crate::render::{DocumentRenderer, EngineSettings, RenderEngine, RenderError, RetryPolicy};
use crate::templates::{AssetStore, TemplateCache};

/// Everything the pipeline needs from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub template_name: String,
    pub template_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub retry: RetryPolicy,
    pub engine: EngineSettings,
}

pub struct CvPipeline {
    template_name: String,
    cache: TemplateCache,
    renderer: DocumentRenderer,
}

impl CvPipeline {
    pub fn new(settings: &PipelineSettings, engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            template_name: settings.template_name.clone(),
            cache: TemplateCache::new(
                settings.template_dir.clone(),
                AssetStore::default_fonts(&settings.asset_dir),
            ),
            renderer: DocumentRenderer::new(engine, settings.retry.clone()),
        }
    }

    /// Normalization only; no template or engine involvement.
    pub fn preview(&self, record: &RawRecord) -> DisplayProjection {
        normalize(record)
    }

    /// Produces the finished PDF for one record.
    pub async fn generate(&self, record: &RawRecord) -> Result<Vec<u8>, AppError> {
        let projection = normalize(record);
        info!(
            "Normalized {} raw field(s) into {} display field(s)",
            record.len(),
            projection.len()
        );

        let template = self
            .cache
            .get_template(&self.template_name)
            .await
            .map_err(|e| {
                error!("Template unavailable: {e}");
                AppError::GenerationFailed
            })?;

        let assets = self.cache.get_assets().await;

        match self.renderer.render(&projection, &assets, &template).await {
            Ok(report) => {
                info!(
                    "Rendered CV: {} bytes in {} attempt(s), {} failure(s) absorbed",
                    report.bytes.len(),
                    report.attempts,
                    report.failures.len()
                );
                Ok(report.bytes)
            }
            Err(e) => {
                log_exhaustion(&e);
                Err(AppError::GenerationFailed)
            }
        }
    }
}

fn log_exhaustion(err: &RenderError) {
    match err {
        RenderError::GenerationExhausted { attempts, causes } => {
            error!("{err}");
            for (i, cause) in causes.iter().enumerate() {
                error!("  attempt {}/{}: {}", i + 1, attempts, cause);
            }
        }
        other => error!("Render failed: {other}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::render::engine::PdfOptions;

    /// Fails the first `failures` calls, then returns the markup as bytes.
    pub(crate) struct FlakyEngine {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyEngine {
        pub(crate) fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RenderEngine for FlakyEngine {
        async fn print_pdf(&self, html: &str, _options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(RenderError::Surface(format!("failure #{}", call + 1)))
            } else {
                Ok(html.as_bytes().to_vec())
            }
        }
    }

    pub(crate) fn settings(dir: &std::path::Path, extra_attempts: u32) -> PipelineSettings {
        PipelineSettings {
            template_name: "cv".to_string(),
            template_dir: dir.to_path_buf(),
            asset_dir: dir.join("fonts"),
            retry: RetryPolicy {
                extra_attempts,
                backoff: Duration::ZERO,
                connection_backoff: Duration::ZERO,
            },
            engine: EngineSettings::default(),
        }
    }

    fn record() -> RawRecord {
        RawRecord::from_pairs([
            ("name", "Thandi Mokoena"),
            ("phone", "0821234567"),
            ("skills", "Excel, Typing"),
            ("jobTitle1", "Cashier"),
            ("tertiaryEducation", "BCom\nUJ\n2019"),
        ])
    }

    #[tokio::test]
    async fn test_generate_renders_normalized_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cv.hbs"),
            "{{name}}|{{phone}}|{{contentMode}}|{{#if phoneCentered}}centered{{/if}}",
        )
        .unwrap();
        let engine = FlakyEngine::new(0);
        let pipeline = CvPipeline::new(&settings(dir.path(), 1), engine.clone());

        let bytes = pipeline.generate(&record()).await.unwrap();

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Thandi Mokoena|+27821234567|standard|centered"
        );
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_with_real_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cv.hbs"),
            include_str!("../../templates/cv.hbs"),
        )
        .unwrap();
        let pipeline = CvPipeline::new(&settings(dir.path(), 0), FlakyEngine::new(0));

        let html = String::from_utf8(pipeline.generate(&record()).await.unwrap()).unwrap();

        assert!(html.contains("<h1>Thandi Mokoena</h1>"));
        assert!(html.contains(r#"<div class="job-title">Cashier</div>"#));
        assert!(html.contains(r#"<div class="entry-title">BCom</div>"#));
        assert!(html.contains("contact centered"));
        assert!(!html.contains("References"));
        assert!(!html.contains("@font-face"));
    }

    #[tokio::test]
    async fn test_missing_template_is_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FlakyEngine::new(0);
        let pipeline = CvPipeline::new(&settings(dir.path(), 1), engine.clone());

        let err = pipeline.generate(&record()).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_collapses_to_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cv.hbs"), "{{name}}").unwrap();
        let engine = FlakyEngine::new(usize::MAX);
        let pipeline = CvPipeline::new(&settings(dir.path(), 2), engine.clone());

        let err = pipeline.generate(&record()).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed));
        assert_eq!(engine.calls(), 3);
    }

    #[test]
    fn test_preview_is_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CvPipeline::new(&settings(dir.path(), 0), FlakyEngine::new(0));
        assert_eq!(pipeline.preview(&record()), normalize(&record()));
    }
}
