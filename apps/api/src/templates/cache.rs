//! Compiled template cache.
//!
//! A template is read and compiled on first request for its name, then served
//! from memory for the rest of the process lifetime. Compile failures are not
//! cached, so fixing the file on disk is enough to recover.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use handlebars::Handlebars;
use serde_json::Value;
use tracing::info;

use crate::render::RenderError;
use crate::templates::assets::{AssetStore, RenderAsset};
use crate::templates::helpers::register_helpers;
use crate::templates::once_map::OnceMap;

pub const TEMPLATE_EXTENSION: &str = "hbs";

/// A compiled template with the CV helpers registered alongside it.
pub struct CompiledTemplate {
    name: String,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CompiledTemplate {
    pub fn compile(name: &str, source: &str) -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        register_helpers(&mut registry);
        registry
            .register_template_string(name, source)
            .map_err(|e| RenderError::TemplateLoad {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            registry,
        })
    }

    /// Produces markup from a merged render context.
    pub fn render(&self, context: &Value) -> Result<String, RenderError> {
        self.registry
            .render(&self.name, context)
            .map_err(|e| RenderError::Markup(e.to_string()))
    }
}

#[derive(Debug)]
pub struct TemplateCache {
    dir: PathBuf,
    templates: OnceMap<CompiledTemplate>,
    assets: AssetStore,
}

impl TemplateCache {
    pub fn new(dir: impl Into<PathBuf>, assets: AssetStore) -> Self {
        Self {
            dir: dir.into(),
            templates: OnceMap::new(),
            assets,
        }
    }

    pub fn template_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{TEMPLATE_EXTENSION}"))
    }

    /// Lookup-or-compile. Only the first successful call for a name touches disk.
    pub async fn get_template(&self, name: &str) -> Result<Arc<CompiledTemplate>, RenderError> {
        self.templates
            .get_or_try_init(name, || load_template(name, self.template_path(name)))
            .await
    }

    pub async fn get_assets(&self) -> BTreeMap<String, Arc<RenderAsset>> {
        self.assets.assets().await
    }
}

async fn load_template(name: &str, path: PathBuf) -> Result<CompiledTemplate, RenderError> {
    let source = read_source(name, &path).await?;
    let compiled = CompiledTemplate::compile(name, &source)?;
    info!("Compiled template '{}' from {}", name, path.display());
    Ok(compiled)
}

async fn read_source(name: &str, path: &Path) -> Result<String, RenderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RenderError::TemplateLoad {
            name: name.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
}
