//! Embedded binary assets (fonts) inlined into rendered markup as base64.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::{info, warn};

use crate::render::RenderError;
use crate::templates::once_map::OnceMap;

/// Fonts the default template references, as (context key, file name).
pub const DEFAULT_FONTS: [(&str, &str); 2] = [
    ("fontRegular", "Inter-Regular.ttf"),
    ("fontBold", "Inter-Bold.ttf"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetEncoding {
    Base64,
}

/// A named binary payload ready for a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderAsset {
    pub mime: String,
    pub encoding: AssetEncoding,
    pub data: String,
}

impl RenderAsset {
    pub fn empty(mime: &str) -> Self {
        Self {
            mime: mime.to_string(),
            encoding: AssetEncoding::Base64,
            data: String::new(),
        }
    }
}

/// Where an asset lives and the key templates read it under.
#[derive(Debug, Clone)]
pub struct AssetSpec {
    pub key: String,
    pub path: PathBuf,
    pub mime: String,
}

impl AssetSpec {
    pub fn font(key: &str, path: PathBuf) -> Self {
        Self {
            key: key.to_string(),
            path,
            mime: "font/ttf".to_string(),
        }
    }
}

/// Read-once store keyed by file path. An unreadable file degrades to an empty
/// payload, which is kept like any other so the failure is logged once.
#[derive(Debug)]
pub struct AssetStore {
    specs: Vec<AssetSpec>,
    loaded: OnceMap<RenderAsset>,
}

impl AssetStore {
    pub fn new(specs: Vec<AssetSpec>) -> Self {
        Self {
            specs,
            loaded: OnceMap::new(),
        }
    }

    /// The default font set under `dir`.
    pub fn default_fonts(dir: &Path) -> Self {
        Self::new(
            DEFAULT_FONTS
                .iter()
                .map(|(key, file)| AssetSpec::font(key, dir.join(file)))
                .collect(),
        )
    }

    /// All configured assets by context key.
    pub async fn assets(&self) -> BTreeMap<String, Arc<RenderAsset>> {
        let mut out = BTreeMap::new();
        for spec in &self.specs {
            out.insert(spec.key.clone(), self.load(spec).await);
        }
        out
    }

    async fn load(&self, spec: &AssetSpec) -> Arc<RenderAsset> {
        let key = spec.path.to_string_lossy();
        self.loaded
            .get_or_init(&key, || async {
                match tokio::fs::read(&spec.path).await {
                    Ok(bytes) => {
                        info!("Loaded asset {} ({} bytes)", key, bytes.len());
                        RenderAsset {
                            mime: spec.mime.clone(),
                            encoding: AssetEncoding::Base64,
                            data: STANDARD.encode(bytes),
                        }
                    }
                    Err(e) => {
                        let err = RenderError::AssetLoad {
                            path: key.to_string(),
                            reason: e.to_string(),
                        };
                        warn!("{err}; rendering without it");
                        RenderAsset::empty(&spec.mime)
                    }
                }
            })
            .await
    }
}
