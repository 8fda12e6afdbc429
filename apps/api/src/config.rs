use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::generation::PipelineSettings;
use crate::render::{EngineSettings, RetryPolicy};

/// Application configuration loaded from environment variables.
/// Every key has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub template_name: String,
    pub template_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub render_timeout: Duration,
    pub page_timeout: Duration,
    /// Attempts after the first one.
    pub render_retries: u32,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let template_dir = PathBuf::from("templates");
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            template_name: "cv".to_string(),
            asset_dir: template_dir.join("fonts"),
            template_dir,
            render_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(5),
            render_retries: 1,
            chrome_executable: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let template_dir = optional_env("TEMPLATE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.template_dir);

        Ok(Config {
            port: parse_env("PORT", defaults.port)?,
            rust_log: optional_env("RUST_LOG").unwrap_or(defaults.rust_log),
            template_name: optional_env("TEMPLATE_NAME").unwrap_or(defaults.template_name),
            asset_dir: optional_env("ASSET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| template_dir.join("fonts")),
            template_dir,
            render_timeout: Duration::from_millis(parse_env("RENDER_TIMEOUT_MS", 30_000u64)?),
            page_timeout: Duration::from_millis(parse_env("PAGE_TIMEOUT_MS", 5_000u64)?),
            render_retries: parse_env("RENDER_RETRIES", defaults.render_retries)?,
            chrome_executable: optional_env("CHROME_EXECUTABLE").map(PathBuf::from),
        })
    }

    /// The slice of configuration the generation pipeline consumes.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            template_name: self.template_name.clone(),
            template_dir: self.template_dir.clone(),
            asset_dir: self.asset_dir.clone(),
            retry: RetryPolicy {
                extra_attempts: self.render_retries,
                ..RetryPolicy::default()
            },
            engine: EngineSettings {
                chrome_executable: self.chrome_executable.clone(),
                page_timeout: self.page_timeout,
                session_timeout: self.render_timeout,
                ..EngineSettings::default()
            },
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_settings_carry_render_config() {
        let config = Config {
            render_retries: 3,
            render_timeout: Duration::from_secs(12),
            page_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let settings = config.pipeline_settings();
        assert_eq!(settings.retry.extra_attempts, 3);
        assert_eq!(settings.engine.session_timeout, Duration::from_secs(12));
        assert_eq!(settings.engine.page_timeout, Duration::from_secs(2));
        assert_eq!(settings.template_name, "cv");
        assert_eq!(settings.asset_dir, PathBuf::from("templates/fonts"));
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("CV_API_TEST_RETRIES", "many");
        assert!(parse_env::<u32>("CV_API_TEST_RETRIES", 1).is_err());
        std::env::remove_var("CV_API_TEST_RETRIES");
        assert_eq!(parse_env::<u32>("CV_API_TEST_RETRIES", 1).unwrap(), 1);
    }
}
