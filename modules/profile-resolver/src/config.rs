use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ResolverError;

/// Resolver tunables, loadable from TOML. Secrets stay in env vars
/// (see [`AppConfig`]).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub max_concurrency: usize,
    pub fetch_timeout_ms: u64,
    pub search_timeout_ms: u64,
    /// Wall-clock budget for fetch, logo and compare across all candidates.
    pub pipeline_timeout_ms: u64,
    /// Extra attempts after a transient fetch failure.
    pub fetch_retries: u32,
    pub high_confidence_threshold: f64,
    /// Weight of logo similarity when a reference logo is supplied. Must
    /// exceed 0.5 so similarity outweighs classification.
    pub similarity_weight: f64,
    pub neutral_similarity: f64,
    /// Seeds classified as profiles below this confidence still trigger discovery.
    pub discovery_confidence_floor: f64,
    pub max_search_results: u32,
    pub profile_domains: Vec<String>,
    pub max_logo_candidates: usize,
    pub max_content_bytes: usize,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            fetch_timeout_ms: 10_000,
            search_timeout_ms: 15_000,
            pipeline_timeout_ms: 60_000,
            fetch_retries: 1,
            high_confidence_threshold: 0.8,
            similarity_weight: 0.7,
            neutral_similarity: 0.0,
            discovery_confidence_floor: 0.5,
            max_search_results: 5,
            profile_domains: vec![
                "linkedin.com".to_string(),
                "crunchbase.com".to_string(),
                "zoominfo.com".to_string(),
            ],
            max_logo_candidates: 3,
            max_content_bytes: 5 * 1024 * 1024,
            user_agent: concat!("profile-resolver/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |msg: String| -> crate::error::Result<()> { Err(ResolverError::Config(msg)) };

        if self.max_concurrency == 0 {
            return fail("max_concurrency must be at least 1".into());
        }
        for (name, ms) in [
            ("fetch_timeout_ms", self.fetch_timeout_ms),
            ("search_timeout_ms", self.search_timeout_ms),
            ("pipeline_timeout_ms", self.pipeline_timeout_ms),
        ] {
            if ms == 0 {
                return fail(format!("{name} must be positive"));
            }
        }
        for (name, v) in [
            ("high_confidence_threshold", self.high_confidence_threshold),
            ("neutral_similarity", self.neutral_similarity),
            ("discovery_confidence_floor", self.discovery_confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return fail(format!("{name} must be within [0, 1], got {v}"));
            }
        }
        if !(self.similarity_weight > 0.5 && self.similarity_weight <= 1.0) {
            return fail(format!(
                "similarity_weight must be within (0.5, 1], got {}",
                self.similarity_weight
            ));
        }
        if self.max_logo_candidates == 0 {
            return fail("max_logo_candidates must be at least 1".into());
        }
        if self.max_content_bytes == 0 {
            return fail("max_content_bytes must be positive".into());
        }
        Ok(())
    }
}

/// Parse and validate TOML config text. Missing keys take their defaults.
pub fn parse_config(text: &str) -> Result<ResolverConfig> {
    let config: ResolverConfig = toml::from_str(text).context("Failed to parse resolver config")?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<ResolverConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// API credentials from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tavily_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let config = Self {
            tavily_api_key: var("TAVILY_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL"),
            openai_base_url: var("OPENAI_BASE_URL"),
        };
        config.log_keys();
        config
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  TAVILY_API_KEY: {}", preview_opt(&self.tavily_api_key));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!(
            "  OPENAI_MODEL: {}",
            self.openai_model.as_deref().unwrap_or("<default>")
        );
        tracing::info!(
            "  OPENAI_BASE_URL: {}",
            self.openai_base_url.as_deref().unwrap_or("<default>")
        );
    }
}

fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{}...({} chars)", head, val.chars().count())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => preview(v),
        _ => "<not set>".to_string(),
    }
}
