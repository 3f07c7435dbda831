//! Application configuration for sourcemill.
//!
//! User config lives at `~/.sourcemill/sourcemill.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SourcemillError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sourcemill.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sourcemill";

// ---------------------------------------------------------------------------
// Config structs (matching sourcemill.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline scheduling limits.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Crawl policies.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Maximum jobs running concurrently (worker pool size).
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,

    /// Maximum concurrent outbound fetches across all crawl jobs.
    #[serde(default = "default_max_fetch_concurrency")]
    pub max_fetch_concurrency: u32,

    /// Whole-request timeout; on expiry, partial results are returned.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_fetch_concurrency: default_max_fetch_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_concurrent_jobs() -> u32 {
    4
}
fn default_max_fetch_concurrency() -> u32 {
    8
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Seed handling: "crawl" (frontier only), "feed-first", or "auto".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Maximum queued-but-unfetched URLs per crawl job.
    #[serde(default = "default_frontier_cap")]
    pub frontier_cap: usize,

    /// Minimum ms between fetches within one crawl job.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            frontier_cap: default_frontier_cap(),
            rate_limit_ms: default_rate_limit(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_mode() -> String {
    "crawl".into()
}
fn default_frontier_cap() -> usize {
    512
}
fn default_rate_limit() -> u64 {
    200
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum multipart body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration handed to each crawl job.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Seed handling mode: "crawl", "feed-first", or "auto".
    pub mode: String,
    /// Maximum queued-but-unfetched URLs per job.
    pub frontier_cap: usize,
    /// Minimum ms between fetches within one job.
    pub rate_limit_ms: u64,
    /// Per-fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Allow localhost/private-IP seeds. Not a file setting; enabled for
    /// integration tests and local development against mock servers.
    pub allow_private_hosts: bool,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            mode: config.crawl.mode.clone(),
            frontier_cap: config.crawl.frontier_cap,
            rate_limit_ms: config.crawl.rate_limit_ms,
            fetch_timeout_secs: config.crawl.fetch_timeout_secs,
            allow_private_hosts: false,
        }
    }
}

/// Runtime pipeline configuration for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker pool size (bounds concurrent jobs, not request size).
    pub max_concurrent_jobs: u32,
    /// Cap on concurrent outbound fetches across all crawl jobs.
    pub max_fetch_concurrency: u32,
    /// Whole-request timeout.
    pub request_timeout_secs: u64,
    /// Crawl settings for jobs spawned by this pipeline.
    pub crawl: CrawlConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrent_jobs: config.pipeline.max_concurrent_jobs,
            max_fetch_concurrency: config.pipeline.max_fetch_concurrency,
            request_timeout_secs: config.pipeline.request_timeout_secs,
            crawl: CrawlConfig::from(config),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sourcemill/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SourcemillError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sourcemill/sourcemill.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SourcemillError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SourcemillError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SourcemillError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SourcemillError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SourcemillError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_concurrent_jobs"));
        assert!(toml_str.contains("frontier_cap"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.max_concurrent_jobs, 4);
        assert_eq!(parsed.crawl.mode, "crawl");
        assert_eq!(parsed.server.port, 8080);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[pipeline]
max_concurrent_jobs = 2

[crawl]
rate_limit_ms = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.max_concurrent_jobs, 2);
        assert_eq!(config.pipeline.request_timeout_secs, 120);
        assert_eq!(config.crawl.rate_limit_ms, 0);
        assert_eq!(config.crawl.frontier_cap, 512);
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.max_concurrent_jobs, 4);
        assert_eq!(pipeline.max_fetch_concurrency, 8);
        assert_eq!(pipeline.crawl.fetch_timeout_secs, 30);
    }
}
