//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EML2PDF_CONFIG` (environment variable)
//! 2. `~/.config/eml2pdf/config.toml` (Linux/macOS)
//!    `%APPDATA%\eml2pdf\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override every value read here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where output goes.
    pub output: OutputConfig,
    /// Body rendering.
    pub body: BodyConfig,
    /// Attachment extraction.
    pub attachments: AttachmentsConfig,
    /// External renderer.
    pub renderer: RendererConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Language code ("en", "es"); system locale when unset.
    pub lang: Option<String>,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the document and attachments.
    pub directory: PathBuf,
    /// Replace existing files instead of failing or suffixing.
    pub overwrite: bool,
}

/// Body rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Prepend From / To / Date / Subject.
    pub headers: bool,
    /// Fetch remote images referenced by the body.
    pub remote_images: bool,
    /// Per-image fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Extra image host substrings to drop, on top of the built-in trackers.
    pub image_host_blacklist: Vec<String>,
}

/// Attachment extraction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Prefix names with the current date unless they contain one.
    pub add_prefix_date: bool,
    /// Skip attachments without a declared filename.
    pub ignore_floating: bool,
}

/// Renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Renderer program, resolved on `PATH`.
    pub command: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            lang: None,
            cache_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            headers: false,
            remote_images: true,
            fetch_timeout_secs: 10,
            image_host_blacklist: Vec::new(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: crate::export::render::WKHTMLTOPDF.to_string(),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EML2PDF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("eml2pdf").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eml2pdf")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("eml2pdf.log")
}
