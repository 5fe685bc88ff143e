//! Site configuration management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for sitecms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site selection settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Content store settings.
    #[serde(default)]
    pub content: ContentConfig,

    /// Theme allow-list.
    #[serde(default)]
    pub themes: ThemeConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Static export settings.
    #[serde(default)]
    pub freeze: FreezeConfig,
}

/// Site selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Host name used as the key of the `site` document.
    #[serde(default = "default_host")]
    pub host: String,
}

/// How long a content manager (and its cache) lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerLifetime {
    /// One manager shared by every request for the life of the process.
    #[default]
    Process,
    /// A fresh manager per request, discarded afterwards.
    Request,
}

/// Content store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Root directory holding one folder per content type.
    #[serde(default = "default_content_root")]
    pub root: PathBuf,

    /// Lifetime of the content manager.
    #[serde(default)]
    pub lifetime: ManagerLifetime,

    /// Populate every content type when the shared manager is created.
    #[serde(default = "default_true")]
    pub preload: bool,
}

/// Theme configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Themes a visitor may select.
    #[serde(default = "default_themes")]
    pub allowed: Vec<String>,

    /// Theme used when the session has none.
    #[serde(default = "default_theme")]
    pub default: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_address")]
    pub address: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of template overrides.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Lifetime of the theme cookie in minutes.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: u64,
}

/// Static export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeConfig {
    /// Output directory for the frozen site.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extra routes rendered in addition to the stored pages.
    #[serde(default)]
    pub routes: Vec<String>,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_content_root() -> PathBuf {
    PathBuf::from("contents")
}

fn default_true() -> bool {
    true
}

fn default_themes() -> Vec<String> {
    vec![default_theme()]
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_session_timeout() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: default_content_root(),
            lifetime: ManagerLifetime::default(),
            preload: true,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            allowed: default_themes(),
            default: default_theme(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            templates_dir: default_templates_dir(),
            static_dir: default_static_dir(),
            session_timeout_minutes: default_session_timeout(),
        }
    }
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            routes: Vec::new(),
        }
    }
}

impl ThemeConfig {
    /// Whether `theme` is in the allow-list.
    pub fn is_allowed(&self, theme: &str) -> bool {
        self.allowed.iter().any(|t| t == theme)
    }
}

impl ServerConfig {
    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Cookie lifetime in seconds.
    pub fn session_timeout_secs(&self) -> u64 {
        self.session_timeout_minutes * 60
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration using the config crate, layering `SITECMS__*`
    /// environment variables over the file.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("SITECMS").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.site.host.is_empty() {
            return Err(CoreError::config("site.host cannot be empty"));
        }

        if self.themes.allowed.is_empty() {
            return Err(CoreError::config("themes.allowed cannot be empty"));
        }

        if !self.themes.is_allowed(&self.themes.default) {
            return Err(CoreError::config(format!(
                "themes.default '{}' is not in themes.allowed",
                self.themes.default
            )));
        }

        if self.server.port == 0 {
            return Err(CoreError::config("server.port cannot be 0"));
        }

        if self.server.session_timeout_minutes == 0 {
            return Err(CoreError::config(
                "server.session_timeout_minutes cannot be 0",
            ));
        }

        if self.content.lifetime == ManagerLifetime::Request && self.content.preload {
            tracing::debug!("content.preload has no effect with per-request lifetime");
        }

        Ok(())
    }
}
