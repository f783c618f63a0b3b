use crate::error::{Error, Result};
use crate::middleware::builtin::cors::{CorsPolicy, OriginRule};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub static_files: StaticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Allowed origins as written in TOML
///
/// `"*"` allows any origin, a string allows that origin, a list allows its
/// members, `true` mirrors the request origin and `false` allows none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OriginSetting {
    Flag(bool),
    One(String),
    Many(Vec<String>),
}

impl Default for OriginSetting {
    fn default() -> Self {
        OriginSetting::One("*".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub origin: OriginSetting,

    /// Regular expression for allowed origins; takes precedence over `origin`
    #[serde(default)]
    pub origin_pattern: Option<String>,

    #[serde(default = "default_cors_methods")]
    pub methods: Vec<String>,

    #[serde(default)]
    pub allowed_headers: Option<Vec<String>>,

    #[serde(default)]
    pub exposed_headers: Vec<String>,

    #[serde(default)]
    pub credentials: bool,

    #[serde(default)]
    pub max_age: Option<u64>,

    #[serde(default = "default_preflight_continue")]
    pub preflight_continue: bool,

    #[serde(default = "default_success_status")]
    pub success_status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_static_dir")]
    pub directory: String,

    #[serde(default = "default_static_prefix")]
    pub url_prefix: String,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_methods() -> Vec<String> {
    CorsPolicy::default().methods
}
fn default_preflight_continue() -> bool {
    true
}
fn default_success_status() -> u16 {
    204
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_static_dir() -> String {
    "public".to_string()
}
fn default_static_prefix() -> String {
    "/".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            origin: OriginSetting::default(),
            origin_pattern: None,
            methods: default_cors_methods(),
            allowed_headers: None,
            exposed_headers: Vec::new(),
            credentials: false,
            max_age: None,
            preflight_continue: default_preflight_continue(),
            success_status: default_success_status(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_static_dir(),
            url_prefix: default_static_prefix(),
        }
    }
}

impl CorsConfig {
    /// Build the runtime policy described by this section
    pub fn to_policy(&self) -> Result<CorsPolicy> {
        let origin = match (&self.origin_pattern, &self.origin) {
            (Some(pattern), _) => OriginRule::pattern(pattern)?,
            (None, OriginSetting::Flag(true)) => OriginRule::Mirror,
            (None, OriginSetting::Flag(false)) => OriginRule::List(Vec::new()),
            (None, OriginSetting::One(origin)) => OriginRule::from_origin(origin),
            (None, OriginSetting::Many(origins)) => OriginRule::List(origins.clone()),
        };

        let success_status = StatusCode::from_u16(self.success_status).map_err(|_| {
            Error::config(format!(
                "Invalid CORS success_status {}",
                self.success_status
            ))
        })?;

        Ok(CorsPolicy {
            origin,
            methods: self.methods.iter().map(|m| m.to_uppercase()).collect(),
            allowed_headers: self.allowed_headers.clone(),
            exposed_headers: self.exposed_headers.clone(),
            credentials: self.credentials,
            max_age: self.max_age,
            preflight_continue: self.preflight_continue,
            success_status,
        })
    }
}

impl LoggingConfig {
    /// Level for `env_logger`, defaulting to `info` for unknown names
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}. Make sure the file exists and is readable.",
                path_ref.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml(&content).map_err(|e| {
            Error::config(format!("In config file '{}': {}", path_ref.display(), e))
        })?;
        config.apply_env_overrides()?;
        config.validate()?;

        log::debug!(
            "Successfully loaded configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}. Check TOML syntax.", e)))
    }

    /// Create configuration with environment variable overrides
    pub fn from_env() -> Result<Self> {
        let mut config = AppConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HYDROGEN_HOST`, `HYDROGEN_PORT` and `HYDROGEN_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HYDROGEN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("HYDROGEN_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::config(format!("Invalid HYDROGEN_PORT '{}'", port)))?;
        }
        if let Some(level) = lookup("HYDROGEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::config("Server host cannot be empty"));
        }

        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(Error::config(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        if self.cors.enabled {
            self.cors.to_policy()?.validate();
        }

        if self.static_files.enabled && !self.static_files.url_prefix.starts_with('/') {
            return Err(Error::config(format!(
                "Static url_prefix '{}' must start with '/'",
                self.static_files.url_prefix
            )));
        }

        Ok(())
    }

    /// Get server address string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
