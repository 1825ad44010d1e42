//! Configuration loading and constants.
//!
//! Loads application configuration from a TOML file, applies environment
//! overrides for the downstream service URLs and timeouts, and validates the
//! result. `AppConfig` is the root configuration struct; it is built once at
//! startup and shared read-only with every handler.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use const_format::formatcp;
use reqwest::Url;
use serde::{Deserialize, Serialize};

// =============================================================================
// HTTP Response Cache Control
// =============================================================================

/// Dashboard page - static shell, data is fetched by the browser
pub const HTTP_CACHE_DASHBOARD_MAX_AGE: u32 = 60;

/// Static assets (CSS, JS)
pub const HTTP_CACHE_STATIC_MAX_AGE: u32 = 3600;

pub const CACHE_CONTROL_DASHBOARD: &str =
    formatcp!("public, max-age={}", HTTP_CACHE_DASHBOARD_MAX_AGE);

pub const CACHE_CONTROL_STATIC: &str = formatcp!("public, max-age={}", HTTP_CACHE_STATIC_MAX_AGE);

/// API responses reflect live downstream state and must never be cached
pub const CACHE_CONTROL_API: &str = "no-store";

// =============================================================================
// Downstream Defaults
// =============================================================================

/// Per-request timeout for downstream calls when none is configured
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound accepted for any configured timeout (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Path probed on each service for health checks
pub const HEALTH_PATH: &str = "/health";

// =============================================================================
// Environment Overrides
// =============================================================================

pub const ENV_SERVICE1_URL: &str = "SERVICE1_URL";
pub const ENV_SERVICE2_URL: &str = "SERVICE2_URL";
pub const ENV_SERVICE_TIMEOUT: &str = "SERVICE_TIMEOUT";
pub const ENV_RUN_TIMEOUT: &str = "RUN_TIMEOUT";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default directory containing `dashboard.html`
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// Default directory for static files
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "switchyard=debug,tower_http=debug";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Downstream service locations and request timeout
    #[serde(default)]
    pub services: ServicesConfig,
    /// Settings for a whole test run
    #[serde(default)]
    pub run: RunConfig,
    /// Ordered check definitions. Empty means "use the default set".
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckConfig>,
    #[serde(default)]
    pub ui: UiConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8002
    }
}

/// Locations of the two downstream services.
///
/// URLs are optional at parse time so the environment can supply them;
/// `AppConfig::validate` rejects a config where either is still missing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    /// Base URL of the users service
    pub service_1_url: Option<String>,
    /// Base URL of the analytics service
    pub service_2_url: Option<String>,
    #[serde(default = "ServicesConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            service_1_url: None,
            service_2_url: None,
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

impl ServicesConfig {
    fn default_request_timeout() -> u64 {
        DEFAULT_REQUEST_TIMEOUT_SECS
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Base URL of the given service, parsed. Only valid after validation.
    pub fn base_url(&self, service: ServiceId) -> Result<Url, ConfigError> {
        let raw = match service {
            ServiceId::Users => self.service_1_url.as_deref(),
            ServiceId::Analytics => self.service_2_url.as_deref(),
        };
        let raw = raw.ok_or_else(|| {
            ConfigError::Validation(format!(
                "No base URL configured for the {} service (set services.{} or {})",
                service,
                service.config_key(),
                service.env_var()
            ))
        })?;
        parse_base_url(raw).map_err(|e| {
            ConfigError::Validation(format!("Invalid URL for the {} service '{}': {}", service, raw, e))
        })
    }
}

/// Run-wide settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    /// Global bound on a whole test run. Checks still in flight when it
    /// elapses are recorded as TIMEOUT.
    pub timeout_seconds: Option<u64>,
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// Identifies one of the two downstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    /// Service 1
    Users,
    /// Service 2
    Analytics,
}

impl ServiceId {
    pub const ALL: [ServiceId; 2] = [ServiceId::Users, ServiceId::Analytics];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Users => "users",
            ServiceId::Analytics => "analytics",
        }
    }

    fn config_key(&self) -> &'static str {
        match self {
            ServiceId::Users => "service_1_url",
            ServiceId::Analytics => "service_2_url",
        }
    }

    fn env_var(&self) -> &'static str {
        match self {
            ServiceId::Users => ENV_SERVICE1_URL,
            ServiceId::Analytics => ENV_SERVICE2_URL,
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckMethod {
    #[default]
    Get,
    Post,
}

/// One named probe against a downstream service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckConfig {
    pub name: String,
    pub service: ServiceId,
    #[serde(default)]
    pub method: CheckMethod,
    pub path: String,
    /// JSON body sent with POST checks
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Top-level key the response object must contain
    #[serde(default)]
    pub expect_field: Option<String>,
}

impl CheckConfig {
    pub fn get(name: &str, service: ServiceId, path: &str) -> Self {
        Self {
            name: name.to_string(),
            service,
            method: CheckMethod::Get,
            path: path.to_string(),
            body: None,
            expect_field: None,
        }
    }

    pub fn is_health_probe(&self) -> bool {
        self.method == CheckMethod::Get && self.path == HEALTH_PATH
    }

    /// The check set used when the config file names none.
    pub fn default_set() -> Vec<CheckConfig> {
        vec![
            CheckConfig::get("service-1-health", ServiceId::Users, HEALTH_PATH),
            CheckConfig::get("service-2-health", ServiceId::Analytics, HEALTH_PATH),
            CheckConfig::get("fetch-users", ServiceId::Users, "/users"),
            CheckConfig::get("fetch-analytics", ServiceId::Analytics, "/analytics"),
            CheckConfig::get("cross-service", ServiceId::Analytics, "/cross-service-test"),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UiConfig {
    /// Title shown on the dashboard
    #[serde(default = "UiConfig::default_site_name")]
    pub site_name: String,
    #[serde(default = "UiConfig::default_templates_dir")]
    pub templates_dir: String,
    #[serde(default = "UiConfig::default_static_dir")]
    pub static_dir: String,
    /// Version string, populated at runtime
    #[serde(skip_deserializing, default = "UiConfig::default_version")]
    pub version: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            site_name: Self::default_site_name(),
            templates_dir: Self::default_templates_dir(),
            static_dir: Self::default_static_dir(),
            version: Self::default_version(),
        }
    }
}

impl UiConfig {
    fn default_site_name() -> String {
        "Microservices Test Dashboard".to_string()
    }

    fn default_templates_dir() -> String {
        DEFAULT_TEMPLATES_DIR.to_string()
    }

    fn default_static_dir() -> String {
        DEFAULT_STATIC_DIR.to_string()
    }

    fn default_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Glob matching every template under the templates directory
    pub fn template_glob(&self) -> String {
        format!("{}/**/*", self.templates_dir.trim_end_matches('/'))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from `path`, apply environment overrides and validate.
    ///
    /// A missing file is tolerated so the service can be configured purely
    /// from the environment; an unreadable or malformed file is not.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)?
        } else {
            Self::from_toml_str("")?
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without applying overrides or validation.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;
        if config.checks.is_empty() {
            config.checks = CheckConfig::default_set();
        }
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVICE1_URL) {
            self.services.service_1_url = Some(url);
        }
        if let Some(url) = lookup(ENV_SERVICE2_URL) {
            self.services.service_2_url = Some(url);
        }
        if let Some(raw) = lookup(ENV_SERVICE_TIMEOUT) {
            self.services.request_timeout_seconds = parse_seconds(ENV_SERVICE_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RUN_TIMEOUT) {
            self.run.timeout_seconds = Some(parse_seconds(ENV_RUN_TIMEOUT, &raw)?);
        }
        Ok(())
    }

    /// Reject configurations the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for service in ServiceId::ALL {
            self.services.base_url(service)?;
        }

        check_timeout("services.request_timeout_seconds", self.services.request_timeout_seconds)?;
        if let Some(seconds) = self.run.timeout_seconds {
            check_timeout("run.timeout_seconds", seconds)?;
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.name.trim().is_empty() {
                return Err(ConfigError::Validation("Check names must not be empty".to_string()));
            }
            if !seen.insert(check.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate check name '{}'",
                    check.name
                )));
            }
            if !check.path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Check '{}' path must start with '/': {}",
                    check.name, check.path
                )));
            }
        }

        Ok(())
    }
}

fn check_timeout(key: &str, seconds: u64) -> Result<(), ConfigError> {
    if seconds == 0 || seconds > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {} seconds, got {}",
            key, MAX_TIMEOUT_SECS, seconds
        )));
    }
    Ok(())
}

fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    // Check paths are appended to the base, so it cannot carry a query or fragment
    if url.query().is_some() || url.fragment().is_some() {
        return Err("base URL must not contain a query or fragment".to_string());
    }
    Ok(url)
}

fn parse_seconds(var: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Validation(format!("{} must be a whole number of seconds, got '{}'", var, raw)))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
