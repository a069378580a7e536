use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "MXN";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Payment gateway (Conekta orders API) configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the gateway API
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,

    /// Private API key sent as a bearer token
    pub api_key: String,

    /// ISO currency code used for every charge
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Request timeout in seconds for gateway calls
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            api_key: String::new(),
            currency: default_currency(),
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

/// Connection URLs for the four catalog stores. Each store owns its own
/// schema and transaction scope; there is no cross-store atomicity.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StoresConfig {
    pub merchandise_url: String,
    pub books_url: String,
    pub ebooks_url: String,
    pub webinars_url: String,
}

/// Application configuration, explicitly constructed at startup and injected
/// into the orchestrator. No ambient globals.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Ledger database connection URL (orders table)
    pub database_url: String,

    /// Catalog store connection URLs
    pub stores: StoresConfig,

    /// JWT secret key for verifying session tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Payment gateway configuration
    pub gateway: GatewayConfig,

    /// Optional notification dispatch endpoint; order confirmations are
    /// POSTed here after a successful checkout. Disabled when unset.
    #[serde(default)]
    pub notification_url: Option<String>,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_gateway_base_url() -> String {
    "https://api.conekta.io".to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

/// Loads configuration from layered sources: config/default.toml, then
/// config/{environment}.toml, then `APP_*` environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    if cfg.is_production() && cfg.jwt_secret == DEV_DEFAULT_JWT_SECRET {
        return Err(ConfigError::Message(
            "production requires an explicit jwt_secret".to_string(),
        ));
    }

    info!(environment = %cfg.environment, "Configuration loaded");
    Ok(cfg)
}

/// Initializes the tracing subscriber. Call once at startup.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
