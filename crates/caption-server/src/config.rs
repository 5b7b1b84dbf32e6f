//! Server configuration and its layered loader.

use crate::error::{ServerError, ServerResult};
use caption_jobs::{ProviderConfig, ProviderKind, QueueConfig};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prefix of environment variable overrides (`CAPTION__QUEUE__MAX_CONCURRENT`).
pub const ENV_PREFIX: &str = "CAPTION";

/// Environment variable selecting the environment-specific config file.
pub const ENVIRONMENT_VAR: &str = "CAPTION_ENVIRONMENT";

/// Root configuration of the caption server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Queue limits and timings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Caption provider selection.
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    pub name: String,
    pub version: String,
    /// development, staging or production.
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "caption-queue".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// How often queue status is logged, in seconds. Zero disables it.
    pub status_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,caption=debug".to_string(),
            json: false,
            status_interval_secs: 30,
        }
    }
}

impl LoggingConfig {
    /// Status log period, if enabled.
    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval_secs > 0).then(|| Duration::from_secs(self.status_interval_secs))
    }
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address the scrape endpoint listens on.
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0:9000".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Parses the listen address.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            ServerError::Configuration(format!(
                "invalid metrics listen_addr '{}': {}",
                self.listen_addr, e
            ))
        })
    }
}

/// Layered configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    /// Creates a loader and performs the first load.
    ///
    /// Sources, later ones winning:
    /// 1. `{dir}/default.toml`
    /// 2. `{dir}/{CAPTION_ENVIRONMENT}.toml`
    /// 3. `{dir}/local.toml`
    /// 4. `CAPTION__*` environment variables
    pub fn new(config_dir: impl AsRef<Path>) -> ServerResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        let config = load_from(
            config_dir.as_ref(),
            &environment,
            Environment::with_prefix(ENV_PREFIX),
        )?;

        Ok(Self { config })
    }

    /// Loads configuration from `./config`.
    pub fn from_default_location() -> ServerResult<Self> {
        Self::new("./config")
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> AppConfig {
        self.config
    }
}

fn load_from(
    config_dir: &Path,
    environment: &str,
    env_source: Environment,
) -> ServerResult<AppConfig> {
    info!(environment, config_dir = %config_dir.display(), "Loading configuration");

    let mut builder = Config::builder().set_default("app.environment", environment)?;

    for name in ["default", environment, "local"] {
        let path = config_dir.join(format!("{name}.toml"));
        if path.exists() {
            debug!("Loading config from: {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
    }

    builder = builder.add_source(env_source.separator("__").try_parsing(true));

    let app_config: AppConfig = builder.build()?.try_deserialize()?;
    validate_config(&app_config)?;
    Ok(app_config)
}

fn validate_config(config: &AppConfig) -> ServerResult<()> {
    config.queue.validate()?;

    if config.metrics.enabled {
        config.metrics.socket_addr()?;
    }

    match config.provider.kind {
        ProviderKind::Http if config.provider.endpoint.is_empty() => {
            return Err(ServerError::Configuration(
                "provider.endpoint is required for the http provider".to_string(),
            ));
        }
        ProviderKind::Simulated if config.app.environment == "production" => {
            warn!("Simulated caption provider configured in production");
        }
        _ => {}
    }

    if !(0.0..=1.0).contains(&config.provider.failure_rate) {
        return Err(ServerError::Configuration(format!(
            "provider.failure_rate must be within 0.0..=1.0, got {}",
            config.provider.failure_rate
        )));
    }

    Ok(())
}
