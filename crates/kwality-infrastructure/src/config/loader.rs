//! Configuration loader.
//!
//! Resolution order:
//! 1. Defaults (every section has one)
//! 2. `config/{env}.toml`, searched from the current directory upward
//! 3. Environment variable overrides from the external contract
//!
//! Environment is resolved from `KWALITY_ENV` (default: `development`).

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};

use kwality_domain::error::{Error, Result};

use crate::config::AppConfig;

/// Configuration loader service
///
/// Merges defaults, an optional TOML file and the contract environment
/// variables, then validates the result.
#[derive(Clone, Default)]
pub struct ConfigLoader {
    /// Optional explicit config file path (overrides environment resolution)
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    #[must_use]
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set an explicit configuration file path (overrides env-based resolution)
    #[must_use]
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, parsing
    /// fails, an env override does not parse, or validation detects an
    /// invalid value.
    pub fn load(&self) -> Result<AppConfig> {
        self.load_with_env(|key| env::var(key).ok())
    }

    /// Load configuration with an explicit environment lookup.
    ///
    /// The process environment is just one lookup implementation; tests
    /// inject maps instead of mutating global state.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ConfigLoader::load`].
    pub fn load_with_env(&self, get: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(path) = self.resolve_config_path(&get)? {
            kwality_domain::info!("config", "Configuration file", &path.display());
            figment = figment.merge(Toml::file(path));
        }

        let mut config: AppConfig = figment
            .extract()
            .map_err(|e| Error::configuration_with_source("failed to parse configuration", e))?;

        apply_env_overrides(&mut config, &get)?;
        validate_app_config(&config)?;
        Ok(config)
    }

    fn resolve_config_path(
        &self,
        get: &impl Fn(&str) -> Option<String>,
    ) -> Result<Option<PathBuf>> {
        // Explicit path takes precedence and must exist.
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(Error::ConfigMissing(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let env_name = get("KWALITY_ENV").unwrap_or_else(|| "development".to_owned());
        let filename = format!("{env_name}.toml");

        if let Ok(current_dir) = env::current_dir() {
            for dir in current_dir.ancestors() {
                let candidate = dir.join("config").join(&filename);
                if candidate.exists() {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }
}

fn override_parsed<T: FromStr>(
    target: &mut T,
    key: &str,
    get: &impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(raw) = get(key) {
        *target = raw.parse().map_err(|_| Error::ConfigInvalid {
            key: key.to_owned(),
            message: format!("could not parse value '{raw}'"),
        })?;
    }
    Ok(())
}

fn override_bool(
    target: &mut bool,
    key: &str,
    get: &impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(raw) = get(key) {
        *target = match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(Error::ConfigInvalid {
                    key: key.to_owned(),
                    message: format!("expected a boolean, got '{raw}'"),
                });
            }
        };
    }
    Ok(())
}

/// Apply the environment variables documented in the external contract.
fn apply_env_overrides(
    config: &mut AppConfig,
    get: &impl Fn(&str) -> Option<String>,
) -> Result<()> {
    override_parsed(&mut config.server.port, "KWALITY_PORT", get)?;
    if let Some(env_name) = get("KWALITY_ENV") {
        config.server.env = env_name;
    }

    override_parsed(
        &mut config.orchestrator.max_workers,
        "ORCHESTRATOR_MAX_WORKERS",
        get,
    )?;
    override_parsed(
        &mut config.orchestrator.queue_size,
        "ORCHESTRATOR_QUEUE_SIZE",
        get,
    )?;
    override_parsed(
        &mut config.orchestrator.timeout_minutes,
        "ORCHESTRATOR_TIMEOUT_MINUTES",
        get,
    )?;

    if let Some(image) = get("RUNTIME_CONTAINER_IMAGE") {
        config.runtime.container_image = if image.is_empty() { None } else { Some(image) };
    }
    override_parsed(
        &mut config.runtime.memory_limit_mb,
        "RUNTIME_MEMORY_LIMIT_MB",
        get,
    )?;
    override_parsed(
        &mut config.runtime.cpu_limit_cores,
        "RUNTIME_CPU_LIMIT_CORES",
        get,
    )?;
    override_parsed(
        &mut config.runtime.timeout_seconds,
        "RUNTIME_TIMEOUT_SECONDS",
        get,
    )?;
    override_bool(
        &mut config.runtime.network_isolation,
        "RUNTIME_NETWORK_ISOLATION",
        get,
    )?;

    if let Some(scanners) = get("SECURITY_ENABLED_SCANNERS") {
        config.security.enabled_scanners = scanners
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
    }
    override_bool(
        &mut config.security.secrets_detection,
        "SECURITY_SECRETS_DETECTION",
        get,
    )?;

    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.logging.format = format;
    }
    Ok(())
}

/// Validate application configuration
fn validate_app_config(config: &AppConfig) -> Result<()> {
    validate_orchestrator_config(config)?;
    validate_runtime_config(config)?;
    validate_limits_config(config)?;
    validate_logging_config(config)?;
    Ok(())
}

fn validate_orchestrator_config(config: &AppConfig) -> Result<()> {
    if config.orchestrator.max_workers == 0 {
        return Err(Error::ConfigInvalid {
            key: "orchestrator.max_workers".to_owned(),
            message: "worker pool size cannot be 0".to_owned(),
        });
    }
    if config.orchestrator.queue_size == 0 {
        return Err(Error::ConfigInvalid {
            key: "orchestrator.queue_size".to_owned(),
            message: "queue capacity cannot be 0".to_owned(),
        });
    }
    if config.orchestrator.timeout_minutes == 0 {
        return Err(Error::ConfigInvalid {
            key: "orchestrator.timeout_minutes".to_owned(),
            message: "job timeout cannot be 0".to_owned(),
        });
    }
    Ok(())
}

fn validate_runtime_config(config: &AppConfig) -> Result<()> {
    if config.runtime.memory_limit_mb == 0 {
        return Err(Error::ConfigInvalid {
            key: "runtime.memory_limit_mb".to_owned(),
            message: "memory limit cannot be 0".to_owned(),
        });
    }
    if config.runtime.cpu_limit_cores <= 0.0 {
        return Err(Error::ConfigInvalid {
            key: "runtime.cpu_limit_cores".to_owned(),
            message: "CPU limit must be positive".to_owned(),
        });
    }
    if config.runtime.timeout_seconds == 0 {
        return Err(Error::ConfigInvalid {
            key: "runtime.timeout_seconds".to_owned(),
            message: "sandbox timeout cannot be 0".to_owned(),
        });
    }
    Ok(())
}

fn validate_limits_config(config: &AppConfig) -> Result<()> {
    if config.limits.max_codebase_bytes == 0
        || config.limits.max_files == 0
        || config.limits.max_file_bytes == 0
    {
        return Err(Error::ConfigInvalid {
            key: "limits".to_owned(),
            message: "size caps must be positive".to_owned(),
        });
    }
    Ok(())
}

fn validate_logging_config(config: &AppConfig) -> Result<()> {
    if config
        .logging
        .level
        .parse::<kwality_domain::ports::LogLevel>()
        .is_err()
    {
        return Err(Error::ConfigInvalid {
            key: "logging.level".to_owned(),
            message: format!("unknown log level '{}'", config.logging.level),
        });
    }
    if !matches!(config.logging.format.as_str(), "json" | "pretty") {
        return Err(Error::ConfigInvalid {
            key: "logging.format".to_owned(),
            message: format!("unknown log format '{}'", config.logging.format),
        });
    }
    Ok(())
}
