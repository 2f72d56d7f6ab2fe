//! Application configuration for Codestep.
//!
//! User config lives at `~/.codestep/codestep.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CodestepError, Result};
use crate::types::{BackendVariant, FrontendVariant};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "codestep.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".codestep";

/// Environment variable that overrides `[runtime] environment`.
pub const ENVIRONMENT_ENV_VAR: &str = "CODESTEP_ENV";

// ---------------------------------------------------------------------------
// Config structs (matching codestep.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub feature_flags: FeatureFlagsConfig,

    /// Which project variant the tutorial page serves.
    #[serde(default)]
    pub tutorial: TutorialConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/codestep.db".into()
}

/// Deployment environment. Feature flags are only evaluated in production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl std::str::FromStr for Environment {
    type Err = CodestepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(CodestepError::config(format!(
                "unknown environment '{other}' (expected development or production)"
            ))),
        }
    }
}

/// `[runtime]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub environment: Environment,
}

/// `[feature_flags]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlagsConfig {
    /// Name of the env var holding the project API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the feature-flag service.
    #[serde(default = "default_flags_host")]
    pub host: String,

    /// Flag gating the Q&A panel.
    #[serde(default = "default_qa_flag")]
    pub qa_flag: String,

    /// Request timeout in seconds.
    #[serde(default = "default_flags_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeatureFlagsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            host: default_flags_host(),
            qa_flag: default_qa_flag(),
            timeout_secs: default_flags_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "POSTHOG_KEY".into()
}
fn default_flags_host() -> String {
    "https://app.posthog.com".into()
}
fn default_qa_flag() -> String {
    "q-a-feature".into()
}
fn default_flags_timeout() -> u64 {
    5
}

/// `[tutorial]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorialConfig {
    #[serde(default = "default_frontend")]
    pub frontend_variant: FrontendVariant,
    #[serde(default = "default_backend")]
    pub backend_variant: BackendVariant,
}

impl Default for TutorialConfig {
    fn default() -> Self {
        Self {
            frontend_variant: default_frontend(),
            backend_variant: default_backend(),
        }
    }
}

fn default_frontend() -> FrontendVariant {
    FrontendVariant::NextJs
}
fn default_backend() -> BackendVariant {
    BackendVariant::Supabase
}

// ---------------------------------------------------------------------------
// Feature flag settings (runtime, merged from config + environment)
// ---------------------------------------------------------------------------

/// Runtime feature-flag configuration with the API key already resolved.
#[derive(Debug, Clone)]
pub struct FeatureFlagSettings {
    /// Resolved deployment environment.
    pub environment: Environment,
    /// Project API key; empty when the env var is unset.
    pub api_key: String,
    /// Service base URL.
    pub host: String,
    /// Flag gating the Q&A panel.
    pub qa_flag: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&AppConfig> for FeatureFlagSettings {
    fn from(config: &AppConfig) -> Self {
        let environment = resolve_environment(config);
        let api_key = std::env::var(&config.feature_flags.api_key_env).unwrap_or_default();
        if api_key.is_empty() && environment.is_production() {
            tracing::warn!(
                var = %config.feature_flags.api_key_env,
                "feature flag API key not set, flag checks will default to disabled"
            );
        }
        Self {
            environment,
            api_key,
            host: config.feature_flags.host.clone(),
            qa_flag: config.feature_flags.qa_flag.clone(),
            timeout_secs: config.feature_flags.timeout_secs,
        }
    }
}

/// The effective environment: `CODESTEP_ENV` wins over the config file.
/// An unparseable override is logged and ignored.
pub fn resolve_environment(config: &AppConfig) -> Environment {
    match std::env::var(ENVIRONMENT_ENV_VAR) {
        Ok(raw) if !raw.trim().is_empty() => match raw.parse() {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring {ENVIRONMENT_ENV_VAR}");
                config.runtime.environment
            }
        },
        _ => config.runtime.environment,
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.codestep/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CodestepError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.codestep/codestep.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| CodestepError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CodestepError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CodestepError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CodestepError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CodestepError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
