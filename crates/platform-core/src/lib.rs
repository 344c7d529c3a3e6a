use std::{
    env, fs,
    path::{Path, PathBuf},
};

use api_version::VersionEntryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEnv {
    Local,
    Dev,
    Test,
    Prod,
}

impl AppEnv {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }
}

impl std::str::FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" | "development" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(ConfigError::InvalidEnv(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub observability: ObservabilitySection,
    pub auth: AuthSection,
    #[serde(default)]
    pub versions: Vec<VersionEntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    pub env: AppEnv,
    pub service_name: String,
    pub rpc_bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySection {
    pub log_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// How long a WAITING_FOR_ACTIVATION account stays usable after the
    /// activation email went out.
    pub activation_expiration_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid APP_ENV value: {0}")]
    InvalidEnv(String),
    #[error("invalid integer value for {name}: {value}")]
    InvalidInteger { name: String, value: String },
    #[error("unable to locate config directory (expected config/default.toml)")]
    ConfigDirNotFound,
    #[error("failed reading config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing config file {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct PartialAppConfig {
    app: Option<PartialAppSection>,
    observability: Option<PartialObservabilitySection>,
    auth: Option<PartialAuthSection>,
    versions: Option<Vec<VersionEntryConfig>>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialAppSection {
    env: Option<AppEnv>,
    service_name: Option<String>,
    rpc_bind_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialObservabilitySection {
    log_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialAuthSection {
    activation_expiration_seconds: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let app_env = env::var("APP_ENV")
            .ok()
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or(AppEnv::Local);
        let config_dir = resolve_config_dir()?;
        Self::load_from_dir_for_env(config_dir, app_env)
    }

    pub fn load_from_dir_for_env(
        config_dir: impl AsRef<Path>,
        app_env: AppEnv,
    ) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let mut config = Self::default_for_env(app_env);
        merge_file(&mut config, &config_dir.join("default.toml"))?;
        merge_optional_file(
            &mut config,
            &config_dir.join(format!("{}.toml", app_env.as_str())),
        )?;
        config.app.env = app_env;
        config.apply_env_overrides()?;
        Ok(config)
    }

    #[must_use]
    pub fn default_for_env(app_env: AppEnv) -> Self {
        Self {
            app: AppSection {
                env: app_env,
                service_name: "account-gateway".to_string(),
                rpc_bind_addr: "127.0.0.1:8090".to_string(),
            },
            observability: ObservabilitySection {
                log_filter: "info".to_string(),
            },
            auth: AuthSection {
                activation_expiration_seconds: 604_800,
            },
            versions: Vec::new(),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw_env) = env::var("APP_ENV") {
            self.app.env = raw_env.parse()?;
        }
        if let Ok(service_name) = env::var("ACCOUNT_GATEWAY__SERVICE_NAME") {
            self.app.service_name = service_name;
        }
        if let Ok(bind_addr) = env::var("ACCOUNT_GATEWAY__RPC_BIND_ADDR") {
            self.app.rpc_bind_addr = bind_addr;
        }
        if let Ok(raw) = env::var("AUTH__ACTIVATION_EXPIRATION_SECONDS") {
            self.auth.activation_expiration_seconds =
                raw.parse().map_err(|_| ConfigError::InvalidInteger {
                    name: "AUTH__ACTIVATION_EXPIRATION_SECONDS".to_string(),
                    value: raw,
                })?;
        }
        if let Ok(log_filter) = env::var("OBSERVABILITY__LOG_FILTER") {
            self.observability.log_filter = log_filter;
        } else if let Ok(log_filter) = env::var("RUST_LOG") {
            self.observability.log_filter = log_filter;
        }
        Ok(())
    }

    fn merge_partial(&mut self, partial: PartialAppConfig) {
        if let Some(app) = partial.app {
            if let Some(value) = app.env {
                self.app.env = value;
            }
            if let Some(value) = app.service_name {
                self.app.service_name = value;
            }
            if let Some(value) = app.rpc_bind_addr {
                self.app.rpc_bind_addr = value;
            }
        }
        if let Some(observability) = partial.observability {
            if let Some(value) = observability.log_filter {
                self.observability.log_filter = value;
            }
        }
        if let Some(auth) = partial.auth {
            if let Some(value) = auth.activation_expiration_seconds {
                self.auth.activation_expiration_seconds = value;
            }
        }
        // The version table is replaced wholesale, never merged entry-wise.
        if let Some(versions) = partial.versions {
            self.versions = versions;
        }
    }
}

fn merge_file(config: &mut AppConfig, path: &Path) -> Result<(), ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    let partial =
        toml::from_str::<PartialAppConfig>(&content).map_err(|source| ConfigError::ParseToml {
            path: path.display().to_string(),
            source,
        })?;
    config.merge_partial(partial);
    Ok(())
}

fn merge_optional_file(config: &mut AppConfig, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    merge_file(config, path)
}

fn resolve_config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var("ACCOUNT_GATEWAY_CONFIG_DIR") {
        return Ok(PathBuf::from(path));
    }

    let mut current_dir = env::current_dir().map_err(|_| ConfigError::ConfigDirNotFound)?;
    loop {
        let candidate = current_dir.join("config");
        if candidate.join("default.toml").exists() {
            return Ok(candidate);
        }
        if !current_dir.pop() {
            break;
        }
    }

    Err(ConfigError::ConfigDirNotFound)
}
