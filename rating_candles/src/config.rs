//! Program configuration: a TOML file whose every field has a default.
//!
//! ```toml
//! [lichess]
//! base_url = "https://lichess.org"
//! token_env = "LICHESS_TOKEN"
//!
//! [retry]
//! max_retries = 5
//! base_delay_ms = 1000
//!
//! [storage]
//! data_dir = "downloads"
//!
//! [aggregation]
//! timezone = "Europe/Paris"
//! day_boundary = "created_at"
//!
//! [logging]
//! file = "rating_candles.log"
//! ```
//!
//! The configuration is loaded once in `main` and handed to the collaborators
//! that need it. Nothing here is global.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use chrono_tz::Tz;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var, get_optional_env_var};
use snafu::IntoError;
use tracing::warn;

use crate::providers::{
    MissingEnvVarSnafu, ProviderInitError,
    lichess::{DayBoundary, LichessProvider, LichessSettings, provider::DEFAULT_BASE_URL},
    retry::RetryPolicy,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    pub lichess: LichessCfg,
    pub retry: RetryCfg,
    pub storage: StorageCfg,
    pub aggregation: AggregationCfg,
    pub logging: LoggingCfg,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LichessCfg {
    pub base_url: String,
    /// Name of the environment variable holding the personal API token.
    pub token_env: String,
    /// Fail at start-up instead of running anonymously when the token is missing.
    pub require_token: bool,
    pub connect_timeout_secs: u64,
}

impl Default for LichessCfg {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_env: "LICHESS_TOKEN".to_string(),
            require_token: false,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryCfg {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub statuses: Vec<u16>,
}

impl Default for RetryCfg {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            statuses: policy.retry_statuses,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageCfg {
    /// Root of the `<user>/<perfType>.csv` tree.
    pub data_dir: PathBuf,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AggregationCfg {
    /// IANA timezone name whose midnight separates days.
    pub timezone: String,
    pub day_boundary: DayBoundary,
}

impl Default for AggregationCfg {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            day_boundary: DayBoundary::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingCfg {
    /// Console filter directive. `RUST_LOG` wins when set; otherwise `info`
    /// (`debug` in debug builds).
    pub stdout_level: Option<String>,
    /// Debug-level log file. `None` disables file logging.
    pub file: Option<PathBuf>,
    /// Size at which the log file is rotated on start-up.
    pub max_bytes: u64,
    /// Number of rotated files kept (`<file>.1` is the newest).
    pub backups: u32,
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            stdout_level: None,
            file: Some(PathBuf::from("rating_candles.log")),
            max_bytes: 12_500_000,
            backups: 3,
        }
    }
}

impl AppConfig {
    pub fn time_zone(&self) -> anyhow::Result<Tz> {
        let name = self.aggregation.timezone.trim();
        name.parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("unknown timezone '{name}': {e}"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            retry_statuses: self.retry.statuses.clone(),
        }
    }

    pub fn lichess_settings(&self) -> anyhow::Result<LichessSettings> {
        Ok(LichessSettings {
            base_url: self.lichess.base_url.clone(),
            connect_timeout: Duration::from_secs(self.lichess.connect_timeout_secs),
            retry: self.retry_policy(),
            time_zone: self.time_zone()?,
            day_boundary: self.aggregation.day_boundary,
        })
    }

    /// Reads the API token from the environment variable named in `lichess.token_env`.
    pub fn token(&self) -> Result<Option<SecretString>, ProviderInitError> {
        let var = self.lichess.token_env.as_str();
        let token = if self.lichess.require_token {
            Some(get_env_var(var).map_err(|source| MissingEnvVarSnafu.into_error(source))?)
        } else {
            get_optional_env_var(var)
        };
        if token.is_none() {
            warn!("{var} is not set; requesting games anonymously");
        }
        Ok(token.map(|t| SecretString::new(t.into())))
    }

    /// Builds the game fetcher described by this configuration.
    pub fn build_provider(&self) -> anyhow::Result<LichessProvider> {
        let settings = self.lichess_settings()?;
        let token = self.token().context("read lichess API token")?;
        LichessProvider::new(settings, token).context("create lichess provider")
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.lichess.token_env.trim().is_empty() {
            bail!("lichess.token_env cannot be empty");
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            bail!(
                "retry.max_delay_ms ({}) is smaller than retry.base_delay_ms ({})",
                self.retry.max_delay_ms,
                self.retry.base_delay_ms
            );
        }
        self.time_zone()?;
        Ok(())
    }
}

/// Parse and validate a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

/// Read a configuration file from disk, then parse and validate it.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
