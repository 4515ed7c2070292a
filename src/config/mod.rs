//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::CacheConfig;
use crate::fetch::{DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, RetryPolicy};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "relay-admin";
const ENV_PREFIX: &str = "RELAY_ADMIN";
const DEFAULT_API_URL: &str = "http://127.0.0.1:9002";
const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com";
const DEFAULT_COINGECKO_CURRENCY: &str = "usd";
const DEFAULT_COINGECKO_DAYS: u32 = 30;
const DEFAULT_STATE_DIR: &str = ".relay-admin";
const DEFAULT_NOTIFICATIONS_INTERVAL_SECS: u64 = 30;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::WARN;

/// Options shared by every command, flattened into the binary's parser.
#[derive(Debug, Args, Default, Clone)]
pub struct GlobalArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "RELAY_ADMIN_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// Override the relay management API base URL.
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Override the directory holding the token and the profile cache.
    #[arg(long = "state-dir", value_name = "PATH", value_hint = ValueHint::DirPath, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Keep the token and caches in memory only.
    #[arg(long = "ephemeral", action = clap::ArgAction::SetTrue, global = true)]
    pub ephemeral: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub coingecko: CoinGeckoSettings,
    pub storage: StorageSettings,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    pub polling: PollingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    /// Token used when none has been stored by `auth login`.
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CoinGeckoSettings {
    pub base_url: Url,
    pub vs_currency: String,
    pub days: u32,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub state_dir: PathBuf,
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PollingSettings {
    pub notifications: Duration,
    pub stats: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

impl Settings {
    /// Built-in defaults, ignoring files, environment and arguments.
    pub fn builtin() -> Result<Self, LoadError> {
        Self::from_raw(RawSettings::default())
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(args: &GlobalArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = args.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(args);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    coingecko: RawCoinGeckoSettings,
    storage: RawStorageSettings,
    cache: RawCacheSettings,
    retry: RawRetrySettings,
    polling: RawPollingSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, args: &GlobalArgs) {
        if let Some(url) = args.api_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(dir) = args.state_dir.as_ref() {
            self.storage.state_dir = Some(dir.clone());
        }
        if args.ephemeral {
            self.storage.ephemeral = Some(true);
        }
        if let Some(level) = args.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = args.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            coingecko,
            storage,
            cache,
            retry,
            polling,
            logging,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            coingecko: build_coingecko_settings(coingecko)?,
            storage: build_storage_settings(storage),
            cache: build_cache_settings(cache)?,
            retry: build_retry_settings(retry)?,
            polling: build_polling_settings(polling)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let base_url = parse_base_url(
        api.base_url.as_deref().unwrap_or(DEFAULT_API_URL),
        "api.base_url",
    )?;
    let token = api.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    Ok(ApiSettings { base_url, token })
}

fn build_coingecko_settings(
    coingecko: RawCoinGeckoSettings,
) -> Result<CoinGeckoSettings, LoadError> {
    let base_url = parse_base_url(
        coingecko
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_COINGECKO_URL),
        "coingecko.base_url",
    )?;
    let vs_currency = coingecko
        .vs_currency
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_COINGECKO_CURRENCY.to_string());
    if vs_currency.is_empty() {
        return Err(LoadError::invalid("coingecko.vs_currency", "must not be empty"));
    }
    let days = coingecko.days.unwrap_or(DEFAULT_COINGECKO_DAYS);
    if days == 0 {
        return Err(LoadError::invalid("coingecko.days", "must be greater than zero"));
    }
    Ok(CoinGeckoSettings {
        base_url,
        vs_currency,
        days,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> StorageSettings {
    StorageSettings {
        state_dir: storage
            .state_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
        ephemeral: storage.ephemeral.unwrap_or(false),
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let mut config = CacheConfig::default();
    if let Some(seconds) = cache.rates_ttl_seconds {
        config.rates_ttl = ttl(seconds, "cache.rates_ttl_seconds")?;
    }
    if let Some(seconds) = cache.profiles_ttl_seconds {
        config.profiles_ttl = ttl(seconds, "cache.profiles_ttl_seconds")?;
    }
    if let Some(prefix) = cache.profile_prefix {
        if crate::cache::kv::validate_key(&prefix).is_err() {
            return Err(LoadError::invalid(
                "cache.profile_prefix",
                "may only contain ASCII letters, digits, `_`, `-` and `.`",
            ));
        }
        config.profile_prefix = prefix;
    }
    Ok(config)
}

fn ttl(seconds: u64, key: &'static str) -> Result<time::Duration, LoadError> {
    to_time_duration(non_zero_seconds(seconds, key)?, key)
}

fn build_retry_settings(retry: RawRetrySettings) -> Result<RetryPolicy, LoadError> {
    let max_retries = retry.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
    let backoff = match retry.backoff_ms {
        Some(0) => {
            return Err(LoadError::invalid(
                "retry.backoff_ms",
                "must be greater than zero",
            ));
        }
        Some(millis) => Duration::from_millis(millis),
        None => DEFAULT_BACKOFF,
    };
    Ok(RetryPolicy::new(max_retries, backoff))
}

fn build_polling_settings(polling: RawPollingSettings) -> Result<PollingSettings, LoadError> {
    Ok(PollingSettings {
        notifications: non_zero_seconds(
            polling
                .notifications_seconds
                .unwrap_or(DEFAULT_NOTIFICATIONS_INTERVAL_SECS),
            "polling.notifications_seconds",
        )?,
        stats: non_zero_seconds(
            polling.stats_seconds.unwrap_or(DEFAULT_STATS_INTERVAL_SECS),
            "polling.stats_seconds",
        )?,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => DEFAULT_LOG_LEVEL,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCoinGeckoSettings {
    base_url: Option<String>,
    vs_currency: Option<String>,
    days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    state_dir: Option<PathBuf>,
    ephemeral: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    rates_ttl_seconds: Option<u64>,
    profiles_ttl_seconds: Option<u64>,
    profile_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRetrySettings {
    max_retries: Option<u32>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPollingSettings {
    notifications_seconds: Option<u64>,
    stats_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn parse_base_url(raw: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    Ok(with_trailing_slash(url))
}

/// Relative joins keep the last path segment only when it ends in `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn non_zero_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn to_time_duration(value: Duration, key: &'static str) -> Result<time::Duration, LoadError> {
    time::Duration::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range"))
}
