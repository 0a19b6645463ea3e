//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::reply::ReplyTimings;

/// Default Kwork API host.
pub const DEFAULT_API_HOST: &str = "https://api.kwork.ru";

/// Default push channel base URL; the channel token is appended as the last path segment.
pub const DEFAULT_CHANNEL_URL: &str = "wss://notice.kwork.ru/ws/public";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Kwork account login.
    pub login: String,
    /// Kwork account password.
    pub password: SecretString,
    /// Last digits of the account phone, required by some accounts at sign-in.
    pub phone_last: Option<String>,
    /// HTTP or SOCKS5 proxy for API calls.
    pub proxy_url: Option<String>,
    pub api_host: String,
    pub channel_url: String,
    /// Fixed wait between push channel reconnect attempts.
    pub reconnect_backoff: Duration,
    /// Capacity of the queue between the listener and the dispatcher.
    pub queue_capacity: usize,
    pub reply_timings: ReplyTimings,
}

impl BotConfig {
    /// Config with defaults for everything but the credentials.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: SecretString::from(password.into()),
            phone_last: None,
            proxy_url: None,
            api_host: DEFAULT_API_HOST.to_string(),
            channel_url: DEFAULT_CHANNEL_URL.to_string(),
            reconnect_backoff: Duration::from_secs(10),
            queue_capacity: 100,
            reply_timings: ReplyTimings::default(),
        }
    }

    /// Build config from `KWORK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let login = var("KWORK_LOGIN").ok_or_else(|| ConfigError::MissingEnvVar("KWORK_LOGIN".into()))?;
        let password =
            var("KWORK_PASSWORD").ok_or_else(|| ConfigError::MissingEnvVar("KWORK_PASSWORD".into()))?;

        let mut config = Self::new(login, password);
        config.phone_last = var("KWORK_PHONE_LAST");
        config.proxy_url = var("KWORK_PROXY_URL");

        if let Some(host) = var("KWORK_API_HOST") {
            config.api_host = host.trim_end_matches('/').to_string();
        }
        if let Some(url) = var("KWORK_CHANNEL_URL") {
            config.channel_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64>(&var, "KWORK_RECONNECT_SECS")? {
            config.reconnect_backoff = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_var::<usize>(&var, "KWORK_QUEUE_CAPACITY")? {
            if capacity == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "KWORK_QUEUE_CAPACITY".into(),
                    message: "must be greater than zero".into(),
                });
            }
            config.queue_capacity = capacity;
        }
        if let Some(ms) = parse_var::<u64>(&var, "KWORK_TYPING_DELAY_MS")? {
            config.reply_timings.typing_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&var, "KWORK_SEND_DELAY_MS")? {
            config.reply_timings.send_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}
