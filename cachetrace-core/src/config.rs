use std::collections::HashMap;
use std::time::Duration;

use crate::Error;

const ENV_CACHETRACE_REDIS_ADDR: &str = "CACHETRACE_REDIS_ADDR";
const ENV_CACHETRACE_REDIS_FLUSH_ASYNC: &str = "CACHETRACE_REDIS_FLUSH_ASYNC";
const ENV_CACHETRACE_REDIS_CONNECT_RETRIES: &str = "CACHETRACE_REDIS_CONNECT_RETRIES";
const ENV_CACHETRACE_REDIS_CONNECT_TIMEOUT_MILLIS: &str = "CACHETRACE_REDIS_CONNECT_TIMEOUT_MILLIS";

#[derive(Debug, Clone, PartialEq)]
pub struct RedisConfig {
    pub addr: String,
    /// Issue `FLUSHDB ASYNC` instead of a blocking `FLUSHDB` when the cache is created.
    pub flush_async: bool,
    /// Reconnect attempts after the first failed connect.
    pub connect_retries: usize,
    /// Timeout of a single connect attempt. The initial connect as a whole gives up after
    /// `connect_timeout_millis * (connect_retries + 1)` plus backoff.
    pub connect_timeout_millis: u64,
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_millis)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "redis://127.0.0.1:6379".to_owned(),
            flush_async: true,
            connect_retries: 1,
            connect_timeout_millis: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub redis: RedisConfig,
}

/// This implementation is to load settings from env variables
impl TryFrom<HashMap<String, String>> for Settings {
    type Error = Error;
    fn try_from(env_vars: HashMap<String, String>) -> std::result::Result<Self, Self::Error> {
        let mut settings = Settings::default();

        if let Some(addr) = env_vars.get(ENV_CACHETRACE_REDIS_ADDR) {
            settings.redis.addr = addr.to_owned();
        }

        if let Some(flush_async) = env_vars.get(ENV_CACHETRACE_REDIS_FLUSH_ASYNC) {
            settings.redis.flush_async = flush_async.parse().map_err(|e| {
                Error::ParseConfig(format!(
                    "Parsing {ENV_CACHETRACE_REDIS_FLUSH_ASYNC}(set to '{flush_async}'): {e:?}"
                ))
            })?;
        }

        if let Some(retries) = env_vars.get(ENV_CACHETRACE_REDIS_CONNECT_RETRIES) {
            settings.redis.connect_retries = retries.parse().map_err(|e| {
                Error::ParseConfig(format!(
                    "Parsing {ENV_CACHETRACE_REDIS_CONNECT_RETRIES}(set to '{retries}'): {e:?}"
                ))
            })?;
        }

        if let Some(timeout) = env_vars.get(ENV_CACHETRACE_REDIS_CONNECT_TIMEOUT_MILLIS) {
            settings.redis.connect_timeout_millis = timeout.parse().map_err(|e| {
                Error::ParseConfig(format!(
                    "Parsing {ENV_CACHETRACE_REDIS_CONNECT_TIMEOUT_MILLIS}(set to '{timeout}'): {e:?}"
                ))
            })?;
        }

        Ok(settings)
    }
}
