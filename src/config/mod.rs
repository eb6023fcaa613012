use std::env;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_COOKIE_NAME: &str = "__SID";

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_server: String,
    pub cache_db: i64,
    pub cache_password: Option<String>,
    pub cache_timeout_secs: Option<u64>,
    pub cookie_name: String,
    pub cookie_secret: String,
    pub default_expiration: Option<String>,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key))
    }

    /// 通过任意键值来源构建配置，缺少必填项时返回 `VarError::NotPresent`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let optional = |key: &str| lookup(key).ok().filter(|v| !v.trim().is_empty());

        Ok(Config {
            cache_server: lookup("CACHE_SERVER")?,
            cache_db: optional("CACHE_DB")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            cache_password: optional("CACHE_PASSWORD"),
            cache_timeout_secs: optional("CACHE_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            cookie_name: optional("COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.into()),
            cookie_secret: lookup("COOKIE_SECRET")?,
            default_expiration: optional("DEFAULT_SESSION_EXPIRATION"),
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "::".into()),
            server_port: optional("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        })
    }

    pub fn cache_url(&self) -> String {
        match &self.cache_password {
            Some(password) => format!(
                "redis://:{}@{}/{}",
                password, self.cache_server, self.cache_db
            ),
            None => format!("redis://{}/{}", self.cache_server, self.cache_db),
        }
    }

    pub fn cache_timeout(&self) -> Option<Duration> {
        self.cache_timeout_secs.map(Duration::from_secs)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            cookie_name: self.cookie_name.clone(),
            cookie_secret: self.cookie_secret.clone(),
            default_expiration: self.default_expiration.clone(),
        }
    }
}

/// 会话存储所需的配置，构建 `Store` 时显式传入
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub cookie_name: String,
    pub cookie_secret: String,
    /// 默认有效期 (秒)，保留原始文本，在需要计算过期时间时才解析
    pub default_expiration: Option<String>,
}

impl StoreConfig {
    pub fn default_expiration(&self) -> Result<i64, ConfigError> {
        let raw = self
            .default_expiration
            .as_deref()
            .ok_or(ConfigError::MissingDefaultExpiration)?;

        raw.trim()
            .parse::<u32>()
            .map(i64::from)
            .map_err(|source| ConfigError::InvalidDefaultExpiration {
                value: raw.to_string(),
                source,
            })
    }
}
