//! Service configuration read from the environment (and `.env` via `dotenvy`).

use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// No URL means the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive number, got `{value}`")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            port: parse_or("PORT", value("PORT"), DEFAULT_PORT)?,
            database_url: value("DATABASE_URL"),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", value("DATABASE_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS)?,
            nats_url: value("NATS_URL"),
        })
    }

    pub fn bind_addr(&self) -> String { format!("0.0.0.0:{}", self.port) }
}

fn parse_or<T: FromStr + PartialOrd + Default>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.parse::<T>() {
            Ok(v) if v > T::default() => Ok(v),
            _ => Err(ConfigError::Invalid { name, value: raw }),
        },
    }
}
