use crate::dispatcher::DEFAULT_CONTEXT_EXCHANGES;
use anyhow::{Context, Result};
use history::{CacheConfig, SweeperConfig, DEFAULT_MAX_CACHED_EXCHANGES};
use llm::ClientConfig;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server settings, read from the environment (a `.env` file is honoured).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub context_exchanges: usize,
    pub llm: ClientConfig,
    pub cache: CacheConfig,
    pub sweeper: SweeperConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: parse_var(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_var(&lookup, "PORT", 5000)?,
            db_path: lookup("HISTORY_DB_PATH")
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("historico.db")),
            context_exchanges: parse_var(&lookup, "CONTEXT_EXCHANGES", DEFAULT_CONTEXT_EXCHANGES)?,
            llm: ClientConfig::from_lookup(&lookup)?,
            cache: CacheConfig {
                max_exchanges: parse_var(&lookup, "CACHE_MAX_EXCHANGES", DEFAULT_MAX_CACHED_EXCHANGES)?,
            },
            sweeper: SweeperConfig {
                interval: Duration::from_secs(parse_var(&lookup, "SWEEP_INTERVAL_SECS", 900)?),
                max_idle: Duration::from_secs(parse_var(&lookup, "SESSION_IDLE_SECS", 3600)?),
                retry_backoff: Duration::from_secs(parse_var(&lookup, "SWEEP_RETRY_SECS", 60)?),
            },
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(default),
    }
}
