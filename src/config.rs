//! Environment configuration.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::audit::nats::DEFAULT_AUDIT_SUBJECT;
use crate::remote::ClientOptions;
use crate::sync::{ExecutorSettings, OrchestratorSettings, MAX_PAGE_SIZE};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub audit_subject: String,
    pub listen_addr: SocketAddr,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: u32,
    pub request_interval: Duration,
    pub http_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub query_string_auth: bool,
    pub rate_limit_retries: u32,
    pub retry_backoff: Duration,
    pub stale_lock: Duration,
    pub max_concurrent_phases: usize,
    /// `None` disables the scheduler.
    pub schedule_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            request_interval: Duration::from_millis(250),
            http_timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            query_string_auth: false,
            rate_limit_retries: 3,
            retry_backoff: Duration::from_millis(1000),
            stale_lock: Duration::from_secs(7200),
            max_concurrent_phases: 4,
            schedule_interval: None,
        }
    }
}

impl SyncConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.http_timeout,
            min_interval: self.request_interval,
            accept_invalid_certs: self.accept_invalid_certs,
            query_string_auth: self.query_string_auth,
        }
    }

    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings> {
        Ok(OrchestratorSettings {
            executor: ExecutorSettings {
                page_size: self.page_size,
                rate_limit_retries: self.rate_limit_retries,
                retry_backoff: self.retry_backoff,
            },
            stale_lock: chrono::Duration::from_std(self.stale_lock).context("SYNC_STALE_LOCK_SECS out of range")?,
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = SyncConfig::default();

        let port: u16 = parse_or(get("PORT"), "PORT", 8083)?;
        let sync = SyncConfig {
            page_size: parse_or(get("SYNC_PAGE_SIZE"), "SYNC_PAGE_SIZE", defaults.page_size)?.clamp(1, MAX_PAGE_SIZE),
            request_interval: Duration::from_millis(parse_or(get("SYNC_REQUEST_INTERVAL_MS"), "SYNC_REQUEST_INTERVAL_MS", 250)?),
            http_timeout: Duration::from_secs(parse_or(get("SYNC_HTTP_TIMEOUT_SECS"), "SYNC_HTTP_TIMEOUT_SECS", 30)?.max(1)),
            accept_invalid_certs: parse_flag(get("SYNC_ACCEPT_INVALID_CERTS"), "SYNC_ACCEPT_INVALID_CERTS")?,
            query_string_auth: parse_flag(get("SYNC_QUERY_STRING_AUTH"), "SYNC_QUERY_STRING_AUTH")?,
            rate_limit_retries: parse_or(get("SYNC_RATE_LIMIT_RETRIES"), "SYNC_RATE_LIMIT_RETRIES", defaults.rate_limit_retries)?,
            retry_backoff: Duration::from_millis(parse_or(get("SYNC_RETRY_BACKOFF_MS"), "SYNC_RETRY_BACKOFF_MS", 1000)?),
            stale_lock: Duration::from_secs(parse_or(get("SYNC_STALE_LOCK_SECS"), "SYNC_STALE_LOCK_SECS", 7200)?),
            max_concurrent_phases: parse_or(get("SYNC_MAX_CONCURRENT_PHASES"), "SYNC_MAX_CONCURRENT_PHASES", defaults.max_concurrent_phases)?.max(1),
            schedule_interval: get("SYNC_SCHEDULE_INTERVAL_SECS")
                .map(|raw| parse::<u64>(&raw, "SYNC_SCHEDULE_INTERVAL_SECS"))
                .transpose()?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            audit_subject: get("NATS_AUDIT_SUBJECT").unwrap_or_else(|| DEFAULT_AUDIT_SUBJECT.to_string()),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            sync,
        })
    }
}

fn parse<T: FromStr>(raw: &str, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| anyhow!("invalid value for {name}: {err}"))
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |raw| parse(&raw, name))
}

fn parse_flag(raw: Option<String>, name: &str) -> Result<bool> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("invalid flag for {name}: {other}")),
    }
}
