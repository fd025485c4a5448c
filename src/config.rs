use anyhow::Result;
use figment::{providers::Env, Figment};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration for the driver process (dispatch loop + admin server).
///
/// Loaded from `LOADLAB_`-prefixed environment variables, after a
/// best-effort `.env` load. The out-of-the-box defaults leave the
/// dispatch loop disabled (`request_interval_ms = request_count = 0`).
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_target_url")]
    pub target_url: String,
    /// Tick period in milliseconds. Zero disables dispatch.
    #[serde(default)]
    pub request_interval_ms: u64,
    /// Requests launched per tick. Zero disables dispatch.
    #[serde(default)]
    pub request_count: u32,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Upper bound on concurrent in-flight sends, across ticks.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

/// Configuration for the responder process.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Simulated processing latency per request, in milliseconds.
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
}

fn default_http_port() -> u16 {
    8080
}
fn default_target_url() -> String {
    "http://localhost:8080/api/load".to_string()
}
fn default_mode() -> String {
    "unknown".to_string()
}
fn default_max_inflight() -> usize {
    256
}
fn default_response_delay_ms() -> u64 {
    10
}

/// Configuration problems that leave a component idle rather than
/// aborting the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "dispatch disabled: request_count={request_count}, request_interval_ms={request_interval_ms} (both must be > 0)"
    )]
    DispatchDisabled {
        request_count: u32,
        request_interval_ms: u64,
    },
}

impl DriverConfig {
    pub fn load() -> Result<Self> {
        load_env()
    }

    /// The dispatch loop runs iff both the burst size and the tick
    /// period are positive.
    pub fn validate_dispatch(&self) -> Result<(), ConfigError> {
        if self.request_count == 0 || self.request_interval_ms == 0 {
            return Err(ConfigError::DispatchDisabled {
                request_count: self.request_count,
                request_interval_ms: self.request_interval_ms,
            });
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}

impl ResponderConfig {
    pub fn load() -> Result<Self> {
        load_env()
    }

    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}

fn load_env<T: DeserializeOwned>() -> Result<T> {
    // No .env is the normal case in containerized deployments.
    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env file loaded");
    }
    let figment = Figment::new().merge(Env::prefixed("LOADLAB_"));
    Ok(figment.extract()?)
}
