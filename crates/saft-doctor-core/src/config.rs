//! Client configuration
//!
//! Settings are read from the process environment (after loading a `.env` file
//! if one exists). Every value has a default except the credentials.

use std::env;
use std::time::Duration;

use crate::error::ClientError;
use crate::models::DEFAULT_CHUNK_SIZE;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const MAX_FIX_ITERATIONS: u32 = 20;
const FIX_DELAY_MS: u64 = 500;
const HEARTBEAT_INTERVAL_MS: u64 = 5000;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout; `None` leaves it to the transport
    pub request_timeout: Option<Duration>,
    /// Used when the backend does not suggest a chunk size
    pub default_chunk_size: u64,
    pub max_fix_iterations: u32,
    pub fix_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            username: None,
            password: None,
            request_timeout: None,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            max_fix_iterations: MAX_FIX_ITERATIONS,
            fix_delay: Duration::from_millis(FIX_DELAY_MS),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("SAFT_DOCTOR_API_URL")
            .or_else(|| non_empty("API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout = match non_empty("SAFT_DOCTOR_REQUEST_TIMEOUT_SECS") {
            Some(v) => Some(Duration::from_secs(v.trim().parse().map_err(|_| {
                ClientError::Config(
                    "SAFT_DOCTOR_REQUEST_TIMEOUT_SECS must be a valid number".to_string(),
                )
            })?)),
            None => None,
        };

        let config = ClientConfig {
            api_url,
            token: non_empty("SAFT_DOCTOR_TOKEN"),
            username: non_empty("SAFT_DOCTOR_USERNAME"),
            password: non_empty("SAFT_DOCTOR_PASSWORD"),
            request_timeout,
            default_chunk_size: non_empty("SAFT_DOCTOR_DEFAULT_CHUNK_SIZE")
                .unwrap_or_else(|| DEFAULT_CHUNK_SIZE.to_string())
                .trim()
                .parse()
                .map_err(|_| {
                    ClientError::Config(
                        "SAFT_DOCTOR_DEFAULT_CHUNK_SIZE must be a valid number".to_string(),
                    )
                })?,
            max_fix_iterations: non_empty("SAFT_DOCTOR_MAX_FIX_ITERATIONS")
                .unwrap_or_else(|| MAX_FIX_ITERATIONS.to_string())
                .trim()
                .parse()
                .map_err(|_| {
                    ClientError::Config(
                        "SAFT_DOCTOR_MAX_FIX_ITERATIONS must be a valid number".to_string(),
                    )
                })?,
            fix_delay: Duration::from_millis(
                non_empty("SAFT_DOCTOR_FIX_DELAY_MS")
                    .unwrap_or_else(|| FIX_DELAY_MS.to_string())
                    .trim()
                    .parse()
                    .unwrap_or(FIX_DELAY_MS),
            ),
            heartbeat_interval: Duration::from_millis(
                non_empty("SAFT_DOCTOR_HEARTBEAT_INTERVAL_MS")
                    .unwrap_or_else(|| HEARTBEAT_INTERVAL_MS.to_string())
                    .trim()
                    .parse()
                    .unwrap_or(HEARTBEAT_INTERVAL_MS),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ClientError::Config(
                "SAFT_DOCTOR_API_URL must be an http:// or https:// URL".to_string(),
            ));
        }

        if self.default_chunk_size == 0 {
            return Err(ClientError::Config(
                "SAFT_DOCTOR_DEFAULT_CHUNK_SIZE must be greater than zero".to_string(),
            ));
        }

        if self.max_fix_iterations == 0 {
            return Err(ClientError::Config(
                "SAFT_DOCTOR_MAX_FIX_ITERATIONS must be greater than zero".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(ClientError::Config(
                "SAFT_DOCTOR_HEARTBEAT_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ClientError::Config(
                "SAFT_DOCTOR_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
