//! Transport configuration read from the environment

use crate::consumer_retry::RetryConfig;
use crate::{BusError, BusResult};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Nats,
    InMemory,
}

impl BusType {
    pub fn from_env() -> Self {
        match env::var("BUS_TYPE")
            .unwrap_or_else(|_| "inmemory".to_string())
            .to_lowercase()
            .as_str()
        {
            "nats" => BusType::Nats,
            "inmemory" => BusType::InMemory,
            _ => {
                tracing::warn!("Unknown BUS_TYPE, defaulting to inmemory");
                BusType::InMemory
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub bus_type: BusType,
    pub nats_url: String,
    /// JetStream stream holding every channel of the platform
    pub stream_name: String,
    /// Subjects captured by the stream; ensured at connect time when non-empty
    pub stream_subjects: Vec<String>,
    /// Retry policy for the initial connection
    pub connect_retry: RetryConfig,
    /// Window in which a publish must be acknowledged
    pub publish_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_type: BusType::InMemory,
            nats_url: "nats://localhost:4222".to_string(),
            stream_name: "TICKETING_EVENTS".to_string(),
            stream_subjects: Vec::new(),
            connect_retry: RetryConfig {
                max_attempts: 5,
                initial_backoff: Duration::from_millis(500),
                max_backoff: Duration::from_secs(10),
            },
            publish_timeout: Duration::from_secs(5),
        }
    }
}

impl BusConfig {
    /// Configuration for tests and local development
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn from_env() -> BusResult<Self> {
        let defaults = Self::default();

        let nats_url = env::var("NATS_URL").unwrap_or(defaults.nats_url);
        let stream_name = env::var("NATS_STREAM").unwrap_or(defaults.stream_name);
        if stream_name.is_empty() {
            return Err(BusError::ConfigError("NATS_STREAM cannot be empty".to_string()));
        }

        let max_attempts = parse_var("NATS_CONNECT_ATTEMPTS", defaults.connect_retry.max_attempts)?;
        if max_attempts == 0 {
            return Err(BusError::ConfigError(
                "NATS_CONNECT_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let publish_timeout_ms = parse_var(
            "PUBLISH_TIMEOUT_MS",
            defaults.publish_timeout.as_millis() as u64,
        )?;

        Ok(Self {
            bus_type: BusType::from_env(),
            nats_url,
            stream_name,
            stream_subjects: defaults.stream_subjects,
            connect_retry: RetryConfig {
                max_attempts,
                ..defaults.connect_retry
            },
            publish_timeout: Duration::from_millis(publish_timeout_ms),
        })
    }

    pub fn with_stream_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream_subjects = subjects.into_iter().map(Into::into).collect();
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> BusResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| BusError::ConfigError(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
