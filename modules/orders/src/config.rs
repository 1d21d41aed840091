use std::env;
use std::time::Duration;

/// How long a new order holds its ticket before it expires
pub const DEFAULT_EXPIRATION_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdersConfig {
    pub expiration_window: Duration,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            expiration_window: DEFAULT_EXPIRATION_WINDOW,
        }
    }
}

impl OrdersConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let expiration_window = match env::var("ORDER_EXPIRATION_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "ORDER_EXPIRATION_SECS",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_EXPIRATION_WINDOW,
        };
        Ok(Self { expiration_window })
    }
}
