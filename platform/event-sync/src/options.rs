//! Listener configuration

use event_bus::{BusError, BusResult, SubscribeOptions, DEFAULT_ACK_WAIT};
use std::env;
use std::time::Duration;

/// How a service consumes one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Durable consumer group of the service; keep it stable across restarts
    pub queue_group: String,
    /// Time a delivery may stay unacked before it is redelivered
    pub ack_wait: Duration,
    /// Deliveries processed concurrently by one listener
    pub max_in_flight: usize,
    /// Give up on a delivery at this attempt and move it to the dead-letter
    /// channel. `None` redelivers forever.
    pub dead_letter_after: Option<u32>,
}

impl ListenerOptions {
    pub fn new(queue_group: impl Into<String>) -> Self {
        Self {
            queue_group: queue_group.into(),
            ack_wait: DEFAULT_ACK_WAIT,
            max_in_flight: 1,
            dead_letter_after: None,
        }
    }

    /// Options for `service`, overridden by `QUEUE_GROUP_PREFIX`,
    /// `ACK_WAIT_SECS`, `MAX_IN_FLIGHT` and `DLQ_AFTER_ATTEMPTS`
    ///
    /// The queue group is `<prefix>-<service>`, or just `<service>` when no
    /// prefix is set.
    pub fn from_env(service: &str) -> BusResult<Self> {
        let queue_group = match env::var("QUEUE_GROUP_PREFIX") {
            Ok(prefix) if !prefix.is_empty() => format!("{prefix}-{service}"),
            _ => service.to_string(),
        };

        let ack_wait_secs = parse_var("ACK_WAIT_SECS", DEFAULT_ACK_WAIT.as_secs())?;
        if ack_wait_secs == 0 {
            return Err(BusError::ConfigError(
                "ACK_WAIT_SECS must be at least 1".to_string(),
            ));
        }

        let max_in_flight = parse_var("MAX_IN_FLIGHT", 1usize)?;
        if max_in_flight == 0 {
            return Err(BusError::ConfigError(
                "MAX_IN_FLIGHT must be at least 1".to_string(),
            ));
        }

        let dead_letter_after = match env::var("DLQ_AFTER_ATTEMPTS") {
            Ok(raw) if !raw.is_empty() => {
                let attempts: u32 = raw.parse().map_err(|_| {
                    BusError::ConfigError(format!("DLQ_AFTER_ATTEMPTS has an invalid value: {raw}"))
                })?;
                if attempts == 0 {
                    return Err(BusError::ConfigError(
                        "DLQ_AFTER_ATTEMPTS must be at least 1".to_string(),
                    ));
                }
                Some(attempts)
            }
            _ => None,
        };

        Ok(Self {
            queue_group,
            ack_wait: Duration::from_secs(ack_wait_secs),
            max_in_flight,
            dead_letter_after,
        })
    }

    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_dead_letter_after(mut self, attempts: u32) -> Self {
        self.dead_letter_after = Some(attempts.max(1));
        self
    }

    pub(crate) fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions::new(self.queue_group.clone()).with_ack_wait(self.ack_wait)
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "QUEUE_GROUP_PREFIX",
            "ACK_WAIT_SECS",
            "MAX_IN_FLIGHT",
            "DLQ_AFTER_ATTEMPTS",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let options = ListenerOptions::from_env("orders-service").unwrap();

        assert_eq!(options, ListenerOptions::new("orders-service"));
        assert_eq!(options.ack_wait, Duration::from_secs(30));
        assert_eq!(options.max_in_flight, 1);
        assert_eq!(options.dead_letter_after, None);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("QUEUE_GROUP_PREFIX", "staging");
        env::set_var("ACK_WAIT_SECS", "5");
        env::set_var("MAX_IN_FLIGHT", "8");
        env::set_var("DLQ_AFTER_ATTEMPTS", "10");

        let options = ListenerOptions::from_env("payments-service").unwrap();
        clear_env();

        assert_eq!(options.queue_group, "staging-payments-service");
        assert_eq!(options.ack_wait, Duration::from_secs(5));
        assert_eq!(options.max_in_flight, 8);
        assert_eq!(options.dead_letter_after, Some(10));
    }

    #[test]
    #[serial]
    fn test_zero_values_are_rejected() {
        for var in ["ACK_WAIT_SECS", "MAX_IN_FLIGHT", "DLQ_AFTER_ATTEMPTS"] {
            clear_env();
            env::set_var(var, "0");

            let result = ListenerOptions::from_env("tickets-service");
            clear_env();

            assert!(matches!(result, Err(BusError::ConfigError(_))), "{var}=0 accepted");
        }
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        clear_env();
        env::set_var("ACK_WAIT_SECS", "half a minute");

        let result = ListenerOptions::from_env("tickets-service");
        clear_env();

        assert!(matches!(result, Err(BusError::ConfigError(_))));
    }

    #[test]
    fn test_subscribe_options_carry_group_and_ack_wait() {
        let options = ListenerOptions::new("expiration-service").with_ack_wait(Duration::from_secs(2));
        let subscribe = options.subscribe_options();

        assert_eq!(subscribe.queue_group, "expiration-service");
        assert_eq!(subscribe.ack_wait, Duration::from_secs(2));
    }
}
