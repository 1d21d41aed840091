use std::fmt;
use std::str::FromStr;

/// Fixed channel of one event kind
///
/// The string form is the transport subject. Channel names are permanent:
/// a name is never reused for a different payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    TicketCreated,
    TicketUpdated,
    OrderCreated,
    OrderCancelled,
    ExpirationComplete,
    PaymentCreated,
}

/// Prefix of the dead-letter channel of every channel
pub const DEAD_LETTER_PREFIX: &str = "dlq";

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::TicketCreated,
        Channel::TicketUpdated,
        Channel::OrderCreated,
        Channel::OrderCancelled,
        Channel::ExpirationComplete,
        Channel::PaymentCreated,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Channel::TicketCreated => "ticket.created",
            Channel::TicketUpdated => "ticket.updated",
            Channel::OrderCreated => "order.created",
            Channel::OrderCancelled => "order.cancelled",
            Channel::ExpirationComplete => "expiration.complete",
            Channel::PaymentCreated => "payment.created",
        }
    }

    /// Channel that receives deliveries given up on by a listener
    pub fn dead_letter(self) -> String {
        format!("{DEAD_LETTER_PREFIX}.{}", self.as_str())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| format!("unknown channel: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_channel_names_are_unique() {
        let names: HashSet<&str> = Channel::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }

    #[test]
    fn test_parse_round_trips_every_channel() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>(), Ok(channel));
        }
        assert!("order.updated".parse::<Channel>().is_err());
    }

    #[test]
    fn test_dead_letter_channel() {
        assert_eq!(Channel::OrderCancelled.dead_letter(), "dlq.order.cancelled");
    }
}
