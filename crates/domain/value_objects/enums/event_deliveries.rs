use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// How the reconcile workflow hands its domain event to the message topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventDelivery {
    /// Publish right after the store transaction commits.
    #[default]
    Direct,
    /// Write the event into `payment_outbox` inside the transaction and let the
    /// worker publish it.
    Outbox,
}

impl EventDelivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventDelivery::Direct => "direct",
            EventDelivery::Outbox => "outbox",
        }
    }
}

impl FromStr for EventDelivery {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "direct" => Ok(EventDelivery::Direct),
            "outbox" => Ok(EventDelivery::Outbox),
            other => Err(format!("Unsupported event delivery: {}", other)),
        }
    }
}

impl Display for EventDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
