use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Settlement,
    Expire,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Settlement => "settlement",
            PaymentStatus::Expire => "expire",
        }
    }

    /// Upper-cased label used as the event name and in event payloads.
    pub fn event_label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Settlement => "SETTLEMENT",
            PaymentStatus::Expire => "EXPIRE",
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            PaymentStatus::Pending => 100,
            PaymentStatus::Settlement => 200,
            PaymentStatus::Expire => 300,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            100 => Some(PaymentStatus::Pending),
            200 => Some(PaymentStatus::Settlement),
            300 => Some(PaymentStatus::Expire),
            _ => None,
        }
    }

    /// Pending may move to Settlement or Expire; terminal states never move.
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (
                PaymentStatus::Pending,
                PaymentStatus::Settlement | PaymentStatus::Expire
            )
        )
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
