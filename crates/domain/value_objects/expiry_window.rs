use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryUnit {
    Minute,
    Hour,
    Day,
}

/// Hosted-link lifetime as the gateway displays it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub unit: ExpiryUnit,
    pub duration: i64,
}

impl ExpiryWindow {
    /// Sizes the window for `expired_at - now` using the coarsest unit that
    /// still yields at least one: days from 24 hours up, hours from one hour
    /// up, minutes otherwise. Returns `None` when the deadline is not in the
    /// future.
    pub fn until(expired_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Self> {
        let remaining = expired_at.signed_duration_since(now);
        if remaining <= chrono::Duration::zero() {
            return None;
        }

        let window = if remaining.num_hours() >= 24 {
            Self {
                unit: ExpiryUnit::Day,
                duration: remaining.num_days(),
            }
        } else if remaining.num_hours() >= 1 {
            Self {
                unit: ExpiryUnit::Hour,
                duration: remaining.num_hours(),
            }
        } else {
            Self {
                unit: ExpiryUnit::Minute,
                duration: remaining.num_minutes().max(1),
            }
        };

        Some(window)
    }
}
