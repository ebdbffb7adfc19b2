use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::AlertType;

use super::state::TrackerState;

/// One entry of an incident's journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEvent {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    time: DateTime<Utc>,
    state: TrackerState,
    key: String,
    #[serde(default)]
    message: String,
}

impl TrackerEvent {
    pub fn new(
        time: DateTime<Utc>,
        state: TrackerState,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            time: to_millis(time),
            state,
            key: key.into(),
            message: message.into(),
        }
    }

    /// Builds the standard entry for `alert` entering `state`. A non-blank
    /// `custom_message` (e.g. relayed from the monitoring center) replaces
    /// the stock text.
    pub fn for_alert(
        alert: AlertType,
        state: TrackerState,
        custom_message: Option<&str>,
        time: DateTime<Utc>,
    ) -> Self {
        let key = format!(
            "{}.{}",
            alert.as_str().to_lowercase(),
            state.as_str().to_lowercase()
        );
        let message = match custom_message.map(str::trim) {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => stock_message(&key).unwrap_or_default().to_string(),
        };
        Self {
            time: to_millis(time),
            state,
            key,
            message,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("time".into(), Value::from(self.time.timestamp_millis())),
            ("state".into(), Value::from(self.state.as_str())),
            ("key".into(), Value::from(self.key.clone())),
            ("message".into(), Value::from(self.message.clone())),
        ])
    }
}

fn stock_message(key: &str) -> Option<&'static str> {
    let message = match key {
        "security.prealert" => "Grace Period Countdown",
        "security.dispatched" | "panic.dispatched" => "Police Notified",
        "smoke.dispatched" | "co.dispatched" => "Fire Dept. Notified",
        "security.dispatch_refused" | "panic.dispatch_refused" => "Police Not Responding",
        "smoke.dispatch_refused" | "co.dispatch_refused" => "Fire Dept. Not Responding",
        "panic.dispatch_cancelled" => "Police Dispatch Cancelled",
        "security.dispatch_cancelled" | "smoke.dispatch_cancelled" | "co.dispatch_cancelled" => {
            "Dispatch Cancellation Attempted"
        }
        _ => match key.split_once('.') {
            Some((_, "alert")) => "Alarm Triggered",
            Some((_, "dispatching")) => "Monitoring Station Alerted",
            Some((_, "dispatch_failed")) => "Monitoring Station Unavailable",
            Some((_, "cancelled")) => "",
            _ => return None,
        },
    };
    Some(message)
}

/// Entries are journaled at millisecond precision, the granularity of
/// their encoded form.
fn to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(time.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(time)
}
