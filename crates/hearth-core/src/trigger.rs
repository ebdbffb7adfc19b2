use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::alert::AlertType;
use crate::error::DomainError;

pub const ATTR_SOURCE: &str = "source";
pub const ATTR_TIME: &str = "time";
pub const ATTR_SIGNALLED: &str = "signalled";
pub const ATTR_ALARM: &str = "alarm";
pub const ATTR_EVENT: &str = "event";

/// What kind of sensor activity produced a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerEvent {
    Motion,
    Contact,
    Glass,
    Keypad,
    Smoke,
    Co,
    Rule,
    Leak,
    Behavior,
    VerifiedAlarm,
}

impl TriggerEvent {
    pub const ALL: [TriggerEvent; 10] = [
        Self::Motion,
        Self::Contact,
        Self::Glass,
        Self::Keypad,
        Self::Smoke,
        Self::Co,
        Self::Rule,
        Self::Leak,
        Self::Behavior,
        Self::VerifiedAlarm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motion => "MOTION",
            Self::Contact => "CONTACT",
            Self::Glass => "GLASS",
            Self::Keypad => "KEYPAD",
            Self::Smoke => "SMOKE",
            Self::Co => "CO",
            Self::Rule => "RULE",
            Self::Leak => "LEAK",
            Self::Behavior => "BEHAVIOR",
            Self::VerifiedAlarm => "VERIFIED_ALARM",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerEvent {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| DomainError::UnknownState {
                kind: "trigger event",
                value: s.into(),
            })
    }
}

/// One signal that contributed to an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    source: Address,
    time: DateTime<Utc>,
    signalled: bool,
    alarm: AlertType,
    event: TriggerEvent,
}

impl Trigger {
    pub fn builder() -> TriggerBuilder {
        TriggerBuilder::default()
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Whether the trigger has already been forwarded to the alarm logic.
    pub fn is_signalled(&self) -> bool {
        self.signalled
    }

    pub fn alarm(&self) -> AlertType {
        self.alarm
    }

    pub fn event(&self) -> TriggerEvent {
        self.event
    }

    /// Equality ignoring the `signalled` flag, used when merging a freshly
    /// reported trigger with one that was already forwarded.
    pub fn equals_other_than_signalled(&self, other: &Trigger) -> bool {
        self.source == other.source
            && self.time == other.time
            && self.alarm == other.alarm
            && self.event == other.event
    }

    pub fn copy(&self) -> Trigger {
        self.clone()
    }

    pub fn with_signalled(&self, signalled: bool) -> Trigger {
        Trigger {
            signalled,
            ..self.clone()
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            (ATTR_SOURCE.into(), Value::from(self.source.representation())),
            (ATTR_TIME.into(), Value::from(self.time.timestamp_millis())),
            (ATTR_SIGNALLED.into(), Value::from(self.signalled)),
            (ATTR_ALARM.into(), Value::from(self.alarm.as_str())),
            (ATTR_EVENT.into(), Value::from(self.event.as_str())),
        ])
    }
}

#[derive(Debug, Default)]
pub struct TriggerBuilder {
    source: Option<Address>,
    time: Option<DateTime<Utc>>,
    signalled: bool,
    alarm: Option<AlertType>,
    event: Option<TriggerEvent>,
}

impl TriggerBuilder {
    pub fn with_source(mut self, source: Address) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_signalled(mut self, signalled: bool) -> Self {
        self.signalled = signalled;
        self
    }

    pub fn with_alarm(mut self, alarm: AlertType) -> Self {
        self.alarm = Some(alarm);
        self
    }

    pub fn with_event(mut self, event: TriggerEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn build(self) -> Result<Trigger, DomainError> {
        Ok(Trigger {
            source: self.source.ok_or(DomainError::MissingField("source"))?,
            time: self.time.ok_or(DomainError::MissingField("time"))?,
            signalled: self.signalled,
            alarm: self.alarm.ok_or(DomainError::MissingField("alarm"))?,
            event: self.event.ok_or(DomainError::MissingField("event"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn make_trigger(signalled: bool) -> Trigger {
        Trigger::builder()
            .with_source(Address::device("motion-1"))
            .with_time(ts("2025-01-15T10:00:00Z"))
            .with_signalled(signalled)
            .with_alarm(AlertType::Security)
            .with_event(TriggerEvent::Motion)
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_source() {
        let result = Trigger::builder()
            .with_time(ts("2025-01-15T10:00:00Z"))
            .with_alarm(AlertType::Security)
            .with_event(TriggerEvent::Motion)
            .build();
        assert_eq!(result, Err(DomainError::MissingField("source")));
    }

    #[test]
    fn build_requires_event() {
        let result = Trigger::builder()
            .with_source(Address::device("motion-1"))
            .with_time(ts("2025-01-15T10:00:00Z"))
            .with_alarm(AlertType::Security)
            .build();
        assert_eq!(result, Err(DomainError::MissingField("event")));
    }

    #[test]
    fn signalled_flag_breaks_full_equality_only() {
        let a = make_trigger(false);
        let b = make_trigger(true);
        assert_ne!(a, b);
        assert!(a.equals_other_than_signalled(&b));
    }

    #[test]
    fn different_event_is_not_equal_other_than_signalled() {
        let a = make_trigger(false);
        let b = Trigger::builder()
            .with_source(Address::device("motion-1"))
            .with_time(ts("2025-01-15T10:00:00Z"))
            .with_alarm(AlertType::Security)
            .with_event(TriggerEvent::Contact)
            .build()
            .unwrap();
        assert!(!a.equals_other_than_signalled(&b));
    }

    #[test]
    fn with_signalled_leaves_original_untouched() {
        let original = make_trigger(false);
        let sent = original.with_signalled(true);
        assert!(!original.is_signalled());
        assert!(sent.is_signalled());
        assert_eq!(original.copy(), original);
    }

    #[test]
    fn to_map_uses_wire_names() {
        let map = make_trigger(true).to_map();
        assert_eq!(map[ATTR_EVENT], Value::from("MOTION"));
        assert_eq!(map[ATTR_ALARM], Value::from("SECURITY"));
        assert_eq!(map[ATTR_SOURCE], Value::from("DRIV:dev:motion-1"));
        assert_eq!(map[ATTR_SIGNALLED], Value::from(true));
    }
}
