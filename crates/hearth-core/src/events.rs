use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::alert::AlertType;
use crate::error::DomainError;
use crate::ids::{IncidentId, PlaceId};
use crate::incident::AlarmIncident;
use crate::trigger::Trigger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DomainEvent {
    IncidentAdded(IncidentAdded),
    IncidentChanged(IncidentChanged),
    IncidentCompleted(IncidentCompleted),
    AlertRaised(AlertRaised),
}

impl DomainEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::IncidentAdded(e) => e.occurred_at,
            Self::IncidentChanged(e) => e.occurred_at,
            Self::IncidentCompleted(e) => e.occurred_at,
            Self::AlertRaised(e) => e.occurred_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::IncidentAdded(_) => "incident.added",
            Self::IncidentChanged(_) => "incident.changed",
            Self::IncidentCompleted(_) => "incident.completed",
            Self::AlertRaised(_) => "incident.alert_raised",
        }
    }

    pub fn incident_id(&self) -> IncidentId {
        match self {
            Self::IncidentAdded(e) => e.incident_id,
            Self::IncidentChanged(e) => e.incident_id,
            Self::IncidentCompleted(e) => e.incident_id,
            Self::AlertRaised(e) => e.incident_id,
        }
    }

    pub fn place_id(&self) -> PlaceId {
        match self {
            Self::IncidentAdded(e) => e.place_id,
            Self::IncidentChanged(e) => e.place_id,
            Self::IncidentCompleted(e) => e.place_id,
            Self::AlertRaised(e) => e.place_id,
        }
    }

    /// Announces a newly stored incident with its full attribute snapshot.
    pub fn added(incident: &AlarmIncident, occurred_at: DateTime<Utc>) -> Self {
        Self::IncidentAdded(IncidentAdded {
            incident_id: incident.id(),
            place_id: incident.place_id(),
            attributes: incident.as_map(),
            occurred_at,
        })
    }

    pub fn changed(
        incident: &AlarmIncident,
        changes: BTreeMap<String, Value>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::IncidentChanged(IncidentChanged {
            incident_id: incident.id(),
            place_id: incident.place_id(),
            changes,
            occurred_at,
        })
    }

    pub fn completed(incident: &AlarmIncident, occurred_at: DateTime<Utc>) -> Self {
        Self::IncidentCompleted(IncidentCompleted {
            incident_id: incident.id(),
            place_id: incident.place_id(),
            cancelled: incident.is_cancelled(),
            occurred_at,
        })
    }

    /// Per-type announcement that `alert` fired within `incident`, carrying
    /// the triggers that caused it.
    pub fn alert_raised(
        incident: &AlarmIncident,
        alert: AlertType,
        triggers: &[Trigger],
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Ok(Self::AlertRaised(AlertRaised {
            incident_id: incident.id(),
            place_id: incident.place_id(),
            event_name: alert.to_event()?,
            alert,
            triggers: triggers.iter().map(Trigger::to_map).collect(),
            occurred_at,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentAdded {
    pub incident_id: IncidentId,
    pub place_id: PlaceId,
    pub attributes: BTreeMap<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentChanged {
    pub incident_id: IncidentId,
    pub place_id: PlaceId,
    pub changes: BTreeMap<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentCompleted {
    pub incident_id: IncidentId,
    pub place_id: PlaceId,
    pub cancelled: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRaised {
    pub incident_id: IncidentId,
    pub place_id: PlaceId,
    pub alert: AlertType,
    pub event_name: &'static str,
    pub triggers: Vec<BTreeMap<String, Value>>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::incident::{attr, AlertState};
    use crate::trigger::TriggerEvent;

    fn now() -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2025-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn incident() -> AlarmIncident {
        AlarmIncident::builder()
            .with_id(IncidentId::at(now()))
            .with_place_id(PlaceId::new())
            .with_alert_state(AlertState::Alert)
            .with_alert(AlertType::Security)
            .build()
            .unwrap()
    }

    #[test]
    fn event_types_are_unique_strings() {
        let incident = incident();
        let events = [
            DomainEvent::added(&incident, now()),
            DomainEvent::changed(&incident, BTreeMap::new(), now()),
            DomainEvent::completed(&incident, now()),
            DomainEvent::alert_raised(&incident, AlertType::Security, &[], now()).unwrap(),
        ];
        let mut unique = std::collections::HashSet::new();
        for e in &events {
            assert!(unique.insert(e.event_type()), "duplicate event type: {}", e.event_type());
        }
    }

    #[test]
    fn added_event_carries_full_snapshot() {
        let incident = incident();
        let event = DomainEvent::added(&incident, now());
        assert_eq!(event.event_type(), "incident.added");
        assert_eq!(event.incident_id(), incident.id());
        assert_eq!(event.place_id(), incident.place_id());
        if let DomainEvent::IncidentAdded(e) = &event {
            assert_eq!(e.attributes, incident.as_map());
        } else {
            panic!("expected IncidentAdded");
        }
    }

    #[test]
    fn completed_event_reports_cancellation() {
        let incident = AlarmIncident::builder_from(&incident())
            .with_alert_state(AlertState::Complete)
            .with_cancelled_by(Some(Address::person("p1")))
            .with_end_time(Some(now()))
            .build()
            .unwrap();
        let event = DomainEvent::completed(&incident, now());
        assert_eq!(event.occurred_at(), now());
        match event {
            DomainEvent::IncidentCompleted(e) => assert!(e.cancelled),
            other => panic!("expected IncidentCompleted, got {other:?}"),
        }
    }

    #[test]
    fn changed_event_serializes_changes() {
        let incident = incident();
        let changes = BTreeMap::from([(attr::ALERT_STATE.to_string(), Value::from("CANCELLING"))]);
        let event = DomainEvent::changed(&incident, changes, now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json["IncidentChanged"]["changes"][attr::ALERT_STATE],
            Value::from("CANCELLING")
        );
    }

    #[test]
    fn alert_raised_names_the_wire_event_and_triggers() {
        let incident = incident();
        let trigger = Trigger::builder()
            .with_source(Address::device("d1"))
            .with_time(now())
            .with_alarm(AlertType::Security)
            .with_event(TriggerEvent::Motion)
            .build()
            .unwrap();
        let event =
            DomainEvent::alert_raised(&incident, AlertType::Security, &[trigger.clone()], now())
                .unwrap();
        match event {
            DomainEvent::AlertRaised(e) => {
                assert_eq!(e.event_name, "incident:SecurityAlert");
                assert_eq!(e.triggers, vec![trigger.to_map()]);
            }
            other => panic!("expected AlertRaised, got {other:?}"),
        }
    }

    #[test]
    fn alert_raised_rejects_types_without_event() {
        let result = DomainEvent::alert_raised(&incident(), AlertType::Weather, &[], now());
        assert_eq!(
            result,
            Err(DomainError::UnsupportedAlertEvent("WEATHER".into()))
        );
    }
}
