pub mod state;
pub mod tracker;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::address::Address;
use crate::alert::AlertType;
use crate::error::DomainError;
use crate::ids::{AlertInstanceId, IncidentId, PlaceId};

pub use state::{AlertState, MonitoringState, TrackerState};
pub use tracker::TrackerEvent;

pub const NAMESPACE: &str = "incident";
pub const MOCK_NAMESPACE: &str = "incidentmock";
pub const BASE_NAMESPACE: &str = "base";

/// Attribute names of the incident's wire snapshot.
pub mod attr {
    pub const ID: &str = "base:id";
    pub const TYPE: &str = "base:type";
    pub const CAPS: &str = "base:caps";
    pub const ADDRESS: &str = "base:address";
    pub const PLACE_ID: &str = "incident:placeId";
    pub const ALERT_STATE: &str = "incident:alertState";
    pub const PLATFORM_STATE: &str = "incident:platformState";
    pub const HUB_STATE: &str = "incident:hubState";
    pub const ALERT: &str = "incident:alert";
    pub const ADDITIONAL_ALERTS: &str = "incident:additionalAlerts";
    pub const MONITORING_STATE: &str = "incident:monitoringState";
    pub const START_TIME: &str = "incident:startTime";
    pub const PREALERT_END_TIME: &str = "incident:prealertEndTime";
    pub const END_TIME: &str = "incident:endTime";
    pub const CANCELLED: &str = "incident:cancelled";
    pub const CANCELLED_BY: &str = "incident:cancelledBy";
    pub const TRACKER: &str = "incident:tracker";
    pub const MONITORED: &str = "incident:monitored";
    pub const CONFIRMED: &str = "incident:confirmed";
}

/// Immutable snapshot of one alarm episode.
///
/// Produced only by [`Builder::build`]; every change goes through
/// [`AlarmIncident::builder_from`] and yields a new snapshot, so two
/// snapshots of the same incident can always be compared with
/// [`AlarmIncident::diff`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmIncident {
    id: IncidentId,
    place_id: PlaceId,
    alert_state: AlertState,
    platform_alert_state: AlertState,
    hub_alert_state: Option<AlertState>,
    alert: AlertType,
    additional_alerts: BTreeSet<AlertType>,
    monitoring_state: MonitoringState,
    active_alerts: BTreeSet<AlertInstanceId>,
    prealert_end_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    cancelled_by: Option<Address>,
    tracker: Vec<TrackerEvent>,
    mock_incident: bool,
    monitored: bool,
    confirmed: bool,
}

impl AlarmIncident {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// A builder seeded with every field of `existing`.
    pub fn builder_from(existing: &AlarmIncident) -> Builder {
        Builder {
            id: Some(existing.id),
            place_id: Some(existing.place_id),
            alert_state: Some(existing.alert_state),
            platform_alert_state: Some(existing.platform_alert_state),
            hub_alert_state: existing.hub_alert_state,
            alert: Some(existing.alert),
            additional_alerts: existing.additional_alerts.clone(),
            monitoring_state: existing.monitoring_state,
            active_alerts: existing.active_alerts.clone(),
            prealert_end_time: existing.prealert_end_time,
            end_time: existing.end_time,
            cancelled_by: existing.cancelled_by.clone(),
            tracker: existing.tracker.clone(),
            mock_incident: existing.mock_incident,
            monitored: existing.monitored,
            confirmed: existing.confirmed,
            hub_alarm: existing.hub_alert_state.is_some(),
        }
    }

    pub fn id(&self) -> IncidentId {
        self.id
    }

    pub fn place_id(&self) -> PlaceId {
        self.place_id
    }

    pub fn alert_state(&self) -> AlertState {
        self.alert_state
    }

    /// Same as [`alert_state`](Self::alert_state) unless the platform side
    /// finished ahead of the hub.
    pub fn platform_alert_state(&self) -> AlertState {
        self.platform_alert_state
    }

    /// `None` for incidents the hub is not tracking locally.
    pub fn hub_alert_state(&self) -> Option<AlertState> {
        self.hub_alert_state
    }

    pub fn alert(&self) -> AlertType {
        self.alert
    }

    pub fn additional_alerts(&self) -> &BTreeSet<AlertType> {
        &self.additional_alerts
    }

    pub fn monitoring_state(&self) -> MonitoringState {
        self.monitoring_state
    }

    pub fn active_alerts(&self) -> &BTreeSet<AlertInstanceId> {
        &self.active_alerts
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.id.timestamp()
    }

    pub fn prealert_end_time(&self) -> Option<DateTime<Utc>> {
        self.prealert_end_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn cancelled_by(&self) -> Option<&Address> {
        self.cancelled_by.as_ref()
    }

    pub fn tracker(&self) -> &[TrackerEvent] {
        &self.tracker
    }

    pub fn is_mock_incident(&self) -> bool {
        self.mock_incident
    }

    pub fn is_monitored(&self) -> bool {
        self.monitored
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn is_cleared(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_by.is_some()
    }

    pub fn object_type(&self) -> &'static str {
        NAMESPACE
    }

    pub fn address(&self) -> Address {
        Address::platform_service(self.id, NAMESPACE)
    }

    pub fn caps(&self) -> Vec<&'static str> {
        if self.mock_incident {
            vec![BASE_NAMESPACE, NAMESPACE, MOCK_NAMESPACE]
        } else {
            vec![BASE_NAMESPACE, NAMESPACE]
        }
    }

    /// Full attribute snapshot, as broadcast when the incident is added.
    pub fn as_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::from([
            (attr::PLACE_ID.into(), Value::from(self.place_id.to_string())),
            (attr::ALERT_STATE.into(), Value::from(self.alert_state.as_str())),
            (
                attr::PLATFORM_STATE.into(),
                Value::from(self.platform_alert_state.as_str()),
            ),
            (attr::ADDITIONAL_ALERTS.into(), self.serialize_additional_alerts()),
            (attr::ALERT.into(), Value::from(self.alert.as_str())),
            (attr::CANCELLED.into(), Value::from(self.is_cancelled())),
            (
                attr::MONITORING_STATE.into(),
                Value::from(self.monitoring_state.as_str()),
            ),
            (
                attr::START_TIME.into(),
                Value::from(self.start_time().timestamp_millis()),
            ),
            (attr::TRACKER.into(), self.serialize_tracker()),
            (attr::ID.into(), Value::from(self.id.to_string())),
            (attr::TYPE.into(), Value::from(self.object_type())),
            (attr::CAPS.into(), Value::from(self.caps())),
            (attr::ADDRESS.into(), Value::from(self.address().representation())),
            (attr::MONITORED.into(), Value::from(self.monitored)),
            (attr::CONFIRMED.into(), Value::from(self.confirmed)),
        ]);

        if let Some(end_time) = self.end_time {
            map.insert(attr::END_TIME.into(), Value::from(end_time.timestamp_millis()));
        }
        if let Some(prealert_end_time) = self.prealert_end_time {
            map.insert(
                attr::PREALERT_END_TIME.into(),
                Value::from(prealert_end_time.timestamp_millis()),
            );
        }
        if let Some(hub_state) = self.hub_alert_state {
            map.insert(attr::HUB_STATE.into(), Value::from(hub_state.as_str()));
        }
        if let Some(cancelled_by) = &self.cancelled_by {
            map.insert(
                attr::CANCELLED_BY.into(),
                Value::from(cancelled_by.representation()),
            );
        }
        map
    }

    /// Attributes that changed since `previous`, as broadcast on update.
    ///
    /// The tracker is compared by length only: it is append-only, so a
    /// longer journal is the only change that matters.
    pub fn diff(&self, previous: &AlarmIncident) -> Result<BTreeMap<String, Value>, DomainError> {
        if self.id != previous.id {
            return Err(DomainError::IncidentMismatch);
        }

        let mut changes = BTreeMap::new();
        if self.prealert_end_time != previous.prealert_end_time {
            changes.insert(
                attr::PREALERT_END_TIME.into(),
                Value::from(self.prealert_end_time.map(|t| t.timestamp_millis())),
            );
        }
        if self.end_time != previous.end_time {
            changes.insert(
                attr::END_TIME.into(),
                Value::from(self.end_time.map(|t| t.timestamp_millis())),
            );
        }
        if self.alert_state != previous.alert_state {
            changes.insert(attr::ALERT_STATE.into(), Value::from(self.alert_state.as_str()));
        }
        if self.platform_alert_state != previous.platform_alert_state {
            changes.insert(
                attr::PLATFORM_STATE.into(),
                Value::from(self.platform_alert_state.as_str()),
            );
        }
        if self.hub_alert_state != previous.hub_alert_state {
            changes.insert(
                attr::HUB_STATE.into(),
                Value::from(self.hub_alert_state.map(|s| s.as_str())),
            );
        }
        if self.monitoring_state != previous.monitoring_state {
            changes.insert(
                attr::MONITORING_STATE.into(),
                Value::from(self.monitoring_state.as_str()),
            );
        }
        if self.alert != previous.alert {
            changes.insert(attr::ALERT.into(), Value::from(self.alert.as_str()));
        }
        if self.additional_alerts != previous.additional_alerts {
            changes.insert(attr::ADDITIONAL_ALERTS.into(), self.serialize_additional_alerts());
        }
        if self.is_cancelled() != previous.is_cancelled() {
            changes.insert(attr::CANCELLED.into(), Value::from(self.is_cancelled()));
        }
        if self.cancelled_by != previous.cancelled_by {
            changes.insert(
                attr::CANCELLED_BY.into(),
                Value::from(self.cancelled_by.as_ref().map(Address::representation)),
            );
        }
        if self.tracker.len() != previous.tracker.len() {
            changes.insert(attr::TRACKER.into(), self.serialize_tracker());
        }
        if self.confirmed != previous.confirmed {
            changes.insert(attr::CONFIRMED.into(), Value::from(self.confirmed));
        }
        Ok(changes)
    }

    fn serialize_additional_alerts(&self) -> Value {
        self.additional_alerts
            .iter()
            .map(|a| Value::from(a.as_str()))
            .collect()
    }

    fn serialize_tracker(&self) -> Value {
        self.tracker
            .iter()
            .map(|te| Value::Object(te.to_map().into_iter().collect()))
            .collect()
    }
}

/// Transient, single-owner state for producing the next [`AlarmIncident`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    id: Option<IncidentId>,
    place_id: Option<PlaceId>,
    alert_state: Option<AlertState>,
    platform_alert_state: Option<AlertState>,
    hub_alert_state: Option<AlertState>,
    alert: Option<AlertType>,
    additional_alerts: BTreeSet<AlertType>,
    monitoring_state: MonitoringState,
    active_alerts: BTreeSet<AlertInstanceId>,
    prealert_end_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    cancelled_by: Option<Address>,
    tracker: Vec<TrackerEvent>,
    mock_incident: bool,
    monitored: bool,
    confirmed: bool,
    hub_alarm: bool,
}

impl Builder {
    pub fn with_id(mut self, id: IncidentId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_place_id(mut self, place_id: PlaceId) -> Self {
        self.place_id = Some(place_id);
        self
    }

    /// Moves the incident (and the platform view of it) to `state`. A
    /// hub-local incident follows along; call
    /// [`with_hub_alert_state`](Self::with_hub_alert_state) afterwards to
    /// let the hub diverge.
    pub fn with_alert_state(mut self, state: AlertState) -> Self {
        self.alert_state = Some(state);
        self.platform_alert_state = Some(state);
        if self.hub_alarm {
            self.hub_alert_state = Some(state);
        }
        self
    }

    pub fn with_platform_alert_state(mut self, state: AlertState) -> Self {
        self.platform_alert_state = Some(state);
        self
    }

    pub fn with_hub_alert_state(mut self, state: Option<AlertState>) -> Self {
        self.hub_alert_state = state;
        self.hub_alarm = state.is_some();
        self
    }

    pub fn with_hub_alarm(mut self, hub_alarm: bool) -> Self {
        self.hub_alarm = hub_alarm;
        if !hub_alarm {
            self.hub_alert_state = None;
        } else if self.hub_alert_state.is_none() {
            self.hub_alert_state = self.alert_state;
        }
        self
    }

    pub fn with_alert(mut self, alert: AlertType) -> Self {
        self.alert = Some(alert);
        self
    }

    pub fn add_additional_alert(mut self, alert: AlertType) -> Self {
        self.additional_alerts.insert(alert);
        self
    }

    pub fn add_additional_alerts(mut self, alerts: impl IntoIterator<Item = AlertType>) -> Self {
        self.additional_alerts.extend(alerts);
        self
    }

    pub fn remove_additional_alert(mut self, alert: AlertType) -> Self {
        self.additional_alerts.remove(&alert);
        self
    }

    pub fn remove_additional_alerts(mut self, alerts: impl IntoIterator<Item = AlertType>) -> Self {
        for alert in alerts {
            self.additional_alerts.remove(&alert);
        }
        self
    }

    pub fn with_monitoring_state(mut self, state: MonitoringState) -> Self {
        self.monitoring_state = state;
        self
    }

    pub fn with_prealert_end_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.prealert_end_time = time;
        self
    }

    pub fn with_end_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.end_time = time;
        self
    }

    pub fn with_cancelled_by(mut self, cancelled_by: Option<Address>) -> Self {
        self.cancelled_by = cancelled_by;
        self
    }

    pub fn with_mock_incident(mut self, mock_incident: bool) -> Self {
        self.mock_incident = mock_incident;
        self
    }

    pub fn with_monitored(mut self, monitored: bool) -> Self {
        self.monitored = monitored;
        self
    }

    pub fn with_confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    /// Merges an alarm by wire name; see [`add_alert_type`](Self::add_alert_type).
    pub fn add_alarm(self, alarm: &str) -> Result<Self, DomainError> {
        let alert_type = alarm.parse::<AlertType>()?;
        Ok(self.add_alert_type(alert_type))
    }

    /// The most severe alarm becomes primary; everything else that has
    /// fired is kept in the additional set.
    pub fn add_alert_type(mut self, new_alert: AlertType) -> Self {
        match self.alert {
            Some(current) if current <= new_alert => {
                if current != new_alert {
                    self.additional_alerts.insert(new_alert);
                }
            }
            Some(current) => {
                self.additional_alerts.insert(current);
                self.alert = Some(new_alert);
            }
            None => self.alert = Some(new_alert),
        }
        self
    }

    pub fn add_active_alert_id(mut self, alert_id: AlertInstanceId) -> Self {
        self.active_alerts.insert(alert_id);
        self
    }

    pub fn add_active_alert_ids(
        mut self,
        alert_ids: impl IntoIterator<Item = AlertInstanceId>,
    ) -> Self {
        self.active_alerts.extend(alert_ids);
        self
    }

    pub fn add_tracker_event(mut self, event: TrackerEvent) -> Self {
        self.tracker.push(event);
        self
    }

    pub fn add_tracker_events(mut self, events: impl IntoIterator<Item = TrackerEvent>) -> Self {
        self.tracker.extend(events);
        self
    }

    /// Requires an id, place, primary alert and alert state. Monitoring
    /// state defaults to `NONE`, and the platform state to the alert state.
    pub fn build(self) -> Result<AlarmIncident, DomainError> {
        let id = self.id.ok_or(DomainError::MissingField("id"))?;
        let place_id = self.place_id.ok_or(DomainError::MissingField("placeId"))?;
        let alert = self.alert.ok_or(DomainError::MissingField("alert"))?;
        let alert_state = self
            .alert_state
            .ok_or(DomainError::MissingField("alertState"))?;

        let mut tracker = self.tracker;
        tracker.sort_by_key(TrackerEvent::time);

        let mut additional_alerts = self.additional_alerts;
        additional_alerts.remove(&alert);

        let confirmed =
            self.confirmed || alert.is_auto_confirmed() || self.monitoring_state.is_confirmed();

        Ok(AlarmIncident {
            id,
            place_id,
            alert_state,
            platform_alert_state: self.platform_alert_state.unwrap_or(alert_state),
            hub_alert_state: self.hub_alert_state,
            alert,
            additional_alerts,
            monitoring_state: self.monitoring_state,
            active_alerts: self.active_alerts,
            prealert_end_time: self.prealert_end_time,
            end_time: self.end_time,
            cancelled_by: self.cancelled_by,
            tracker,
            mock_incident: self.mock_incident,
            monitored: self.monitored,
            confirmed,
        })
    }
}
