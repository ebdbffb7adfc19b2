use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use hearth_core::address::Address;
use hearth_core::alert::AlertType;
use hearth_core::events::DomainEvent;
use hearth_core::ids::{IncidentId, PlaceId};
use hearth_core::incident::{AlarmIncident, AlertState, MonitoringState, TrackerEvent, TrackerState};
use hearth_core::trigger::Trigger;
use hearth_ports::outbound::{EventPublisher, IncidentStore};
use hearth_ports::types::{IncidentQuery, PagedResults};

use crate::error::AppError;

/// Drives incidents through prealert, alert, dispatch and cancellation.
///
/// Every write goes through [`save`](Self::save), which persists the new
/// snapshot and then announces it: the full attribute map for a new
/// incident, the diff against the previous snapshot otherwise.
pub struct IncidentService<S, EP>
where
    S: IncidentStore,
    EP: EventPublisher,
{
    incidents: S,
    events: EP,
}

impl<S, EP> IncidentService<S, EP>
where
    S: IncidentStore,
    EP: EventPublisher,
{
    pub fn new(incidents: S, events: EP) -> Self {
        Self { incidents, events }
    }

    pub async fn get(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
    ) -> Result<AlarmIncident, AppError> {
        self.incidents
            .find_by_id(place_id, incident_id)
            .await?
            .ok_or_else(|| AppError::NotFound(incident_id.to_string()))
    }

    pub async fn current(&self, place_id: PlaceId) -> Result<Option<AlarmIncident>, AppError> {
        Ok(self.incidents.current(place_id).await?)
    }

    pub async fn latest(&self, place_id: PlaceId) -> Result<Option<AlarmIncident>, AppError> {
        Ok(self.incidents.latest(place_id).await?)
    }

    pub async fn list(
        &self,
        query: &IncidentQuery,
    ) -> Result<PagedResults<AlarmIncident>, AppError> {
        Ok(self.incidents.list_incidents_by_query(query).await?)
    }

    /// Opens a new incident in prealert, unless one is already open at the
    /// place, in which case that one is returned untouched.
    pub async fn add_prealert(
        &self,
        place_id: PlaceId,
        alarm: &str,
        prealert_end_time: DateTime<Utc>,
        pro_monitored: bool,
        now: DateTime<Utc>,
    ) -> Result<AlarmIncident, AppError> {
        if let Some(current) = self.incidents.current(place_id).await? {
            return Ok(current);
        }

        let alert_type: AlertType = alarm.parse()?;
        let incident = AlarmIncident::builder()
            .with_id(IncidentId::at(now))
            .with_place_id(place_id)
            .with_alert_state(AlertState::Prealert)
            .with_prealert_end_time(Some(prealert_end_time))
            .with_monitored(is_monitored(pro_monitored, alert_type, None))
            .add_alert_type(alert_type)
            .add_tracker_event(TrackerEvent::for_alert(
                alert_type,
                TrackerState::Prealert,
                None,
                now,
            ))
            .build()?;

        self.save(None, &incident, now).await?;
        info!(incident_id = %incident.id(), place_id = %place_id, alarm, "incident opened in prealert");
        Ok(incident)
    }

    /// Raises `alarm` at the place: opens an incident in alert, or escalates
    /// and merges into the one already open.
    pub async fn add_alert(
        &self,
        place_id: PlaceId,
        alarm: &str,
        triggers: &[Trigger],
        pro_monitored: bool,
        now: DateTime<Utc>,
    ) -> Result<AlarmIncident, AppError> {
        let alert_type: AlertType = alarm.parse()?;
        let current = self.incidents.current(place_id).await?;
        let event = TrackerEvent::for_alert(alert_type, TrackerState::Alert, None, now);

        let builder = match &current {
            None => AlarmIncident::builder()
                .with_id(IncidentId::at(now))
                .with_place_id(place_id)
                .with_alert_state(AlertState::Alert)
                .add_tracker_event(event),
            Some(current) if current.alert_state() != AlertState::Alert => {
                AlarmIncident::builder_from(current)
                    .with_alert_state(AlertState::Alert)
                    .add_tracker_event(event)
            }
            // verified during prealert: the platform is already in alert but
            // the hub has not reported the transition yet
            Some(current) if current.hub_alert_state() == Some(AlertState::Prealert) => {
                AlarmIncident::builder_from(current).with_hub_alert_state(Some(AlertState::Alert))
            }
            Some(current) => AlarmIncident::builder_from(current),
        };

        let incident = builder
            .add_alert_type(alert_type)
            .with_monitored(is_monitored(pro_monitored, alert_type, current.as_ref()))
            .build()?;

        self.save(current.as_ref(), &incident, now).await?;
        info!(incident_id = %incident.id(), place_id = %place_id, alarm, "alert added");

        match DomainEvent::alert_raised(&incident, alert_type, triggers, now) {
            Ok(event) => self.publish(vec![event]).await,
            Err(e) => warn!(incident_id = %incident.id(), alarm, error = %e, "unable to announce alert"),
        }
        Ok(incident)
    }

    /// Flags the incident as tracked by the hub as well, seeding the hub
    /// state from the current alert state.
    pub async fn mark_hub_local(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        now: DateTime<Utc>,
    ) -> Result<AlarmIncident, AppError> {
        let incident = self.get(place_id, incident_id).await?;
        if incident.hub_alert_state().is_some() {
            return Ok(incident);
        }
        let updated = AlarmIncident::builder_from(&incident)
            .with_hub_alarm(true)
            .build()?;
        self.save(Some(&incident), &updated, now).await?;
        Ok(updated)
    }

    /// Records the state the hub reports. A hub completing after the
    /// platform side already finished completes the incident.
    pub async fn update_hub_state(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        state: AlertState,
        now: DateTime<Utc>,
    ) -> Result<AlarmIncident, AppError> {
        let incident = self.get(place_id, incident_id).await?;
        if incident.is_cleared() {
            debug!(incident_id = %incident_id, hub_state = %state, "ignoring hub state for cleared incident");
            return Ok(incident);
        }

        let updated = AlarmIncident::builder_from(&incident)
            .with_hub_alert_state(Some(state))
            .build()?;

        if state == AlertState::Complete && incident.platform_alert_state() == AlertState::Complete {
            debug!(incident_id = %incident_id, "hub cleared after platform, completing incident");
            let cancelled_by = incident.cancelled_by().cloned();
            return self.complete(&incident, &updated, cancelled_by, now).await;
        }

        if updated != incident {
            self.save(Some(&incident), &updated, now).await?;
        }
        Ok(updated)
    }

    /// Applies a monitoring-center update as a compare-and-set on the stored
    /// monitoring state. Returns `false` when a concurrent writer got there
    /// first or the transition is out of order; nothing is written then.
    pub async fn on_monitoring_update(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        new_state: MonitoringState,
        custom_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let incident = self.get(place_id, incident_id).await?;

        let applied = self
            .incidents
            .update_monitoring_state(place_id, incident_id, new_state)
            .await?;
        if !applied {
            debug!(
                incident_id = %incident_id,
                from = %incident.monitoring_state(),
                to = %new_state,
                "monitoring update rejected"
            );
            return Ok(false);
        }

        let stored = self.get(place_id, incident_id).await?;
        let old_state = new_state.required_prior();
        let mut builder = AlarmIncident::builder_from(&stored).with_monitoring_state(new_state);
        if let Some(tracker_state) = new_state.tracker_state_from(Some(old_state)) {
            builder = builder.add_tracker_event(TrackerEvent::for_alert(
                stored.alert(),
                tracker_state,
                custom_message,
                now,
            ));
        }
        let updated = builder.build()?;

        self.save(Some(&incident), &updated, now).await?;
        info!(incident_id = %incident_id, from = %old_state, to = %new_state, "monitoring state updated");
        Ok(true)
    }

    /// Marks the incident confirmed. Returns the verification time, or
    /// `None` when it was confirmed already.
    pub async fn verify(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let incident = self.get(place_id, incident_id).await?;
        if incident.alert_state() == AlertState::Complete {
            return Err(AppError::InvalidRequest(
                "can't verify a completed incident".into(),
            ));
        }
        if incident.is_confirmed() {
            return Ok(None);
        }

        let updated = AlarmIncident::builder_from(&incident)
            .with_confirmed(true)
            .build()?;
        self.save(Some(&incident), &updated, now).await?;
        debug!(incident_id = %incident_id, "incident verified");
        Ok(Some(now))
    }

    /// Cancels the incident. It completes at once unless the hub still holds
    /// it open; then the platform side is marked complete and the incident
    /// waits for [`update_hub_state`](Self::update_hub_state).
    ///
    /// A dispatch still pending is called off through the monitoring
    /// compare-and-set. One already in flight is left alone so its outcome
    /// can still be recorded.
    pub async fn cancel(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        cancelled_by: Address,
        now: DateTime<Utc>,
    ) -> Result<AlarmIncident, AppError> {
        let mut announced = self.get(place_id, incident_id).await?;
        if announced.is_cleared() {
            debug!(incident_id = %incident_id, "incident already complete");
            return Ok(announced);
        }

        let mut incident = announced.clone();
        if incident.monitoring_state() == MonitoringState::Pending
            && self
                .incidents
                .update_monitoring_state(place_id, incident_id, MonitoringState::Cancelled)
                .await?
        {
            debug!(incident_id = %incident_id, "pending dispatch called off");
            let stored = self.get(place_id, incident_id).await?;
            let mut builder = AlarmIncident::builder_from(&stored);
            if let Some(state) =
                MonitoringState::Cancelled.tracker_state_from(Some(MonitoringState::Pending))
            {
                builder = builder.add_tracker_event(TrackerEvent::for_alert(
                    stored.alert(),
                    state,
                    None,
                    now,
                ));
            }
            incident = builder.build()?;
        }

        if matches!(incident.alert_state(), AlertState::Prealert | AlertState::Alert) {
            let mut builder =
                AlarmIncident::builder_from(&incident).with_alert_state(AlertState::Cancelling);
            // a hub that already cleared stays cleared
            if incident.hub_alert_state() == Some(AlertState::Complete) {
                builder = builder.with_hub_alert_state(Some(AlertState::Complete));
            }
            let updated = builder.build()?;
            self.save(Some(&announced), &updated, now).await?;
            incident = updated;
            announced = incident.clone();
        }

        match incident.hub_alert_state() {
            None | Some(AlertState::Complete) => {
                self.complete(&announced, &incident, Some(cancelled_by), now)
                    .await
            }
            Some(_) if incident.platform_alert_state() == AlertState::Complete => {
                if incident != announced {
                    self.save(Some(&announced), &incident, now).await?;
                }
                debug!(incident_id = %incident_id, "platform already cleared, waiting for hub");
                Ok(incident)
            }
            Some(_) => {
                let updated = AlarmIncident::builder_from(&incident)
                    .with_platform_alert_state(AlertState::Complete)
                    .with_cancelled_by(Some(cancelled_by))
                    .build()?;
                self.save(Some(&announced), &updated, now).await?;
                debug!(incident_id = %incident_id, "platform cleared, waiting for hub");
                Ok(updated)
            }
        }
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let purged = self.incidents.purge_expired(now).await?;
        if purged > 0 {
            info!(purged, "expired incidents purged");
        }
        Ok(purged)
    }

    /// Completes `staged`, announcing the change relative to `previous`.
    async fn complete(
        &self,
        previous: &AlarmIncident,
        staged: &AlarmIncident,
        cancelled_by: Option<Address>,
        now: DateTime<Utc>,
    ) -> Result<AlarmIncident, AppError> {
        let completed = AlarmIncident::builder_from(staged)
            .with_alert_state(AlertState::Complete)
            .with_cancelled_by(cancelled_by)
            .with_end_time(Some(now))
            .add_tracker_event(TrackerEvent::for_alert(
                staged.alert(),
                TrackerState::Cancelled,
                None,
                now,
            ))
            .build()?;
        self.save(Some(previous), &completed, now).await?;
        info!(incident_id = %completed.id(), place_id = %completed.place_id(), "incident completed");
        Ok(completed)
    }

    async fn save(
        &self,
        previous: Option<&AlarmIncident>,
        updated: &AlarmIncident,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut events = Vec::new();
        match previous {
            None => events.push(DomainEvent::added(updated, now)),
            Some(previous) => {
                let changes = updated.diff(previous)?;
                if !changes.is_empty() {
                    events.push(DomainEvent::changed(updated, changes, now));
                }
            }
        }
        if updated.is_cleared() && !previous.is_some_and(AlarmIncident::is_cleared) {
            events.push(DomainEvent::completed(updated, now));
        }

        self.incidents.upsert(updated).await?;
        self.publish(events).await;
        Ok(())
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.events.publish(events).await {
            warn!(error = %e, "failed to publish incident events");
        }
    }
}

fn is_monitored(pro_monitored: bool, alert: AlertType, current: Option<&AlarmIncident>) -> bool {
    if !pro_monitored {
        return false;
    }
    alert.is_monitored_type()
        || current.is_some_and(|c| {
            c.alert().is_monitored_type()
                || c.additional_alerts().iter().any(AlertType::is_monitored_type)
        })
}
