use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hearth_core::events::DomainEvent;
use hearth_core::ids::{IncidentId, PlaceId};
use hearth_core::incident::{AlarmIncident, MonitoringState};

use crate::error::PortError;
use crate::types::{IncidentQuery, PagedResults};

/// Durable store of incidents, partitioned by place.
///
/// Rows that cannot be decoded are reported as absent rather than failing the
/// read. Cleared incidents are retained for a bounded period and then vanish.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn find_by_id(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
    ) -> Result<Option<AlarmIncident>, PortError>;

    /// Most recently created incident at the place, cleared or not.
    async fn latest(&self, place_id: PlaceId) -> Result<Option<AlarmIncident>, PortError>;

    /// The latest incident, if it is still open.
    async fn current(&self, place_id: PlaceId) -> Result<Option<AlarmIncident>, PortError>;

    async fn list_incidents_by_query(
        &self,
        query: &IncidentQuery,
    ) -> Result<PagedResults<AlarmIncident>, PortError>;

    async fn upsert(&self, incident: &AlarmIncident) -> Result<(), PortError>;

    /// Conditional write: applies only when the stored monitoring state is
    /// `new_state.required_prior()`. `Ok(false)` means the precondition did
    /// not hold (or the incident does not exist) and nothing was written.
    async fn update_monitoring_state(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        new_state: MonitoringState,
    ) -> Result<bool, PortError>;

    async fn delete(&self, place_id: PlaceId, incident_id: IncidentId) -> Result<(), PortError>;

    /// Removes incidents whose retention window ended at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, PortError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError>;
}
