use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};

use hearth_core::address::Address;
use hearth_core::alert::AlertType;
use hearth_core::ids::{AlertInstanceId, IncidentId, PlaceId};
use hearth_core::incident::{AlarmIncident, AlertState, MonitoringState, TrackerEvent};
use hearth_ports::error::PortError;
use hearth_ports::outbound::IncidentStore;
use hearth_ports::types::{IncidentQuery, PagedResults};

use super::{decode_time, encode_time, SqliteDb};

const COLUMNS: &str = "place_id, incident_id, alert_state, platform_state, hub_state, \
     active_alerts, additional_alerts, alert, cancelled_by, prealert_end_time, end_time, \
     monitoring_state, tracker, mock_incident, monitored, confirmed";

/// Rows past their retention window are invisible even before they are purged.
const LIVE: &str = "(expires_at IS NULL OR expires_at > ?)";

#[async_trait]
impl IncidentStore for SqliteDb {
    async fn find_by_id(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
    ) -> Result<Option<AlarmIncident>, PortError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM alarm_incidents
             WHERE place_id = ? AND incident_id = ? AND {LIVE}"
        );
        let row = sqlx::query(&sql)
            .bind(place_id.to_string())
            .bind(incident_id.to_string())
            .bind(encode_time(Utc::now()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(row.and_then(|row| decode_or_skip(&row)))
    }

    async fn latest(&self, place_id: PlaceId) -> Result<Option<AlarmIncident>, PortError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM alarm_incidents
             WHERE place_id = ? AND {LIVE}
             ORDER BY incident_id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(place_id.to_string())
            .bind(encode_time(Utc::now()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(row.and_then(|row| decode_or_skip(&row)))
    }

    async fn current(&self, place_id: PlaceId) -> Result<Option<AlarmIncident>, PortError> {
        Ok(self
            .latest(place_id)
            .await?
            .filter(|incident| !incident.is_cleared()))
    }

    async fn list_incidents_by_query(
        &self,
        query: &IncidentQuery,
    ) -> Result<PagedResults<AlarmIncident>, PortError> {
        let limit = query.effective_limit() as usize;
        let token = query
            .token
            .as_deref()
            .map(IncidentId::parse)
            .transpose()
            .map_err(|e| PortError::Decode(format!("invalid page token: {e}")))?;

        let mut sql = format!("SELECT {COLUMNS} FROM alarm_incidents WHERE place_id = ? AND {LIVE}");
        if token.is_some() {
            sql.push_str(" AND incident_id <= ?");
        }
        sql.push_str(" ORDER BY incident_id DESC LIMIT ?");

        let mut q = sqlx::query(&sql)
            .bind(query.place_id.to_string())
            .bind(encode_time(Utc::now()));
        if let Some(token) = token {
            q = q.bind(token.to_string());
        }
        // one extra row tells us where the next page starts
        let mut rows = q
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        let next_token = if rows.len() > limit {
            let next = rows
                .get(limit)
                .map(|row| column::<String>(row, "incident_id"))
                .transpose()?;
            rows.truncate(limit);
            next
        } else {
            None
        };

        let results = rows.iter().filter_map(decode_or_skip).collect();
        Ok(PagedResults {
            results,
            next_token,
        })
    }

    async fn upsert(&self, incident: &AlarmIncident) -> Result<(), PortError> {
        let active_alerts: Vec<String> = incident
            .active_alerts()
            .iter()
            .map(ToString::to_string)
            .collect();
        let additional_alerts: Vec<&str> = incident
            .additional_alerts()
            .iter()
            .map(AlertType::as_str)
            .collect();
        let tracker = incident
            .tracker()
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        let active_alerts = serde_json::to_string(&active_alerts)
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        let additional_alerts = serde_json::to_string(&additional_alerts)
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        let tracker =
            serde_json::to_string(&tracker).map_err(|e| PortError::Persistence(e.to_string()))?;

        // open incidents are kept until they clear
        let expires_at = match incident.end_time() {
            None => None,
            Some(_) => {
                let expires = Utc::now()
                    .checked_add_signed(self.incident_ttl)
                    .ok_or_else(|| {
                        PortError::Persistence(format!(
                            "retention of {}s is out of range",
                            self.incident_ttl.num_seconds()
                        ))
                    })?;
                Some(encode_time(expires))
            }
        };

        let sql = format!(
            "INSERT INTO alarm_incidents ({COLUMNS}, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(place_id, incident_id) DO UPDATE SET
                alert_state = excluded.alert_state,
                platform_state = excluded.platform_state,
                hub_state = excluded.hub_state,
                active_alerts = excluded.active_alerts,
                additional_alerts = excluded.additional_alerts,
                alert = excluded.alert,
                cancelled_by = excluded.cancelled_by,
                prealert_end_time = excluded.prealert_end_time,
                end_time = excluded.end_time,
                monitoring_state = excluded.monitoring_state,
                tracker = excluded.tracker,
                mock_incident = excluded.mock_incident,
                monitored = excluded.monitored,
                confirmed = excluded.confirmed,
                expires_at = excluded.expires_at"
        );

        sqlx::query(&sql)
            .bind(incident.place_id().to_string())
            .bind(incident.id().to_string())
            .bind(incident.alert_state().as_str())
            .bind(incident.platform_alert_state().as_str())
            .bind(incident.hub_alert_state().map(|s| s.as_str()))
            .bind(&active_alerts)
            .bind(&additional_alerts)
            .bind(incident.alert().as_str())
            .bind(incident.cancelled_by().map(Address::representation))
            .bind(incident.prealert_end_time().map(encode_time))
            .bind(incident.end_time().map(encode_time))
            .bind(incident.monitoring_state().as_str())
            .bind(&tracker)
            .bind(incident.is_mock_incident())
            .bind(incident.is_monitored())
            .bind(incident.is_confirmed())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn update_monitoring_state(
        &self,
        place_id: PlaceId,
        incident_id: IncidentId,
        new_state: MonitoringState,
    ) -> Result<bool, PortError> {
        let required = new_state.required_prior();
        let sql = format!(
            "UPDATE alarm_incidents SET monitoring_state = ?
             WHERE place_id = ? AND incident_id = ? AND monitoring_state = ? AND {LIVE}"
        );
        let result = sqlx::query(&sql)
            .bind(new_state.as_str())
            .bind(place_id.to_string())
            .bind(incident_id.to_string())
            .bind(required.as_str())
            .bind(encode_time(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        let applied = result.rows_affected() > 0;
        if !applied {
            tracing::debug!(
                incident_id = %incident_id,
                required = %required,
                new_state = %new_state,
                "monitoring state precondition failed"
            );
        }
        Ok(applied)
    }

    async fn delete(&self, place_id: PlaceId, incident_id: IncidentId) -> Result<(), PortError> {
        sqlx::query("DELETE FROM alarm_incidents WHERE place_id = ? AND incident_id = ?")
            .bind(place_id.to_string())
            .bind(incident_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, PortError> {
        let result = sqlx::query(
            "DELETE FROM alarm_incidents WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(encode_time(now))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

fn decode_or_skip(row: &SqliteRow) -> Option<AlarmIncident> {
    match decode_incident(row) {
        Ok(incident) => Some(incident),
        Err(e) => {
            let incident_id = row.try_get::<String, _>("incident_id").unwrap_or_default();
            tracing::warn!(incident_id = %incident_id, error = %e, "skipping undecodable incident row");
            None
        }
    }
}

fn decode_incident(row: &SqliteRow) -> Result<AlarmIncident, PortError> {
    let hub_state = column::<Option<String>>(row, "hub_state")?
        .map(|s| parse::<AlertState>(&s))
        .transpose()?;
    let cancelled_by = column::<Option<String>>(row, "cancelled_by")?
        .map(|s| Address::parse(&s).map_err(decode_error))
        .transpose()?;
    let prealert_end_time = column::<Option<String>>(row, "prealert_end_time")?
        .map(|s| decode_time(&s))
        .transpose()?;
    let end_time = column::<Option<String>>(row, "end_time")?
        .map(|s| decode_time(&s))
        .transpose()?;

    let active_alerts = json_list(row, "active_alerts")?
        .iter()
        .map(|s| AlertInstanceId::parse(s).map_err(decode_error))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let additional_alerts = json_list(row, "additional_alerts")?
        .iter()
        .map(|s| parse::<AlertType>(s))
        .collect::<Result<BTreeSet<_>, _>>()?;

    AlarmIncident::builder()
        .with_id(IncidentId::parse(&column::<String>(row, "incident_id")?).map_err(decode_error)?)
        .with_place_id(PlaceId::parse(&column::<String>(row, "place_id")?).map_err(decode_error)?)
        .with_alert(parse(&column::<String>(row, "alert")?)?)
        .with_alert_state(parse(&column::<String>(row, "alert_state")?)?)
        .with_platform_alert_state(parse(&column::<String>(row, "platform_state")?)?)
        .with_hub_alert_state(hub_state)
        .add_additional_alerts(additional_alerts)
        .add_active_alert_ids(active_alerts)
        .with_cancelled_by(cancelled_by)
        .with_prealert_end_time(prealert_end_time)
        .with_end_time(end_time)
        .with_monitoring_state(parse(&column::<String>(row, "monitoring_state")?)?)
        .add_tracker_events(decode_tracker(row)?)
        .with_mock_incident(column(row, "mock_incident")?)
        .with_monitored(column(row, "monitored")?)
        .with_confirmed(column(row, "confirmed")?)
        .build()
        .map_err(decode_error)
}

/// Tracker entries are encoded one by one; a bad entry is dropped without
/// losing the rest of the journal.
fn decode_tracker(row: &SqliteRow) -> Result<Vec<TrackerEvent>, PortError> {
    let entries = json_list(row, "tracker")?;
    Ok(entries
        .iter()
        .filter_map(|entry| match serde_json::from_str::<TrackerEvent>(entry) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable tracker entry");
                None
            }
        })
        .collect())
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, PortError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(decode_error)
}

fn json_list(row: &SqliteRow, name: &str) -> Result<Vec<String>, PortError> {
    let raw: String = column(row, name)?;
    serde_json::from_str(&raw).map_err(decode_error)
}

fn parse<T>(value: &str) -> Result<T, PortError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(decode_error)
}

fn decode_error(e: impl std::fmt::Display) -> PortError {
    PortError::Decode(e.to_string())
}
