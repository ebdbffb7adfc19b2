mod event;
mod incident;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use hearth_ports::error::PortError;

/// Retention of cleared incidents unless configured otherwise: 30 days.
pub const DEFAULT_INCIDENT_TTL_SECS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
    incident_ttl: Duration,
}

impl SqliteDb {
    pub async fn new(url: &str) -> Result<Self, PortError> {
        Self::with_options(
            url,
            DEFAULT_MAX_CONNECTIONS,
            Duration::seconds(DEFAULT_INCIDENT_TTL_SECS),
        )
        .await
    }

    pub async fn with_options(
        url: &str,
        max_connections: u32,
        incident_ttl: Duration,
    ) -> Result<Self, PortError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| PortError::Connection(e.to_string()))?;

        let db = Self { pool, incident_ttl };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), PortError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alarm_incidents (
                place_id TEXT NOT NULL,
                incident_id TEXT NOT NULL,
                alert_state TEXT NOT NULL,
                platform_state TEXT NOT NULL,
                hub_state TEXT,
                active_alerts TEXT NOT NULL,
                additional_alerts TEXT NOT NULL,
                alert TEXT NOT NULL,
                cancelled_by TEXT,
                prealert_end_time TEXT,
                end_time TEXT,
                monitoring_state TEXT NOT NULL,
                tracker TEXT NOT NULL,
                mock_incident INTEGER NOT NULL DEFAULT 0,
                monitored INTEGER NOT NULL DEFAULT 0,
                confirmed INTEGER NOT NULL DEFAULT 0,
                expires_at TEXT,
                PRIMARY KEY (place_id, incident_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        // incident ids sort by creation time, so this is newest-first per place
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alarm_incidents_recent
             ON alarm_incidents(place_id, incident_id DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alarm_incidents_expiry
             ON alarm_incidents(expires_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                place_id TEXT NOT NULL,
                incident_id TEXT NOT NULL,
                data TEXT NOT NULL,
                occurred_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn incident_ttl(&self) -> Duration {
        self.incident_ttl
    }
}

/// Fixed-width UTC timestamps, so text comparison in SQL is time order.
pub(crate) fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_time(value: &str) -> Result<DateTime<Utc>, PortError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PortError::Decode(format!("invalid timestamp {value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_times_sort_chronologically() {
        let earlier = DateTime::parse_from_rfc3339("2025-01-15T10:00:09.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2025-01-15T10:00:10Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(encode_time(later), "2025-01-15T10:00:10.000000000Z");
        assert!(encode_time(earlier) < encode_time(later));
        assert_eq!(decode_time(&encode_time(earlier)).unwrap(), earlier);
    }

    #[test]
    fn decode_time_rejects_garbage() {
        assert!(matches!(decode_time("yesterday"), Err(PortError::Decode(_))));
    }

    #[tokio::test]
    async fn schema_bootstrap_is_idempotent() {
        let ttl = Duration::seconds(DEFAULT_INCIDENT_TTL_SECS);
        let db = SqliteDb::with_options("sqlite::memory:", 1, ttl)
            .await
            .unwrap();
        db.init_schema().await.unwrap();
        assert_eq!(db.incident_ttl(), Duration::days(30));
    }
}
