use async_trait::async_trait;

use hearth_core::events::DomainEvent;
use hearth_ports::error::PortError;
use hearth_ports::outbound::EventPublisher;

use super::{encode_time, SqliteDb};

/// Appends events to the `events` table, in order, in one transaction.
#[async_trait]
impl EventPublisher for SqliteDb {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Connection(e.to_string()))?;

        for event in &events {
            let data =
                serde_json::to_string(event).map_err(|e| PortError::Persistence(e.to_string()))?;

            sqlx::query(
                "INSERT INTO events (event_type, place_id, incident_id, data, occurred_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(event.event_type())
            .bind(event.place_id().to_string())
            .bind(event.incident_id().to_string())
            .bind(&data)
            .bind(encode_time(event.occurred_at()))
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }
}
