use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::{NoContext, Timestamp, Uuid};

use crate::error::DomainError;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, DomainError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| DomainError::InvalidId(stringify!($name).into()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(PlaceId);
define_id!(AlertInstanceId);

/// Time-ordered incident identifier.
///
/// Backed by a version 7 UUID: the leading 48 bits are the creation time in
/// unix milliseconds, so byte order (and the canonical string order) is
/// creation order. The embedded time is the incident's start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IncidentId(Uuid);

impl IncidentId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// An id whose embedded start time is `at` (millisecond precision).
    pub fn at(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis().max(0) as u64;
        let ts = Timestamp::from_unix(
            NoContext,
            millis / 1_000,
            ((millis % 1_000) * 1_000_000) as u32,
        );
        Self(Uuid::new_v7(ts))
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let uuid = Uuid::parse_str(s).map_err(|_| DomainError::InvalidId("IncidentId".into()))?;
        if uuid.get_version_num() != 7 {
            return Err(DomainError::InvalidId("IncidentId".into()));
        }
        Ok(Self(uuid))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
            .get_timestamp()
            .and_then(|ts| {
                let (secs, nanos) = ts.to_unix();
                DateTime::from_timestamp(secs as i64, nanos)
            })
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for IncidentId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IncidentId> for String {
    fn from(id: IncidentId) -> Self {
        id.to_string()
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

    #[test]
    fn parse_valid_uuid_succeeds() {
        let id = PlaceId::new();
        let parsed = PlaceId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_invalid_uuid_fails() {
        let result = PlaceId::parse("not-a-uuid");
        assert_eq!(result, Err(DomainError::InvalidId("PlaceId".into())));
    }

    #[test]
    fn incident_id_embeds_start_time() {
        let at = ts("2025-01-15T10:00:00.250Z");
        let id = IncidentId::at(at);
        assert_eq!(id.timestamp(), at);
    }

    #[test]
    fn incident_ids_sort_by_creation_time() {
        let earlier = IncidentId::at(ts("2025-01-15T10:00:00Z"));
        let later = IncidentId::at(ts("2025-01-15T10:00:01Z"));
        assert!(earlier < later);
        assert!(earlier.to_string() < later.to_string());
    }

    #[test]
    fn incident_id_rejects_random_uuid() {
        let random = PlaceId::new().to_string();
        assert_eq!(
            IncidentId::parse(&random),
            Err(DomainError::InvalidId("IncidentId".into()))
        );
    }

    #[test]
    fn incident_id_round_trips_through_string() {
        let id = IncidentId::new();
        assert_eq!(IncidentId::parse(&id.to_string()).unwrap(), id);
    }
}
