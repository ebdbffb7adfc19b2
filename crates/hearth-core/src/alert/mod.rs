use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub const CO_ALERT_EVENT: &str = "incident:COAlert";
pub const SMOKE_ALERT_EVENT: &str = "incident:SmokeAlert";
pub const PANIC_ALERT_EVENT: &str = "incident:PanicAlert";
pub const SECURITY_ALERT_EVENT: &str = "incident:SecurityAlert";
pub const WATER_ALERT_EVENT: &str = "incident:WaterAlert";

/// Alarm category. Variants are declared most severe first, so the derived
/// `Ord` is the severity ranking: `a < b` means `a` outranks `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Co,
    Smoke,
    Panic,
    Security,
    Water,
    Weather,
    Care,
}

impl AlertType {
    pub const ALL: [AlertType; 7] = [
        Self::Co,
        Self::Smoke,
        Self::Panic,
        Self::Security,
        Self::Water,
        Self::Weather,
        Self::Care,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Co => "CO",
            Self::Smoke => "SMOKE",
            Self::Panic => "PANIC",
            Self::Security => "SECURITY",
            Self::Water => "WATER",
            Self::Weather => "WEATHER",
            Self::Care => "CARE",
        }
    }

    /// Life-safety alarms are confirmed as soon as they fire; the rest need
    /// a verification or a monitoring-center outcome.
    pub fn is_auto_confirmed(&self) -> bool {
        matches!(self, Self::Co | Self::Smoke | Self::Panic)
    }

    /// Whether a professional monitoring center ever handles this type.
    pub fn is_monitored_type(&self) -> bool {
        !matches!(self, Self::Water | Self::Weather | Self::Care)
    }

    /// Wire event name announcing an alert of this type.
    pub fn to_event(&self) -> Result<&'static str, DomainError> {
        match self {
            Self::Smoke => Ok(SMOKE_ALERT_EVENT),
            Self::Co => Ok(CO_ALERT_EVENT),
            Self::Panic => Ok(PANIC_ALERT_EVENT),
            Self::Security => Ok(SECURITY_ALERT_EVENT),
            Self::Water => Ok(WATER_ALERT_EVENT),
            other => Err(DomainError::UnsupportedAlertEvent(other.as_str().into())),
        }
    }

    pub fn from_event(message_type: &str) -> Result<Self, DomainError> {
        match message_type {
            SMOKE_ALERT_EVENT => Ok(Self::Smoke),
            CO_ALERT_EVENT => Ok(Self::Co),
            PANIC_ALERT_EVENT => Ok(Self::Panic),
            SECURITY_ALERT_EVENT => Ok(Self::Security),
            WATER_ALERT_EVENT => Ok(Self::Water),
            other => Err(DomainError::UnrecognizedAlertEvent(other.into())),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownAlertType(s.into()))
    }
}
