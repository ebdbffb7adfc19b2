use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// `as_str`, `Display` and `FromStr` over the persisted upper-case names.
macro_rules! wire_names {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(DomainError::UnknownState {
                        kind: $kind,
                        value: other.into(),
                    }),
                }
            }
        }
    };
}

/// Coarse phase of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Prealert,
    Alert,
    Cancelling,
    Complete,
}

wire_names!(AlertState, "alert state", {
    Prealert => "PREALERT",
    Alert => "ALERT",
    Cancelling => "CANCELLING",
    Complete => "COMPLETE",
});

/// Vocabulary of the incident journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerState {
    Prealert,
    Alert,
    Cancelled,
    Dispatching,
    Dispatched,
    DispatchRefused,
    DispatchFailed,
    DispatchCancelled,
}

wire_names!(TrackerState, "tracker state", {
    Prealert => "PREALERT",
    Alert => "ALERT",
    Cancelled => "CANCELLED",
    Dispatching => "DISPATCHING",
    Dispatched => "DISPATCHED",
    DispatchRefused => "DISPATCH_REFUSED",
    DispatchFailed => "DISPATCH_FAILED",
    DispatchCancelled => "DISPATCH_CANCELLED",
});

/// Progress of a third-party monitoring-center dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitoringState {
    #[default]
    None,
    Pending,
    Dispatching,
    Dispatched,
    Refused,
    Cancelled,
    Failed,
}

wire_names!(MonitoringState, "monitoring state", {
    None => "NONE",
    Pending => "PENDING",
    Dispatching => "DISPATCHING",
    Dispatched => "DISPATCHED",
    Refused => "REFUSED",
    Cancelled => "CANCELLED",
    Failed => "FAILED",
});

impl MonitoringState {
    /// Journal entry for entering this state, regardless of where it came from.
    pub fn tracker_state(&self) -> Option<TrackerState> {
        match self {
            Self::Dispatching => Some(TrackerState::Dispatching),
            Self::Dispatched => Some(TrackerState::Dispatched),
            Self::Failed => Some(TrackerState::DispatchFailed),
            Self::Refused => Some(TrackerState::DispatchRefused),
            Self::Cancelled => Some(TrackerState::DispatchCancelled),
            Self::None | Self::Pending => None,
        }
    }

    /// Journal entry for the transition `old -> self`, if any.
    pub fn tracker_state_from(&self, old: Option<MonitoringState>) -> Option<TrackerState> {
        match old {
            None => self.tracker_state(),
            Some(old) if old == *self => None,
            // an in-flight dispatch can't be retracted; the outcome is journaled instead
            Some(Self::Dispatching) if *self == Self::Cancelled => None,
            Some(_) => self.tracker_state(),
        }
    }

    /// States that prove a human or the monitoring center acted on the alarm.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Dispatched | Self::Cancelled | Self::Refused)
    }

    /// The state a stored incident must be in before it may move to `self`.
    pub fn required_prior(&self) -> MonitoringState {
        match self {
            Self::None | Self::Pending => Self::None,
            Self::Dispatching | Self::Cancelled => Self::Pending,
            Self::Dispatched => Self::Dispatching,
            Self::Refused | Self::Failed => Self::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_after_dispatching_is_not_journaled() {
        assert_eq!(
            MonitoringState::Cancelled.tracker_state_from(Some(MonitoringState::Dispatching)),
            None
        );
    }

    #[test]
    fn dispatched_after_dispatching_is_journaled() {
        assert_eq!(
            MonitoringState::Dispatched.tracker_state_from(Some(MonitoringState::Dispatching)),
            Some(TrackerState::Dispatched)
        );
    }

    #[test]
    fn cancelled_after_pending_is_journaled() {
        assert_eq!(
            MonitoringState::Cancelled.tracker_state_from(Some(MonitoringState::Pending)),
            Some(TrackerState::DispatchCancelled)
        );
    }

    #[test]
    fn unchanged_state_is_not_journaled() {
        for state in MonitoringState::ALL {
            assert_eq!(state.tracker_state_from(Some(*state)), None);
        }
    }

    #[test]
    fn unknown_prior_uses_unconditional_mapping() {
        assert_eq!(
            MonitoringState::Failed.tracker_state_from(None),
            Some(TrackerState::DispatchFailed)
        );
        assert_eq!(
            MonitoringState::Refused.tracker_state_from(None),
            Some(TrackerState::DispatchRefused)
        );
        assert_eq!(MonitoringState::Pending.tracker_state_from(None), None);
    }

    #[test]
    fn confirmed_states() {
        let confirmed: Vec<_> = MonitoringState::ALL
            .iter()
            .filter(|s| s.is_confirmed())
            .copied()
            .collect();
        assert_eq!(
            confirmed,
            vec![
                MonitoringState::Dispatched,
                MonitoringState::Refused,
                MonitoringState::Cancelled
            ]
        );
    }

    #[test]
    fn required_prior_table() {
        use MonitoringState::*;
        assert_eq!(None.required_prior(), None);
        assert_eq!(Pending.required_prior(), None);
        assert_eq!(Dispatching.required_prior(), Pending);
        assert_eq!(Cancelled.required_prior(), Pending);
        assert_eq!(Dispatched.required_prior(), Dispatching);
        assert_eq!(Refused.required_prior(), None);
        assert_eq!(Failed.required_prior(), None);
    }

    #[test]
    fn wire_names_round_trip() {
        assert_eq!(TrackerState::DispatchRefused.as_str(), "DISPATCH_REFUSED");
        assert_eq!(
            "DISPATCH_REFUSED".parse::<TrackerState>().unwrap(),
            TrackerState::DispatchRefused
        );
        assert_eq!(
            serde_json::to_string(&TrackerState::DispatchRefused).unwrap(),
            "\"DISPATCH_REFUSED\""
        );
        assert!("dispatched".parse::<MonitoringState>().is_err());
    }
}
