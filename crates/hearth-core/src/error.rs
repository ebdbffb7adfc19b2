use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("{0} cannot be null")]
    MissingField(&'static str),
    #[error("unknown alert type: {0}")]
    UnknownAlertType(String),
    #[error("alert type {0} does not support alert events")]
    UnsupportedAlertEvent(String),
    #[error("unrecognized alert event {0}")]
    UnrecognizedAlertEvent(String),
    #[error("unknown {kind}: {value}")]
    UnknownState { kind: &'static str, value: String },
    #[error("diff must be executed against the same incident")]
    IncidentMismatch,
}
