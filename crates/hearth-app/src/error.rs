use hearth_core::error::DomainError;
use hearth_ports::error::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("port error: {0}")]
    Port(#[from] PortError),
    #[error("incident not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
