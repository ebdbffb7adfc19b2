use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("not found")]
    NotFound,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("decode error: {0}")]
    Decode(String),
}
