pub mod error;
pub mod incident_service;
