pub mod address;
pub mod alert;
pub mod error;
pub mod events;
pub mod ids;
pub mod incident;
pub mod trigger;
