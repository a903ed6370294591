pub mod config;
pub mod error;
pub mod roster;
pub mod scheduling;
pub mod telemetry;
