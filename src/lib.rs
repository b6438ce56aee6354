// src/lib.rs
//! GPS Uplink Library
//!
//! Reads position fixes from a serial NMEA receiver and forwards them to a
//! remote HTTP endpoint.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod gps;
pub mod uplink;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{Cli, ForwarderConfig, Settings};
pub use error::{Result, UplinkError};
pub use forwarder::{Forwarder, ForwarderState, StepOutcome};
pub use gps::{Fix, PortReader};
pub use uplink::{SendError, UplinkSender};
