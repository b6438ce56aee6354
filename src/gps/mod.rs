// src/gps/mod.rs
//! GPS acquisition: serial line reading and NMEA fix parsing

pub mod data;
pub mod nmea;
pub mod serial;

pub use data::{Fix, SentenceKind};
pub use nmea::parse_sentence;
pub use serial::{DeviceConfig, PortReader, RawLine};
