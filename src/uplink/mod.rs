// src/uplink/mod.rs
//! Delivery of fixes to the remote collection endpoint

pub mod payload;
pub mod sender;

pub use payload::Payload;
pub use sender::{Ack, AttemptFailure, EndpointConfig, SendError, UplinkAttempt, UplinkSender};
