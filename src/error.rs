// src/error.rs
//! Error types for the GPS uplink

use std::fmt;

pub type Result<T> = std::result::Result<T, UplinkError>;

#[derive(Debug)]
pub enum UplinkError {
    Serial(tokio_serial::Error),
    Http(reqwest::Error),
    /// Startup misconfiguration; the forwarding loop must not start.
    Config(String),
    Other(String),
}

impl UplinkError {
    /// Whether this error should stop the process before the loop starts
    pub fn is_configuration_fault(&self) -> bool {
        matches!(self, UplinkError::Config(_))
    }
}

impl fmt::Display for UplinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UplinkError::Serial(e) => write!(f, "Serial error: {}", e),
            UplinkError::Http(e) => write!(f, "HTTP error: {}", e),
            UplinkError::Config(msg) => write!(f, "Configuration error: {}", msg),
            UplinkError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for UplinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UplinkError::Serial(e) => Some(e),
            UplinkError::Http(e) => Some(e),
            UplinkError::Config(_) | UplinkError::Other(_) => None,
        }
    }
}

impl From<tokio_serial::Error> for UplinkError {
    fn from(error: tokio_serial::Error) -> Self {
        UplinkError::Serial(error)
    }
}

impl From<reqwest::Error> for UplinkError {
    fn from(error: reqwest::Error) -> Self {
        UplinkError::Http(error)
    }
}
