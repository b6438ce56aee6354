// src/config.rs
//! Configuration: JSON file, environment and command line

use crate::{
    error::{Result, UplinkError},
    gps::serial::DeviceConfig,
    uplink::EndpointConfig,
};
use clap::Parser;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Command line arguments; every option can also come from the environment
#[derive(Debug, Parser)]
#[command(name = "gps-uplink", version, about = "Forward serial GPS fixes to an HTTP endpoint")]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "GPS_UPLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial device path (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long, env = "GPS_DEVICE")]
    pub device: Option<String>,

    /// Serial baud rate
    #[arg(short, long, env = "GPS_BAUD_RATE")]
    pub baud_rate: Option<u32>,

    /// Collection endpoint URL
    #[arg(short, long, env = "UPLINK_URL")]
    pub url: Option<String>,

    /// Bearer token for the endpoint
    #[arg(long, env = "UPLINK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Identifier sent with every fix
    #[arg(long, env = "DEVICE_ID")]
    pub device_id: Option<String>,

    /// Minimum seconds between deliveries (0 sends every fix)
    #[arg(long, env = "SEND_INTERVAL_SECS")]
    pub send_interval: Option<u64>,

    /// Delivery attempts per fix
    #[arg(long, env = "UPLINK_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Skip the startup health check
    #[arg(long)]
    pub no_health_check: bool,

    /// List available serial ports and exit
    #[arg(long)]
    pub list_ports: bool,
}

impl Cli {
    /// Override file/default values with anything given on the command line or environment
    pub fn apply(&self, config: &mut ForwarderConfig) {
        if let Some(device) = &self.device {
            config.serial_port = device.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial_baudrate = baud_rate;
        }
        if let Some(url) = &self.url {
            config.endpoint_url = Some(url.clone());
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone());
        }
        if let Some(device_id) = &self.device_id {
            config.device_id = device_id.clone();
        }
        if let Some(interval) = self.send_interval {
            config.send_interval_secs = interval;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = attempts;
        }
        if self.no_health_check {
            config.health_check = false;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForwarderConfig {
    pub serial_port: String,
    pub serial_baudrate: u32,
    pub read_timeout_ms: u64,
    pub line_terminator: String,
    pub reconnect_delay_secs: u64,
    pub endpoint_url: Option<String>,
    pub auth_token: Option<String>,
    pub device_id: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub send_interval_secs: u64,
    pub health_check: bool,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            serial_baudrate: 9600,
            read_timeout_ms: 2000,
            line_terminator: "\n".to_string(),
            reconnect_delay_secs: 5,
            endpoint_url: None,
            auth_token: None,
            device_id: "gps-uplink".to_string(),
            request_timeout_secs: 10,
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            send_interval_secs: 10,
            health_check: true,
        }
    }
}

/// Validated runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: DeviceConfig,
    pub endpoint: EndpointConfig,
    pub send_interval: Duration,
    pub health_check: bool,
}

impl ForwarderConfig {
    /// Load from an explicit file, or the default location when it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = Self::get_config_path();
                match default_path {
                    Some(path) if path.exists() => Self::load_from_file(&path),
                    _ => Ok(Self::default()),
                }
            }
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| UplinkError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            UplinkError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_json(&contents)
    }

    /// `$HOME/.config/gps-uplink/config.json` on Unix systems
    fn get_config_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(PathBuf::from(home).join(".config").join("gps-uplink").join("config.json"))
    }

    /// Check every value and build the runtime configuration.
    ///
    /// Any error here is a configuration fault: the forwarding loop must not start.
    pub fn validate(&self) -> Result<Settings> {
        let url = self.endpoint_url()?;

        if self.serial_port.trim().is_empty() || self.serial_port.contains('\0') {
            return Err(UplinkError::Config(format!("Invalid device path {:?}", self.serial_port)));
        }
        if self.serial_baudrate == 0 {
            return Err(UplinkError::Config("Baud rate must be greater than zero".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(UplinkError::Config("Read timeout must be greater than zero".to_string()));
        }
        let line_terminator = match self.line_terminator.as_bytes() {
            [byte] => *byte,
            _ => {
                return Err(UplinkError::Config(format!(
                    "Line terminator must be a single byte, got {:?}",
                    self.line_terminator
                )))
            }
        };
        if self.max_attempts == 0 {
            return Err(UplinkError::Config("Max attempts must be at least 1".to_string()));
        }
        if self.device_id.trim().is_empty() {
            return Err(UplinkError::Config("Device id must not be empty".to_string()));
        }

        let device = DeviceConfig {
            path: self.serial_port.clone(),
            baud_rate: self.serial_baudrate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            line_terminator,
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
        };

        let endpoint = EndpointConfig {
            url,
            device_id: self.device_id.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
            auth_token: self.auth_token.clone().filter(|t| !t.is_empty()),
        };

        Ok(Settings {
            device,
            endpoint,
            send_interval: Duration::from_secs(self.send_interval_secs),
            health_check: self.health_check,
        })
    }

    fn endpoint_url(&self) -> Result<Url> {
        let raw = self
            .endpoint_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                UplinkError::Config("Endpoint URL is not set (use --url or UPLINK_URL)".to_string())
            })?;

        let url = Url::parse(raw.trim())
            .map_err(|e| UplinkError::Config(format!("Invalid endpoint URL {:?}: {}", raw, e)))?;

        match url.scheme() {
            "http" | "https" if url.host().is_some() => Ok(url),
            _ => Err(UplinkError::Config(format!(
                "Endpoint URL must be http(s) with a host: {}",
                raw
            ))),
        }
    }
}
