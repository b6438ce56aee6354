// src/uplink/payload.rs
//! JSON body posted to the collection endpoint

use crate::gps::Fix;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const SOURCE: &str = "SERIAL_NMEA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub device_id: String,
    /// When the fix was forwarded
    pub timestamp: DateTime<Utc>,
    /// Time of day reported by the receiver (UTC)
    pub fix_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_date: Option<NaiveDate>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellites: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdop: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_quality: Option<String>,
    pub source: String,
    /// Sentence the fix was decoded from
    pub raw_nmea: String,
}

impl Payload {
    pub fn from_fix(fix: &Fix, raw: &str, device_id: &str, forwarded_at: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp: forwarded_at,
            fix_time: fix.time.format("%H:%M:%S%.3f").to_string(),
            fix_date: fix.date,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            speed: fix.speed,
            course: fix.course,
            satellites: fix.satellites,
            hdop: fix.hdop,
            fix_quality: fix.fix_description(),
            source: SOURCE.to_string(),
            raw_nmea: raw.to_string(),
        }
    }
}
