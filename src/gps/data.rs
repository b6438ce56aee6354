// src/gps/data.rs
//! Position fix structure

use chrono::{NaiveDate, NaiveTime};

/// Which sentence type a fix was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// Global Positioning System Fix Data
    Gga,
    /// Recommended Minimum Specific GNSS Data
    Rmc,
}

/// A validated position reading.
///
/// Only built through [`Fix::new`], so latitude and longitude are always
/// finite and inside their valid ranges, and `valid` is always true.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub valid: bool,
    pub time: NaiveTime,
    pub date: Option<NaiveDate>,
    pub altitude: Option<f64>,   // meters above mean sea level
    pub speed: Option<f64>,      // km/h
    pub course: Option<f64>,     // degrees
    pub satellites: Option<u8>,
    pub fix_quality: Option<u8>,
    pub hdop: Option<f64>,
    pub sentence: SentenceKind,
}

impl Fix {
    /// Build a fix, rejecting coordinates outside the valid ranges
    pub fn new(
        latitude: f64,
        longitude: f64,
        time: NaiveTime,
        sentence: SentenceKind,
    ) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        Some(Self {
            latitude,
            longitude,
            valid: true,
            time,
            date: None,
            altitude: None,
            speed: None,
            course: None,
            satellites: None,
            fix_quality: None,
            hdop: None,
            sentence,
        })
    }

    /// Get fix type description
    pub fn fix_description(&self) -> Option<String> {
        self.fix_quality.map(|quality| match quality {
            0 => "Invalid".to_string(),
            1 => "GPS".to_string(),
            2 => "DGPS".to_string(),
            3 => "PPS".to_string(),
            4 => "RTK".to_string(),
            5 => "Float RTK".to_string(),
            6 => "Estimated".to_string(),
            7 => "Manual".to_string(),
            8 => "Simulation".to_string(),
            _ => format!("Unknown({})", quality),
        })
    }
}
