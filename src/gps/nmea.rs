// src/gps/nmea.rs
//! NMEA sentence parsing

use super::data::{Fix, SentenceKind};
use chrono::{NaiveDate, NaiveTime};
use std::fmt;

/// Talker identifiers accepted in front of the sentence type
const TALKERS: [&str; 7] = ["GP", "GN", "GL", "GA", "GB", "BD", "GQ"];

const GGA_FIELDS: usize = 15;
const RMC_MIN_FIELDS: usize = 12;
const RMC_MAX_FIELDS: usize = 14;

const KNOTS_TO_KMH: f64 = 1.852;

/// Why a line did not produce a fix.
///
/// None of these are errors: they are the normal states of a receiver
/// stream and are only useful for trace logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not a GGA/RMC sentence from a known talker
    Unrecognized,
    /// Missing or wrong checksum
    ChecksumMismatch,
    /// Wrong field count or unparsable field
    Malformed,
    /// Receiver reported no fix
    NoFix,
    /// Bad hemisphere letter or coordinate outside the valid range
    OutOfRange,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Unrecognized => "unrecognized sentence",
            Rejection::ChecksumMismatch => "checksum mismatch",
            Rejection::Malformed => "malformed sentence",
            Rejection::NoFix => "no fix",
            Rejection::OutOfRange => "coordinate out of range",
        };
        f.write_str(reason)
    }
}

/// Parse a single NMEA sentence into a fix.
///
/// Returns `None` for anything that is not a valid GGA or RMC sentence
/// reporting a position fix.
pub fn parse_sentence(line: &str) -> Option<Fix> {
    classify(line).ok()
}

/// Parse a sentence, keeping the reason when no fix is produced
pub fn classify(line: &str) -> Result<Fix, Rejection> {
    let line = line.trim();
    if !line.starts_with('$') {
        return Err(Rejection::Unrecognized);
    }

    let body = verify_checksum(line).ok_or(Rejection::ChecksumMismatch)?;
    let parts: Vec<&str> = body.split(',').collect();

    let kind = sentence_kind(parts[0]).ok_or(Rejection::Unrecognized)?;
    match kind {
        SentenceKind::Gga => parse_gga(&parts),
        SentenceKind::Rmc => parse_rmc(&parts),
    }
}

/// XOR of every byte in `body`
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Check the `*HH` suffix of a sentence.
///
/// Returns the text between `$` and `*` when the transmitted checksum
/// matches the computed one.
pub fn verify_checksum(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('$')?;
    let (body, transmitted) = rest.rsplit_once('*')?;

    if transmitted.len() != 2 || !transmitted.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let expected = u8::from_str_radix(transmitted, 16).ok()?;

    (checksum(body) == expected).then_some(body)
}

fn sentence_kind(id: &str) -> Option<SentenceKind> {
    if id.len() != 5 || !id.is_ascii() {
        return None;
    }
    let (talker, kind) = id.split_at(2);
    if !TALKERS.contains(&talker) {
        return None;
    }

    match kind {
        "GGA" => Some(SentenceKind::Gga),
        "RMC" => Some(SentenceKind::Rmc),
        _ => None,
    }
}

/// Parse GGA (Global Positioning System Fix Data) sentence
fn parse_gga(parts: &[&str]) -> Result<Fix, Rejection> {
    if parts.len() != GGA_FIELDS {
        return Err(Rejection::Malformed);
    }

    // Fix quality (field 6), 0 means no fix
    let quality = parts[6].parse::<u8>().map_err(|_| Rejection::Malformed)?;
    if quality == 0 {
        return Err(Rejection::NoFix);
    }

    let time = parse_time(parts[1])?;
    let latitude = parse_coordinate(parts[2], parts[3], Axis::Latitude)?;
    let longitude = parse_coordinate(parts[4], parts[5], Axis::Longitude)?;

    let mut fix =
        Fix::new(latitude, longitude, time, SentenceKind::Gga).ok_or(Rejection::OutOfRange)?;
    fix.fix_quality = Some(quality);
    fix.satellites = optional_field(parts[7])?;
    fix.hdop = optional_field(parts[8])?;
    fix.altitude = optional_field(parts[9])?;

    Ok(fix)
}

/// Parse RMC (Recommended Minimum Course) sentence
fn parse_rmc(parts: &[&str]) -> Result<Fix, Rejection> {
    if !(RMC_MIN_FIELDS..=RMC_MAX_FIELDS).contains(&parts.len()) {
        return Err(Rejection::Malformed);
    }

    // Status (field 2): A = active, V = void
    match parts[2] {
        "A" => {}
        "V" => return Err(Rejection::NoFix),
        _ => return Err(Rejection::Malformed),
    }

    // NMEA 2.3+ mode indicator, N = data not valid
    if parts.len() > 12 && parts[12] == "N" {
        return Err(Rejection::NoFix);
    }

    let time = parse_time(parts[1])?;
    let latitude = parse_coordinate(parts[3], parts[4], Axis::Latitude)?;
    let longitude = parse_coordinate(parts[5], parts[6], Axis::Longitude)?;

    let mut fix =
        Fix::new(latitude, longitude, time, SentenceKind::Rmc).ok_or(Rejection::OutOfRange)?;
    fix.speed = optional_field::<f64>(parts[7])?.map(|knots| knots * KNOTS_TO_KMH);
    fix.course = optional_field(parts[8])?;
    fix.date = if parts[9].is_empty() {
        None
    } else {
        Some(NaiveDate::parse_from_str(parts[9], "%d%m%y").map_err(|_| Rejection::Malformed)?)
    };

    Ok(fix)
}

/// hhmmss or hhmmss.sss
fn parse_time(field: &str) -> Result<NaiveTime, Rejection> {
    NaiveTime::parse_from_str(field, "%H%M%S%.f").map_err(|_| Rejection::Malformed)
}

fn optional_field<T: std::str::FromStr>(field: &str) -> Result<Option<T>, Rejection> {
    if field.is_empty() {
        return Ok(None);
    }
    field.parse::<T>().map(Some).map_err(|_| Rejection::Malformed)
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed decimal degrees
fn parse_coordinate(value: &str, hemisphere: &str, axis: Axis) -> Result<f64, Rejection> {
    let raw = value.parse::<f64>().map_err(|_| Rejection::Malformed)?;
    if !raw.is_finite() || raw < 0.0 {
        return Err(Rejection::OutOfRange);
    }

    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return Err(Rejection::OutOfRange);
    }
    let decimal = degrees + minutes / 60.0;

    match (axis, hemisphere) {
        (Axis::Latitude, "N") | (Axis::Longitude, "E") => Ok(decimal),
        (Axis::Latitude, "S") | (Axis::Longitude, "W") => Ok(-decimal),
        _ => Err(Rejection::OutOfRange),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    /// Wrap a sentence body with `$` and its checksum
    fn sentence(body: &str) -> String {
        format!("${}*{:02X}", body, checksum(body))
    }

    /// Encode a fix as a GGA sentence
    fn encode_gga(fix: &Fix) -> String {
        fn ddmm(value: f64, width: usize) -> String {
            let abs = value.abs();
            let degrees = abs.trunc();
            let minutes = (abs - degrees) * 60.0;
            format!("{:0width$}{:09.6}", degrees as u32, minutes, width = width)
        }

        let body = format!(
            "GPGGA,{},{},{},{},{},{},{:02},{},{},M,0.0,M,,",
            fix.time.format("%H%M%S%.3f"),
            ddmm(fix.latitude, 2),
            if fix.latitude < 0.0 { "S" } else { "N" },
            ddmm(fix.longitude, 3),
            if fix.longitude < 0.0 { "W" } else { "E" },
            fix.fix_quality.unwrap_or(1),
            fix.satellites.unwrap_or(0),
            fix.hdop.unwrap_or(1.0),
            fix.altitude.unwrap_or(0.0),
        );
        sentence(&body)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
    }

    #[test]
    fn test_gpgga_parsing() {
        let fix = parse_sentence(GGA).expect("valid GGA");

        assert_close(fix.latitude, 48.0 + 7.038 / 60.0);
        assert_close(fix.longitude, 11.0 + 31.0 / 60.0);
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.5167).abs() < 1e-4);
        assert!(fix.valid);
        assert_eq!(fix.satellites, Some(8));
        assert_eq!(fix.hdop, Some(0.9));
        assert_eq!(fix.altitude, Some(545.4));
        assert_eq!(fix.fix_quality, Some(1));
        assert_eq!(fix.time, NaiveTime::from_hms_opt(12, 35, 19).unwrap());
        assert_eq!(fix.sentence, SentenceKind::Gga);
    }

    #[test]
    fn test_gprmc_parsing() {
        let fix = parse_sentence(RMC).expect("valid RMC");

        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        // Speed should be converted from knots to km/h
        assert!((fix.speed.unwrap() - 41.5).abs() < 0.1);
        assert_eq!(fix.course, Some(84.4));
        assert_eq!(fix.date, NaiveDate::from_ymd_opt(1994, 3, 23));
        assert_eq!(fix.altitude, None);
    }

    #[test]
    fn test_gn_talker_and_fractional_time() {
        let line = sentence("GNGGA,091500.25,3351.000,S,15112.600,E,2,10,0.8,20.0,M,22.0,M,,");
        let fix = parse_sentence(&line).expect("valid GNGGA");

        assert_close(fix.latitude, -(33.0 + 51.0 / 60.0));
        assert_close(fix.longitude, 151.0 + 12.6 / 60.0);
        assert_eq!(fix.time.nanosecond(), 250_000_000);
        assert_eq!(fix.fix_quality, Some(2));
    }

    #[test]
    fn test_southern_western_hemispheres() {
        let line = sentence("GPGGA,000000,2230.000,S,04315.000,W,1,05,1.2,10.0,M,0.0,M,,");
        let fix = parse_sentence(&line).expect("valid GGA");

        assert_close(fix.latitude, -22.5);
        assert_close(fix.longitude, -43.25);
    }

    #[test]
    fn test_corrupted_checksum() {
        assert_eq!(classify(&GGA.replace("*47", "*48")), Err(Rejection::ChecksumMismatch));
        // Corrupt one payload byte, keep the transmitted checksum
        assert_eq!(classify(&GGA.replace("545.4", "545.5")), Err(Rejection::ChecksumMismatch));
        assert_eq!(classify(&GGA.replace("*47", "")), Err(Rejection::ChecksumMismatch));
        assert_eq!(classify(&GGA.replace("*47", "*4")), Err(Rejection::ChecksumMismatch));
    }

    #[test]
    fn test_lowercase_checksum_accepted() {
        assert!(parse_sentence(&RMC.replace("*6A", "*6a")).is_some());
    }

    #[test]
    fn test_no_fix_indicator() {
        let gga = sentence("GPGGA,123519,,,,,0,00,99.9,,M,,M,,");
        assert_eq!(classify(&gga), Err(Rejection::NoFix));

        let rmc = sentence("GPRMC,123519,V,,,,,,,230394,,,N");
        assert_eq!(classify(&rmc), Err(Rejection::NoFix));
    }

    #[test]
    fn test_rmc_mode_not_valid() {
        let rmc = sentence("GPRMC,123519,A,4807.038,N,01131.000,E,0.0,0.0,230394,,,N");
        assert_eq!(classify(&rmc), Err(Rejection::NoFix));

        let rmc = sentence("GPRMC,123519,A,4807.038,N,01131.000,E,0.0,0.0,230394,,,A");
        assert!(parse_sentence(&rmc).is_some());
    }

    #[test]
    fn test_field_count_mismatch() {
        let short = sentence("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,");
        assert_eq!(classify(&short), Err(Rejection::Malformed));

        let long = sentence("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,,");
        assert_eq!(classify(&long), Err(Rejection::Malformed));
    }

    #[test]
    fn test_unparsable_numeric_field() {
        let line = sentence("GPGGA,123519,48O7.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(classify(&line), Err(Rejection::Malformed));

        let line = sentence("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,high,M,46.9,M,,");
        assert_eq!(classify(&line), Err(Rejection::Malformed));

        let line = sentence("GPGGA,1235,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(classify(&line), Err(Rejection::Malformed));
    }

    #[test]
    fn test_out_of_range() {
        let bad_hemisphere =
            sentence("GPGGA,123519,4807.038,E,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(classify(&bad_hemisphere), Err(Rejection::OutOfRange));

        let bad_minutes = sentence("GPGGA,123519,4875.000,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(classify(&bad_minutes), Err(Rejection::OutOfRange));

        let bad_degrees = sentence("GPGGA,123519,9107.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(classify(&bad_degrees), Err(Rejection::OutOfRange));

        let bad_longitude = sentence("GPRMC,123519,A,4807.038,N,18100.000,W,0.0,0.0,230394,,");
        assert_eq!(classify(&bad_longitude), Err(Rejection::OutOfRange));
    }

    #[test]
    fn test_invalid_sentence() {
        assert_eq!(classify("$INVALID,123,456"), Err(Rejection::ChecksumMismatch));
        assert_eq!(classify(&sentence("GPGSV,3,1,12,01,40,083,46")), Err(Rejection::Unrecognized));
        let foreign_talker =
            sentence("XXGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(classify(&foreign_talker), Err(Rejection::Unrecognized));
        assert_eq!(classify("garbage \u{FFFD}\u{FFFD}"), Err(Rejection::Unrecognized));
        assert_eq!(classify(""), Err(Rejection::Unrecognized));
    }

    #[test]
    fn test_round_trip_through_sentence() {
        let time = NaiveTime::from_hms_milli_opt(23, 59, 58, 500).unwrap();
        let cases = [
            (48.1173, 11.516_666),
            (-33.865, 151.209_444),
            (0.5, -0.25),
            (-89.999, -179.999),
        ];

        for (lat, lon) in cases {
            let mut expected = Fix::new(lat, lon, time, SentenceKind::Gga).unwrap();
            expected.fix_quality = Some(1);
            expected.satellites = Some(9);
            expected.hdop = Some(1.1);
            expected.altitude = Some(120.5);

            let parsed = parse_sentence(&encode_gga(&expected)).expect("encoded sentence parses");

            assert_close(parsed.latitude, expected.latitude);
            assert_close(parsed.longitude, expected.longitude);
            assert_eq!(parsed.time, expected.time);
            assert_eq!(parsed.fix_quality, expected.fix_quality);
            assert_eq!(parsed.satellites, expected.satellites);
            assert_eq!(parsed.hdop, expected.hdop);
            assert_eq!(parsed.altitude, expected.altitude);
        }
    }
}
