//! Normalizes heterogeneous provider payloads into `NormalizedPoint`s.
//!
//! Field aliasing ("first present key wins") and the two known unit
//! ambiguities — Kelvin vs. Celsius temperatures, km/h vs. m/s wind
//! speeds — are resolved here, once, so every downstream stage can
//! assume SI units in Celsius/m/s/mm/hPa/percent.

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::domain::{NormalizedPoint, SourceID};
use crate::provider::RawRecord;

const TEMPERATURE_KEYS: &[&str] =
    &["temperature_celsius", "temperature", "temp", "t", "T2", "t2"];
const WIND_SPEED_KEYS: &[&str] =
    &["wind_speed_ms", "wind_speed", "wind", "speed", "magViento10"];
const WIND_DIR_KEYS: &[&str] = &["wind_direction_deg", "wind_direction", "wind_dir", "dir"];
const PRECIP_KEYS: &[&str] = &[
    "precipitation_mm",
    "precipitation",
    "precip",
    "rain",
    "past3hprecip-surface",
    "PP",
];
const CLOUD_KEYS: &[&str] = &["cloud_cover_pct", "cloud_cover", "clouds", "cloudiness"];
const CLOUD_LOW_KEYS: &[&str] = &["lclouds-surface"];
const CLOUD_MID_KEYS: &[&str] = &["mclouds-surface"];
const CLOUD_HIGH_KEYS: &[&str] = &["hclouds-surface"];
const HUMIDITY_KEYS: &[&str] = &["humidity_pct", "humidity", "relative_humidity", "HR2", "rh-surface"];
const PRESSURE_KEYS: &[&str] = &["pressure_hpa", "pressure", "sea_level_pressure", "PSFC"];
const CAPE_KEYS: &[&str] = &["cape_j_kg", "cape", "cape_jkg"];
const WIND_U_KEYS: &[&str] = &["wind_u", "u", "u10", "wind_u-surface"];
const WIND_V_KEYS: &[&str] = &["wind_v", "v", "v10", "wind_v-surface"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "datetime", "ts"];

/// Kelvin readings are always > 100; Celsius readings in Argentina
/// never are. Values > 100 are therefore unambiguously Kelvin.
fn normalize_temperature(raw: f64) -> f64 {
    if raw > 100.0 {
        let celsius = raw - 273.15;
        debug!(kelvin = raw, celsius, "converted temperature from Kelvin");
        celsius
    } else {
        raw
    }
}

/// km/h readings routinely exceed 50; m/s readings essentially never
/// do for surface wind, so the same >threshold heuristic applies.
fn normalize_wind_speed(raw: f64) -> f64 {
    if raw > 50.0 {
        raw / 3.6
    } else {
        raw
    }
}

/// Pascal readings from WRF's `PSFC` routinely exceed 50_000; hPa
/// readings never do.
fn normalize_pressure(raw: f64) -> f64 {
    if raw > 50_000.0 {
        raw / 100.0
    } else {
        raw
    }
}

/// Converts wind u/v vector components (m/s, meteorological
/// convention: u = eastward, v = northward) into speed and the
/// compass bearing the wind is blowing *from*.
pub fn wind_from_components(u: f64, v: f64) -> (f64, f64) {
    let speed = (u * u + v * v).sqrt();
    let direction = (180.0 + u.atan2(v).to_degrees()).rem_euclid(360.0);
    (speed, direction)
}

fn map_source(name: &str) -> SourceID {
    match name.to_lowercase().trim() {
        "windy_ecmwf" | "ecmwf" => SourceID::WindyEcmwf,
        "windy_gfs" | "gfs" => SourceID::WindyGfs,
        "windy_icon" | "icon" => SourceID::WindyIcon,
        "wrf-smn" | "wrf_smn" | "wrfsmn" => SourceID::WrfSmn,
        other => {
            if other.contains("ecmwf") {
                SourceID::WindyEcmwf
            } else if other.contains("gfs") {
                SourceID::WindyGfs
            } else if other.contains("icon") {
                SourceID::WindyIcon
            } else {
                SourceID::WrfSmn
            }
        }
    }
}

/// Resolves a record's own timestamp: an explicit `Timestamp` field,
/// a numeric epoch-millisecond field, or `fallback` if neither parses.
fn resolve_timestamp(raw: &RawRecord, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(ts) = raw.get_timestamp(TIMESTAMP_KEYS) {
        return ts;
    }
    if let Some(ms) = raw.get_f64(TIMESTAMP_KEYS) {
        if let chrono::LocalResult::Single(dt) = Utc.timestamp_millis_opt(ms as i64) {
            return dt;
        }
    }
    fallback
}

fn resolve_cloud_cover(raw: &RawRecord) -> Option<f64> {
    if let Some(direct) = raw.get_f64(CLOUD_KEYS) {
        return Some(direct);
    }
    let low = raw.get_f64(CLOUD_LOW_KEYS);
    let mid = raw.get_f64(CLOUD_MID_KEYS);
    let high = raw.get_f64(CLOUD_HIGH_KEYS);
    if low.is_none() && mid.is_none() && high.is_none() {
        return None;
    }
    let sum = low.unwrap_or(0.0) + mid.unwrap_or(0.0) + high.unwrap_or(0.0);
    Some(sum.min(100.0))
}

/// Normalizes a single raw provider record into the canonical schema.
///
/// `source` is the identity asserted by the caller (the provider that
/// produced `raw`), not re-derived from the payload — the payload's
/// own `source` field, if present, is informational only.
pub fn normalize(
    raw: &RawRecord,
    source: SourceID,
    forecast_hour: u32,
    latitude: f64,
    longitude: f64,
    fallback_timestamp: DateTime<Utc>,
) -> NormalizedPoint {
    let timestamp = resolve_timestamp(raw, fallback_timestamp);

    let temperature_celsius = raw.get_f64(TEMPERATURE_KEYS).map(normalize_temperature);

    let (wind_speed_ms, wind_direction_deg) =
        match (raw.get_f64(WIND_U_KEYS), raw.get_f64(WIND_V_KEYS)) {
            (Some(u), Some(v)) => {
                let (speed, dir) = wind_from_components(u, v);
                (Some(speed), Some(dir))
            }
            _ => (
                raw.get_f64(WIND_SPEED_KEYS).map(normalize_wind_speed),
                raw.get_f64(WIND_DIR_KEYS),
            ),
        };

    NormalizedPoint::new(
        source,
        timestamp,
        forecast_hour,
        latitude,
        longitude,
        temperature_celsius,
        wind_speed_ms,
        wind_direction_deg,
        raw.get_f64(PRECIP_KEYS),
        resolve_cloud_cover(raw),
        raw.get_f64(HUMIDITY_KEYS),
        raw.get_f64(PRESSURE_KEYS).map(normalize_pressure),
        raw.get_f64(CAPE_KEYS),
    )
}

/// Normalizes a provider's whole forecast run. `forecast_hour` for
/// item `i` is `max(0, hoursBetween(records[i].timestamp,
/// records[0].timestamp))` — records lacking a parseable timestamp of
/// their own fall back to `base_time`.
pub fn normalize_batch(
    raw_records: &[RawRecord],
    source: SourceID,
    latitude: f64,
    longitude: f64,
    base_time: DateTime<Utc>,
) -> Vec<NormalizedPoint> {
    if raw_records.is_empty() {
        return Vec::new();
    }
    let timestamps: Vec<DateTime<Utc>> =
        raw_records.iter().map(|r| resolve_timestamp(r, base_time)).collect();
    let first_ts = timestamps[0];

    raw_records
        .iter()
        .zip(timestamps.iter())
        .map(|(raw, ts)| {
            let forecast_hour = ((*ts - first_ts).num_minutes() as f64 / 60.0).round().max(0.0) as u32;
            normalize(raw, source, forecast_hour, latitude, longitude, *ts)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RawField;

    #[test]
    fn converts_kelvin_temperature() {
        let mut raw = RawRecord::new();
        raw.insert("temperature", RawField::Number(300.0));
        let point = normalize(&raw, SourceID::WindyGfs, 0, -34.6, -58.4, Utc::now());
        assert!((point.temperature_celsius.unwrap() - (300.0 - 273.15)).abs() < 1e-9);
    }

    #[test]
    fn leaves_celsius_temperature_untouched() {
        let mut raw = RawRecord::new();
        raw.insert("temperature", RawField::Number(22.5));
        let point = normalize(&raw, SourceID::WindyGfs, 0, -34.6, -58.4, Utc::now());
        assert_eq!(point.temperature_celsius, Some(22.5));
    }

    #[test]
    fn converts_kmh_wind_speed() {
        let mut raw = RawRecord::new();
        raw.insert("wind_speed", RawField::Number(72.0));
        let point = normalize(&raw, SourceID::WindyGfs, 0, -34.6, -58.4, Utc::now());
        assert!((point.wind_speed_ms.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn derives_speed_and_direction_from_uv_components() {
        let mut raw = RawRecord::new();
        raw.insert("u", RawField::Number(0.0));
        raw.insert("v", RawField::Number(-5.0));
        let point = normalize(&raw, SourceID::WindyGfs, 0, -34.6, -58.4, Utc::now());
        assert!((point.wind_speed_ms.unwrap() - 5.0).abs() < 1e-9);
        // wind blowing from the north (v negative == blowing southward == from 0deg)
        assert!((point.wind_direction_deg.unwrap() - 0.0).abs() < 1e-6);
    }

    #[test]
    fn maps_known_source_aliases() {
        assert_eq!(map_source("WRF-SMN"), SourceID::WrfSmn);
        assert_eq!(map_source("windy_ecmwf"), SourceID::WindyEcmwf);
        assert_eq!(map_source("totally_unknown"), SourceID::WrfSmn);
    }

    #[test]
    fn recognizes_wrf_style_aliases() {
        let mut raw = RawRecord::new();
        raw.insert("T2", RawField::Number(290.0));
        raw.insert("magViento10", RawField::Number(10.0));
        raw.insert("PP", RawField::Number(5.0));
        raw.insert("HR2", RawField::Number(60.0));
        raw.insert("PSFC", RawField::Number(101_325.0));
        let point = normalize(&raw, SourceID::WrfSmn, 0, -34.6, -58.4, Utc::now());
        assert!((point.temperature_celsius.unwrap() - (290.0 - 273.15)).abs() < 1e-9);
        assert_eq!(point.wind_speed_ms, Some(10.0));
        assert_eq!(point.precipitation_mm, Some(5.0));
        assert_eq!(point.humidity_pct, Some(60.0));
        assert!((point.pressure_hpa.unwrap() - 1013.25).abs() < 1e-6);
    }

    #[test]
    fn sums_layered_cloud_cover_when_no_direct_key_present() {
        let mut raw = RawRecord::new();
        raw.insert("lclouds-surface", RawField::Number(40.0));
        raw.insert("mclouds-surface", RawField::Number(30.0));
        raw.insert("hclouds-surface", RawField::Number(50.0));
        let point = normalize(&raw, SourceID::WrfSmn, 0, -34.6, -58.4, Utc::now());
        assert_eq!(point.cloud_cover_pct, Some(100.0));
    }

    #[test]
    fn forecast_hour_is_derived_from_each_records_own_timestamp() {
        let base = Utc::now();
        let mut raw0 = RawRecord::new();
        raw0.insert("temperature", RawField::Number(20.0));
        raw0.insert("timestamp", RawField::Timestamp(base));
        let mut raw1 = RawRecord::new();
        raw1.insert("temperature", RawField::Number(21.0));
        raw1.insert("timestamp", RawField::Timestamp(base + chrono::Duration::hours(6)));

        let points = normalize_batch(&[raw0, raw1], SourceID::WrfSmn, -34.6, -58.4, base);
        assert_eq!(points[0].forecast_hour, 0);
        assert_eq!(points[1].forecast_hour, 6);
    }
}
