//! Weighted fusion of per-source normalized readings into one unified
//! forecast per hour.
//!
//! Base weights are horizon- and variable-specific (WRF-SMN trusted
//! most near-term, the Windy ensemble members trusted more as the
//! horizon lengthens); a source flagged as an outlier by the
//! inconsistency detector has its weight for that variable penalized
//! before the remaining weights are renormalized.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{
    ConfidenceLevel, Contribution, InconsistencyReport, NormalizedPoint, SourceID, UnifiedForecast,
};
use crate::inconsistency::{adjust_weights, detect};

const SHORT_HORIZON_MAX_HOURS: u32 = 72;

enum Horizon {
    Short,
    Long,
}

fn horizon_class(forecast_hour: u32) -> Horizon {
    if forecast_hour <= SHORT_HORIZON_MAX_HOURS {
        Horizon::Short
    } else {
        Horizon::Long
    }
}

/// Base weight table for a variable at a given horizon class. Any
/// source present with a value but absent from the table (beyond the
/// four known sources) gets the 0.1 default applied in `weights_for`.
fn base_weight_table(variable: &str, forecast_hour: u32) -> HashMap<SourceID, f64> {
    use SourceID::*;
    match (variable, horizon_class(forecast_hour)) {
        ("temperature", Horizon::Short) => {
            HashMap::from([(WrfSmn, 0.35), (WindyEcmwf, 0.30), (WindyGfs, 0.20), (WindyIcon, 0.15)])
        }
        ("temperature", Horizon::Long) => {
            HashMap::from([(WindyEcmwf, 0.40), (WindyGfs, 0.30), (WindyIcon, 0.30)])
        }
        ("wind_speed", Horizon::Short) => {
            HashMap::from([(WrfSmn, 0.40), (WindyEcmwf, 0.30), (WindyGfs, 0.15), (WindyIcon, 0.15)])
        }
        ("wind_speed", Horizon::Long) => {
            HashMap::from([(WindyEcmwf, 0.45), (WindyGfs, 0.30), (WindyIcon, 0.25)])
        }
        ("precipitation", Horizon::Short) => {
            HashMap::from([(WrfSmn, 0.45), (WindyEcmwf, 0.30), (WindyGfs, 0.15), (WindyIcon, 0.10)])
        }
        ("precipitation", Horizon::Long) => {
            HashMap::from([(WindyEcmwf, 0.45), (WindyGfs, 0.35), (WindyIcon, 0.20)])
        }
        _ => HashMap::new(),
    }
}

fn weights_for(
    variable: &str,
    forecast_hour: u32,
    present_sources: &[SourceID],
    reports: &[&InconsistencyReport],
) -> HashMap<SourceID, f64> {
    let table = base_weight_table(variable, forecast_hour);
    let mut base: HashMap<SourceID, f64> = present_sources
        .iter()
        .map(|s| (*s, table.get(s).copied().unwrap_or(0.1)))
        .collect();
    let total: f64 = base.values().sum();
    if total > 0.0 {
        for w in base.values_mut() {
            *w /= total;
        }
    }
    adjust_weights(&base, reports)
}

fn weighted_mean(values: &[(SourceID, f64)], weights: &HashMap<SourceID, f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let total_weight: f64 = values.iter().map(|(s, _)| weights[s]).sum();
    if total_weight <= 0.0 {
        return None;
    }
    Some(values.iter().map(|(s, v)| v * weights[s]).sum::<f64>() / total_weight)
}

/// Circular mean for a direction measured in degrees, weighted by the
/// same per-source weights as wind speed.
fn weighted_circular_mean(values: &[(SourceID, f64)], weights: &HashMap<SourceID, f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    for (s, deg) in values {
        let w = weights[s];
        let rad = deg.to_radians();
        sin_sum += w * rad.sin();
        cos_sum += w * rad.cos();
    }
    if sin_sum.abs() < 1e-12 && cos_sum.abs() < 1e-12 {
        return None;
    }
    Some(sin_sum.atan2(cos_sum).to_degrees().rem_euclid(360.0))
}

fn simple_mean(values: &[(SourceID, f64)]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64)
}

fn collect_field<F: Fn(&NormalizedPoint) -> Option<f64>>(
    points: &[NormalizedPoint],
    f: F,
) -> Vec<(SourceID, f64)> {
    points.iter().filter_map(|p| f(p).map(|v| (p.source, v))).collect()
}

fn contributions(values: &[(SourceID, f64)], weights: &HashMap<SourceID, f64>) -> Vec<Contribution> {
    values
        .iter()
        .map(|(source, value)| {
            let weight = weights.get(source).copied().unwrap_or(0.0);
            Contribution { source: *source, value: *value, weight, confidence: weight }
        })
        .collect()
}

fn variable_confidence(n_sources: usize, report: Option<&InconsistencyReport>) -> f64 {
    let base = (n_sources as f64 / 3.0).min(1.0);
    let penalty = report.map(|r| r.severity * 0.5).unwrap_or(0.0);
    (base * (1.0 - penalty) * 1000.0).round() / 1000.0
}

/// Fuses every source's reading for a single forecast hour into one
/// `UnifiedForecast`. An empty `points` slice is a valid input and
/// yields a forecast with every field `None`, zero confidence, and
/// `sources_available == 0` — never `None` itself.
pub fn fuse(
    forecast_hour: u32,
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    points: &[NormalizedPoint],
) -> UnifiedForecast {
    if points.is_empty() {
        return UnifiedForecast {
            timestamp,
            forecast_hour,
            latitude,
            longitude,
            temperature_celsius: None,
            wind_speed_ms: None,
            wind_direction_deg: None,
            precipitation_mm: None,
            cloud_cover_pct: None,
            humidity_pct: None,
            pressure_hpa: None,
            cape_j_kg: None,
            temperature_confidence: 0.0,
            wind_confidence: 0.0,
            precipitation_confidence: 0.0,
            overall_confidence: 0.0,
            confidence_level: ConfidenceLevel::VeryLow,
            temperature_contributions: Vec::new(),
            wind_contributions: Vec::new(),
            precipitation_contributions: Vec::new(),
            sources_used: Vec::new(),
            sources_available: 0,
            inconsistencies: Vec::new(),
            has_significant_inconsistencies: false,
            fusion_method: "weighted_average".to_string(),
        };
    }

    let sources_used: Vec<SourceID> = points.iter().map(|p| p.source).collect();
    let reports = detect(timestamp, forecast_hour, points);
    let report_for = |variable: &str| reports.iter().find(|r| r.variable == variable);

    let temp_values = collect_field(points, |p| p.temperature_celsius);
    let temp_report = report_for("temperature");
    let temp_weights = weights_for(
        "temperature",
        forecast_hour,
        &temp_values.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        &temp_report.into_iter().collect::<Vec<_>>(),
    );
    let temperature_celsius = weighted_mean(&temp_values, &temp_weights);
    let temperature_confidence = variable_confidence(temp_values.len(), temp_report);
    let temperature_contributions = contributions(&temp_values, &temp_weights);

    let wind_values = collect_field(points, |p| p.wind_speed_ms);
    let wind_report = report_for("wind_speed");
    let wind_weights = weights_for(
        "wind_speed",
        forecast_hour,
        &wind_values.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        &wind_report.into_iter().collect::<Vec<_>>(),
    );
    let wind_speed_ms = weighted_mean(&wind_values, &wind_weights);
    let wind_confidence = variable_confidence(wind_values.len(), wind_report);
    let wind_contributions = contributions(&wind_values, &wind_weights);

    let dir_values = collect_field(points, |p| p.wind_direction_deg);
    let wind_direction_deg = weighted_circular_mean(&dir_values, &wind_weights);

    let precip_values = collect_field(points, |p| p.precipitation_mm);
    let precip_report = report_for("precipitation");
    let precip_weights = weights_for(
        "precipitation",
        forecast_hour,
        &precip_values.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        &precip_report.into_iter().collect::<Vec<_>>(),
    );
    let precipitation_mm = weighted_mean(&precip_values, &precip_weights);
    let precipitation_confidence = variable_confidence(precip_values.len(), precip_report);
    let precipitation_contributions = contributions(&precip_values, &precip_weights);

    let cloud_cover_pct = simple_mean(&collect_field(points, |p| p.cloud_cover_pct));
    let humidity_pct = simple_mean(&collect_field(points, |p| p.humidity_pct));
    let pressure_hpa = simple_mean(&collect_field(points, |p| p.pressure_hpa));
    let cape_j_kg = simple_mean(&collect_field(points, |p| p.cape_j_kg));

    let significant_count = reports.iter().filter(|r| r.is_significant()).count();
    let overall_confidence = ((temperature_confidence + wind_confidence + precipitation_confidence) / 3.0
        - (0.1 * significant_count as f64).min(0.3))
    .max(0.1);
    let has_significant_inconsistencies = significant_count > 0;

    UnifiedForecast {
        timestamp,
        forecast_hour,
        latitude,
        longitude,
        temperature_celsius,
        wind_speed_ms,
        wind_direction_deg,
        precipitation_mm,
        cloud_cover_pct,
        humidity_pct,
        pressure_hpa,
        cape_j_kg,
        temperature_confidence,
        wind_confidence,
        precipitation_confidence,
        overall_confidence,
        confidence_level: ConfidenceLevel::from_confidence(overall_confidence),
        temperature_contributions,
        wind_contributions,
        precipitation_contributions,
        sources_used: sources_used.clone(),
        sources_available: sources_used.len(),
        inconsistencies: reports,
        has_significant_inconsistencies,
        fusion_method: "weighted_average".to_string(),
    }
}

/// Fuses a full set of per-hour readings, grouped by `forecast_hour`,
/// with each hour's timestamp derived as `base_time + forecast_hour`.
pub fn fuse_all(
    points_by_hour: &HashMap<u32, Vec<NormalizedPoint>>,
    base_time: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
) -> Vec<UnifiedForecast> {
    let mut hours: Vec<&u32> = points_by_hour.keys().collect();
    hours.sort();
    hours
        .into_iter()
        .map(|h| {
            let timestamp = base_time + chrono::Duration::hours(*h as i64);
            fuse(*h, timestamp, latitude, longitude, &points_by_hour[h])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(source: SourceID, temp: f64, dir: f64) -> NormalizedPoint {
        NormalizedPoint::new(
            source, Utc::now(), 0, -34.6, -58.4,
            Some(temp), Some(5.0), Some(dir), Some(0.0), Some(20.0), Some(60.0), Some(1013.0), None,
        )
    }

    #[test]
    fn empty_input_yields_a_valid_empty_forecast() {
        let now = Utc::now();
        let fused = fuse(0, now, -34.6, -58.4, &[]);
        assert_eq!(fused.overall_confidence, 0.0);
        assert_eq!(fused.confidence_level, ConfidenceLevel::VeryLow);
        assert_eq!(fused.sources_available, 0);
        assert!(fused.temperature_celsius.is_none());
    }

    #[test]
    fn fusion_is_order_independent() {
        let now = Utc::now();
        let a = vec![point(SourceID::WrfSmn, 20.0, 10.0), point(SourceID::WindyGfs, 22.0, 350.0)];
        let b = vec![point(SourceID::WindyGfs, 22.0, 350.0), point(SourceID::WrfSmn, 20.0, 10.0)];
        let fa = fuse(0, now, -34.6, -58.4, &a);
        let fb = fuse(0, now, -34.6, -58.4, &b);
        assert!((fa.temperature_celsius.unwrap() - fb.temperature_celsius.unwrap()).abs() < 1e-9);
        assert!((fa.wind_direction_deg.unwrap() - fb.wind_direction_deg.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn circular_mean_wraps_across_zero() {
        let points = vec![point(SourceID::WrfSmn, 20.0, 350.0), point(SourceID::WindyGfs, 20.0, 10.0)];
        let fused = fuse(0, Utc::now(), -34.6, -58.4, &points);
        let dir = fused.wind_direction_deg.unwrap();
        assert!(dir < 1.0 || dir > 359.0, "expected mean near 0/360, got {dir}");
    }

    #[test]
    fn single_source_confidence_is_capped() {
        let points = vec![point(SourceID::WrfSmn, 20.0, 10.0)];
        let fused = fuse(0, Utc::now(), -34.6, -58.4, &points);
        assert!(fused.overall_confidence <= 0.5);
    }

    #[test]
    fn more_agreeing_sources_raise_confidence() {
        let now = Utc::now();
        let few = vec![point(SourceID::WrfSmn, 20.0, 10.0), point(SourceID::WindyGfs, 20.1, 11.0)];
        let many = vec![
            point(SourceID::WrfSmn, 20.0, 10.0),
            point(SourceID::WindyGfs, 20.1, 11.0),
            point(SourceID::WindyEcmwf, 19.9, 9.0),
            point(SourceID::WindyIcon, 20.2, 10.5),
        ];
        assert!(
            fuse(0, now, -34.6, -58.4, &many).overall_confidence
                > fuse(0, now, -34.6, -58.4, &few).overall_confidence
        );
    }

    #[test]
    fn per_variable_contribution_weights_sum_to_one() {
        let points = vec![
            point(SourceID::WrfSmn, 20.0, 10.0),
            point(SourceID::WindyGfs, 21.0, 11.0),
            point(SourceID::WindyEcmwf, 19.5, 9.0),
        ];
        let fused = fuse(10, Utc::now(), -34.6, -58.4, &points);
        let total: f64 = fused.temperature_contributions.iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }
}
