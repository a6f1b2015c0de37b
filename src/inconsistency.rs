//! Cross-source inconsistency detection.
//!
//! For each scalar variable at a forecast hour, computes sample
//! standard deviation, coefficient of variation, and per-source
//! outlier flags, then blends them into one severity in `[0, 1]`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::{InconsistencyReport, NormalizedPoint, SourceID};

struct FieldThreshold {
    variable: &'static str,
    max_std: f64,
    max_range: f64,
    outlier_factor: f64,
}

const THRESHOLDS: &[FieldThreshold] = &[
    FieldThreshold { variable: "temperature", max_std: 3.0, max_range: 8.0, outlier_factor: 2.0 },
    FieldThreshold { variable: "wind_speed", max_std: 4.0, max_range: 10.0, outlier_factor: 2.0 },
    FieldThreshold { variable: "precipitation", max_std: 5.0, max_range: 15.0, outlier_factor: 2.5 },
    FieldThreshold { variable: "cloud_cover", max_std: 20.0, max_range: 50.0, outlier_factor: 2.0 },
];

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator); 0.0 for n < 2.
fn sample_stddev(values: &[f64], m: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

fn field_values(points: &[NormalizedPoint], variable: &str) -> Vec<(SourceID, f64)> {
    points
        .iter()
        .filter_map(|p| {
            let v = match variable {
                "temperature" => p.temperature_celsius,
                "wind_speed" => p.wind_speed_ms,
                "precipitation" => p.precipitation_mm,
                "cloud_cover" => p.cloud_cover_pct,
                _ => None,
            };
            v.map(|v| (p.source, v))
        })
        .collect()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn detect_field(
    threshold: &FieldThreshold,
    points: &[NormalizedPoint],
    timestamp: DateTime<Utc>,
    forecast_hour: u32,
) -> Option<InconsistencyReport> {
    let values = field_values(points, threshold.variable);
    if values.len() < 2 {
        return None;
    }
    let raw: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    let m = mean(&raw);
    let std = sample_stddev(&raw, m);
    let cv = if m.abs() > 1e-9 { (std / m.abs()).abs() } else { 0.0 };
    let max_deviation = raw.iter().cloned().fold(f64::MIN, f64::max)
        - raw.iter().cloned().fold(f64::MAX, f64::min);

    let outlier_sources: Vec<SourceID> = values
        .iter()
        .filter(|(_, v)| (v - m).abs() > threshold.outlier_factor * std.max(1e-9))
        .map(|(s, _)| *s)
        .collect();

    let std_severity = (std / threshold.max_std).min(1.0);
    let range_severity = (max_deviation / threshold.max_range).min(1.0);
    let cv_severity = (cv / 0.5).min(1.0);
    let severity = round3((0.4 * std_severity + 0.4 * range_severity + 0.2 * cv_severity).clamp(0.0, 1.0));

    if severity <= 0.1 {
        return None;
    }

    Some(InconsistencyReport {
        variable: threshold.variable.to_string(),
        timestamp,
        forecast_hour,
        source_values: values.into_iter().collect::<HashMap<_, _>>(),
        mean: m,
        stddev: std,
        max_deviation,
        coefficient_of_variation: cv,
        outlier_sources,
        severity,
    })
}

/// Evaluates every tracked variable across `points` (all readings for
/// a single forecast hour, one per source) and returns one report per
/// variable whose severity exceeds 0.1.
pub fn detect(
    timestamp: DateTime<Utc>,
    forecast_hour: u32,
    points: &[NormalizedPoint],
) -> Vec<InconsistencyReport> {
    THRESHOLDS
        .iter()
        .filter_map(|t| detect_field(t, points, timestamp, forecast_hour))
        .collect()
}

/// Penalizes each source's base weight for the variable by
/// `max(0.5, 1 - 0.1*count)` where `count` is how many times that
/// source was flagged an outlier in `reports`, then renormalizes the
/// result to sum to 1.
pub fn adjust_weights(
    base_weights: &HashMap<SourceID, f64>,
    reports: &[&InconsistencyReport],
) -> HashMap<SourceID, f64> {
    let mut outlier_counts: HashMap<SourceID, u32> = HashMap::new();
    for report in reports {
        for source in &report.outlier_sources {
            *outlier_counts.entry(*source).or_insert(0) += 1;
        }
    }

    let mut adjusted: HashMap<SourceID, f64> = base_weights
        .iter()
        .map(|(source, weight)| {
            let count = outlier_counts.get(source).copied().unwrap_or(0);
            (*source, weight * (1.0 - 0.1 * count as f64).max(0.5))
        })
        .collect();

    let total: f64 = adjusted.values().sum();
    if total > 0.0 {
        for w in adjusted.values_mut() {
            *w /= total;
        }
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NormalizedPoint;
    use chrono::Utc;

    fn point(source: SourceID, temp: f64) -> NormalizedPoint {
        NormalizedPoint::new(
            source, Utc::now(), 0, -34.6, -58.4,
            Some(temp), Some(5.0), Some(180.0), Some(0.0), Some(20.0), Some(60.0), Some(1013.0), None,
        )
    }

    #[test]
    fn agreeing_sources_are_consistent() {
        let points = vec![
            point(SourceID::WindyGfs, 20.0),
            point(SourceID::WindyEcmwf, 20.2),
            point(SourceID::WrfSmn, 19.9),
        ];
        let reports = detect(Utc::now(), 0, &points);
        assert!(reports.is_empty());
    }

    #[test]
    fn diverging_temperature_is_flagged() {
        let points = vec![
            point(SourceID::WindyGfs, 15.0),
            point(SourceID::WindyEcmwf, 25.0),
            point(SourceID::WrfSmn, 30.0),
        ];
        let reports = detect(Utc::now(), 0, &points);
        assert!(reports.iter().any(|r| r.variable == "temperature"));
        assert!(reports.iter().all(|r| r.severity > 0.1));
    }

    #[test]
    fn adjust_weights_penalizes_outlier_sources_and_renormalizes() {
        let mut base = HashMap::new();
        base.insert(SourceID::WindyGfs, 0.5);
        base.insert(SourceID::WindyEcmwf, 0.5);

        let report = InconsistencyReport {
            variable: "temperature".to_string(),
            timestamp: Utc::now(),
            forecast_hour: 0,
            source_values: HashMap::new(),
            mean: 20.0,
            stddev: 5.0,
            max_deviation: 10.0,
            coefficient_of_variation: 0.25,
            outlier_sources: vec![SourceID::WindyGfs],
            severity: 0.5,
        };

        let adjusted = adjust_weights(&base, &[&report]);
        let total: f64 = adjusted.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(adjusted[&SourceID::WindyGfs] < adjusted[&SourceID::WindyEcmwf]);
    }
}
