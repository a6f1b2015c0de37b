//! Operational alert generation, SMN-style: five levels (0 through 4),
//! one alert per phenomenon, decremented a level when the underlying
//! forecast confidence is low, plus window-scan alerts over near-term
//! forecast buckets independent of any detected pattern.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::{level_name, DetectedPattern, OperationalAlert, PatternKind, RiskLevel, UnifiedForecast};

/// How far ahead a detected pattern is still worth alerting on.
const ALERT_HORIZON_HOURS: i64 = 72;

/// Confidence below this threshold knocks one level off the raw
/// risk-level-derived level — a low-confidence level 4 becomes a 3.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// `(lower, upper)` hour bound describing how far ahead an alert of
/// this level is expected to still be relevant.
fn horizon_window(level: u8) -> (i64, i64) {
    match level {
        0 => (24, 72),
        1 => (24, 48),
        2 => (12, 24),
        3 => (3, 12),
        4 => (0, 3),
        _ => (0, 3),
    }
}

fn base_level(risk_level: RiskLevel) -> u8 {
    match risk_level {
        RiskLevel::Low => 1,
        RiskLevel::Moderate => 2,
        RiskLevel::High => 3,
        RiskLevel::Extreme => 4,
    }
}

fn decrement(level: u8) -> u8 {
    level.saturating_sub(1)
}

fn phenomenon_name(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::HeatWave => "ola de calor",
        PatternKind::ColdWave => "ola de frío",
        PatternKind::Frost => "helada",
        PatternKind::SevereConvection => "tormentas severas",
        PatternKind::ExtremeHeat => "calor extremo",
    }
}

/// Average confidence of unified forecasts whose timestamp falls
/// within `pattern`'s `valid_from..=valid_until` window; `None` if
/// nothing overlaps.
fn confidence_for_window(pattern: &DetectedPattern, forecasts: &[UnifiedForecast]) -> Option<f64> {
    let matching: Vec<f64> = forecasts
        .iter()
        .filter(|f| f.timestamp >= pattern.valid_from && f.timestamp <= pattern.valid_until)
        .map(|f| f.overall_confidence)
        .collect();
    if matching.is_empty() {
        None
    } else {
        Some(matching.iter().sum::<f64>() / matching.len() as f64)
    }
}

fn make_alert(
    phenomenon: String,
    level: u8,
    description: String,
    now: DateTime<Utc>,
    expected_impact: Vec<String>,
    recommendation: String,
) -> OperationalAlert {
    let (lo, hi) = horizon_window(level);
    OperationalAlert {
        level,
        level_name: level_name(level).to_string(),
        phenomenon,
        description,
        time_window: format!("{lo}-{hi}h"),
        horizon_hours: hi,
        proximity: None,
        expected_impact,
        recommendation,
        valid_from: now + chrono::Duration::hours(lo),
        valid_until: now + chrono::Duration::hours(hi),
    }
}

fn pattern_recommendation(pattern: &DetectedPattern) -> String {
    pattern.recommendations.first().cloned().unwrap_or_else(|| "Monitorear la evolución del pronóstico.".to_string())
}

fn alerts_from_patterns(
    patterns: &[DetectedPattern],
    forecasts: &[UnifiedForecast],
    now: DateTime<Utc>,
) -> Vec<OperationalAlert> {
    let horizon = now + chrono::Duration::hours(ALERT_HORIZON_HOURS);
    let mut out = Vec::new();

    for pattern in patterns {
        if pattern.valid_from > horizon || pattern.valid_until < now {
            continue;
        }

        let confidence = confidence_for_window(pattern, forecasts).unwrap_or(pattern.confidence);
        let mut level = base_level(pattern.risk_level);
        if confidence < LOW_CONFIDENCE_THRESHOLD && level > 1 {
            level = decrement(level);
        }

        out.push(make_alert(
            phenomenon_name(pattern.kind).to_string(),
            level,
            format!("{}: {}", pattern.title, pattern.description),
            now,
            vec![pattern.title.clone()],
            pattern_recommendation(pattern),
        ));
    }
    out
}

struct Bucket {
    label: &'static str,
    lo: u32,
    hi: u32,
}

const BUCKETS: &[Bucket] = &[
    Bucket { label: "0-3h", lo: 0, hi: 3 },
    Bucket { label: "3-12h", lo: 3, hi: 12 },
    Bucket { label: "12-24h", lo: 12, hi: 24 },
    Bucket { label: "24-48h", lo: 24, hi: 48 },
];

fn alerts_from_window_scan(forecasts: &[UnifiedForecast], now: DateTime<Utc>) -> Vec<OperationalAlert> {
    let mut out = Vec::new();

    for bucket in BUCKETS {
        let in_bucket: Vec<&UnifiedForecast> = forecasts
            .iter()
            .filter(|f| f.forecast_hour >= bucket.lo && f.forecast_hour < bucket.hi)
            .collect();
        if in_bucket.is_empty() {
            continue;
        }

        let max_precip = in_bucket.iter().filter_map(|f| f.precipitation_mm).fold(0.0_f64, f64::max);
        let max_wind = in_bucket.iter().filter_map(|f| f.wind_speed_ms).fold(0.0_f64, f64::max);
        let max_temp = in_bucket.iter().filter_map(|f| f.temperature_celsius).fold(f64::MIN, f64::max);
        let min_temp = in_bucket.iter().filter_map(|f| f.temperature_celsius).fold(f64::MAX, f64::min);

        let near = matches!(bucket.label, "0-3h");
        let soon = matches!(bucket.label, "0-3h" | "3-12h");

        if max_precip >= 30.0 {
            let level = if near { 4 } else if bucket.label == "3-12h" { 3 } else { 2 };
            out.push(make_alert(
                "lluvia intensa".to_string(),
                level,
                format!("Lluvia intensa esperada ({max_precip:.0}mm/h) en la ventana {}", bucket.label),
                now,
                vec!["lluvia intensa".to_string()],
                "Evitar zonas anegables y circulación innecesaria.".to_string(),
            ));
        }
        if max_wind >= 20.0 {
            let level = if near { 3 } else if bucket.label == "3-12h" { 2 } else { 1 };
            out.push(make_alert(
                "vientos fuertes".to_string(),
                level,
                format!("Vientos fuertes esperados ({max_wind:.0}m/s) en la ventana {}", bucket.label),
                now,
                vec!["vientos fuertes".to_string()],
                "Asegurar objetos sueltos y estructuras livianas.".to_string(),
            ));
        }
        if max_temp >= 40.0 {
            out.push(make_alert(
                "calor extremo".to_string(),
                3,
                format!("Temperatura extrema esperada ({max_temp:.0}C) en la ventana {}", bucket.label),
                now,
                vec!["calor extremo".to_string()],
                "Evitar exposición solar prolongada.".to_string(),
            ));
        }
        if min_temp <= 0.0 {
            let level = if soon { 3 } else { 2 };
            out.push(make_alert(
                "heladas".to_string(),
                level,
                format!("Heladas esperadas ({min_temp:.0}C) en la ventana {}", bucket.label),
                now,
                vec!["heladas".to_string()],
                "Proteger cultivos y personas sensibles al frío.".to_string(),
            ));
        }
    }
    out
}

/// Builds pattern-derived and window-scan alerts, deduplicates by
/// phenomenon keeping the maximum level and concatenating expected
/// impacts, and emits a single normal-condition alert if nothing else
/// fired.
pub fn generate(
    patterns: &[DetectedPattern],
    forecasts: &[UnifiedForecast],
    now: DateTime<Utc>,
) -> Vec<OperationalAlert> {
    let mut candidates = alerts_from_patterns(patterns, forecasts, now);
    candidates.extend(alerts_from_window_scan(forecasts, now));

    let mut best: HashMap<String, OperationalAlert> = HashMap::new();
    for alert in candidates {
        best.entry(alert.phenomenon.clone())
            .and_modify(|existing| {
                if alert.level > existing.level {
                    let mut impact = alert.expected_impact.clone();
                    impact.extend(existing.expected_impact.drain(..));
                    *existing = alert.clone();
                    existing.expected_impact = impact;
                } else {
                    existing.expected_impact.extend(alert.expected_impact.clone());
                }
            })
            .or_insert(alert);
    }

    let mut alerts: Vec<OperationalAlert> = best.into_values().collect();
    alerts.sort_by(|a, b| b.level.cmp(&a.level).then(a.valid_from.cmp(&b.valid_from)));

    if alerts.is_empty() {
        alerts.push(make_alert(
            "condición normal".to_string(),
            0,
            "Sin fenómenos significativos detectados.".to_string(),
            now,
            vec![],
            "Ninguna acción requerida.".to_string(),
        ));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfidenceLevel;
    use chrono::TimeZone;

    fn pattern(kind: PatternKind, risk_level: RiskLevel, confidence: f64, now: DateTime<Utc>) -> DetectedPattern {
        DetectedPattern {
            kind,
            risk_level,
            confidence,
            title: "Test".to_string(),
            description: "test pattern".into(),
            trigger_values: HashMap::new(),
            thresholds_exceeded: vec![],
            recommendations: vec!["Monitorear.".to_string()],
            detected_at: now,
            valid_from: now,
            valid_until: now + chrono::Duration::hours(24),
        }
    }

    fn forecast(now: DateTime<Utc>, confidence: f64) -> UnifiedForecast {
        UnifiedForecast {
            timestamp: now,
            forecast_hour: 0,
            latitude: -34.6,
            longitude: -58.4,
            temperature_celsius: Some(35.0),
            wind_speed_ms: None,
            wind_direction_deg: None,
            precipitation_mm: None,
            cloud_cover_pct: None,
            humidity_pct: None,
            pressure_hpa: None,
            cape_j_kg: None,
            temperature_confidence: confidence,
            wind_confidence: confidence,
            precipitation_confidence: confidence,
            overall_confidence: confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
            temperature_contributions: vec![],
            wind_contributions: vec![],
            precipitation_contributions: vec![],
            sources_used: vec![],
            sources_available: 0,
            inconsistencies: vec![],
            has_significant_inconsistencies: false,
            fusion_method: "weighted_average".to_string(),
        }
    }

    #[test]
    fn extreme_pattern_high_confidence_yields_level_four() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let patterns = vec![pattern(PatternKind::HeatWave, RiskLevel::Extreme, 0.9, now)];
        let forecasts = vec![forecast(now, 0.95)];
        let alerts = generate(&patterns, &forecasts, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, 4);
    }

    #[test]
    fn low_confidence_decrements_level() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let patterns = vec![pattern(PatternKind::HeatWave, RiskLevel::Extreme, 0.9, now)];
        let forecasts = vec![forecast(now, 0.2)];
        let alerts = generate(&patterns, &forecasts, now);
        assert_eq!(alerts[0].level, 3);
    }

    #[test]
    fn expired_patterns_are_dropped() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut p = pattern(PatternKind::Frost, RiskLevel::Moderate, 0.5, now);
        p.valid_from = now - chrono::Duration::hours(200);
        p.valid_until = now - chrono::Duration::hours(100);
        let alerts = generate(&[p], &[], now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, 0);
    }

    #[test]
    fn duplicate_phenomenon_keeps_max_level() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let low = pattern(PatternKind::Frost, RiskLevel::Low, 0.9, now);
        let high = pattern(PatternKind::Frost, RiskLevel::Extreme, 0.9, now);
        let forecasts = vec![forecast(now, 0.9)];
        let alerts = generate(&[low, high], &forecasts, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, 4);
    }

    #[test]
    fn window_scan_flags_intense_rain() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut f = forecast(now, 0.9);
        f.forecast_hour = 1;
        f.precipitation_mm = Some(40.0);
        let alerts = generate(&[], &[f], now);
        assert!(alerts.iter().any(|a| a.phenomenon == "lluvia intensa" && a.level == 4));
    }

    #[test]
    fn no_findings_emits_normal_condition_alert() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let alerts = generate(&[], &[], now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, 0);
        assert_eq!(alerts[0].level_name, "Condición Normal");
    }
}
