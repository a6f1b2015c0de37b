//! Detects named meteorological patterns across a unified forecast
//! series: heat/cold waves (hour-count based), frost tiers, severe
//! convection (CAPE-based, falling back to a precipitation/wind
//! proxy), and standalone extreme-heat excursions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{DetectedPattern, PatternKind, RiskLevel, UnifiedForecast};

const HEAT_WAVE_DAY_C: f64 = 35.0;
const EXTREME_HEAT_C: f64 = 40.0;
const COLD_WAVE_C: f64 = 5.0;
const FROST_C: f64 = 0.0;
const SEVERE_FROST_C: f64 = -5.0;
const FROST_HIGH_C: f64 = -2.0;
const CAPE_MODERATE: f64 = 1000.0;
const CAPE_STRONG: f64 = 2000.0;
const CAPE_EXTREME: f64 = 3000.0;
const CONVECTIVE_PRECIP_MM: f64 = 15.0;
const CONVECTIVE_WIND_MS: f64 = 15.0;

fn series_bounds(forecasts: &[UnifiedForecast]) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = forecasts.iter().map(|f| f.timestamp).min().unwrap_or_else(Utc::now);
    let until = forecasts.iter().map(|f| f.timestamp).max().unwrap_or(from);
    (from, until)
}

fn max_field<F: Fn(&UnifiedForecast) -> Option<f64>>(forecasts: &[UnifiedForecast], f: F) -> Option<f64> {
    forecasts.iter().filter_map(|p| f(p)).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

fn min_field<F: Fn(&UnifiedForecast) -> Option<f64>>(forecasts: &[UnifiedForecast], f: F) -> Option<f64> {
    forecasts.iter().filter_map(|p| f(p)).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
}

fn recommendations_for(kind: PatternKind, level: RiskLevel) -> Vec<String> {
    let base: &[&str] = match kind {
        PatternKind::HeatWave => &[
            "Hidratarse frecuentemente y evitar esfuerzos al mediodía.",
            "Reprogramar actividades al aire libre para las horas de menor calor.",
        ],
        PatternKind::ColdWave => &[
            "Proteger cultivos y ganado de las bajas temperaturas sostenidas.",
            "Abrigar a personas y animales, especial atención a grupos vulnerables.",
        ],
        PatternKind::Frost => &[
            "Proteger cultivos sensibles a heladas.",
            "Verificar sistemas de calefacción y aislamiento.",
        ],
        PatternKind::SevereConvection => &[
            "Asegurar objetos sueltos y posponer actividades al aire libre.",
            "Vigilar alertas de granizo y ráfagas durante el evento.",
        ],
        PatternKind::ExtremeHeat => &[
            "Evitar exposición solar prolongada entre las 12 y las 17hs.",
            "Monitorear síntomas de golpe de calor en poblaciones vulnerables.",
        ],
    };
    let mut recs: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if level == RiskLevel::Extreme {
        recs.push("Considerar la suspensión de actividades no esenciales.".to_string());
    }
    recs
}

fn title_for(kind: PatternKind, level: RiskLevel) -> String {
    match kind {
        PatternKind::HeatWave => "Ola de Calor".to_string(),
        PatternKind::ColdWave => "Ola de Frío".to_string(),
        PatternKind::Frost => {
            if level == RiskLevel::Extreme {
                "Helada Severa".to_string()
            } else {
                "Helada".to_string()
            }
        }
        PatternKind::SevereConvection => "Tormenta Severa".to_string(),
        PatternKind::ExtremeHeat => "Calor Extremo".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_pattern(
    kind: PatternKind,
    risk_level: RiskLevel,
    confidence: f64,
    trigger_values: HashMap<String, f64>,
    thresholds_exceeded: Vec<String>,
    description: String,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> DetectedPattern {
    DetectedPattern {
        kind,
        risk_level,
        confidence,
        title: title_for(kind, risk_level),
        description,
        trigger_values,
        thresholds_exceeded,
        recommendations: recommendations_for(kind, risk_level),
        detected_at: valid_from,
        valid_from,
        valid_until,
    }
}

fn detect_heat_wave(forecasts: &[UnifiedForecast], from: DateTime<Utc>, until: DateTime<Utc>) -> Option<DetectedPattern> {
    let high_temp_hours =
        forecasts.iter().filter(|f| f.temperature_celsius.map_or(false, |t| t >= HEAT_WAVE_DAY_C)).count();
    let high_days = high_temp_hours as f64 / 24.0;
    if high_days < 2.0 {
        return None;
    }
    let max_temp = max_field(forecasts, |f| f.temperature_celsius).unwrap_or(HEAT_WAVE_DAY_C);
    let (level, confidence) = if max_temp >= EXTREME_HEAT_C || high_days >= 5.0 {
        (RiskLevel::Extreme, 0.85)
    } else if high_days >= 3.0 {
        (RiskLevel::High, 0.80)
    } else {
        (RiskLevel::Moderate, 0.70)
    };
    let mut thresholds_exceeded = vec!["heat_wave_day".to_string()];
    if max_temp >= EXTREME_HEAT_C {
        thresholds_exceeded.push("extreme_heat".to_string());
    }
    let trigger_values = HashMap::from([
        ("high_temp_hours".to_string(), high_temp_hours as f64),
        ("days_above_threshold".to_string(), high_days),
        ("max_temp".to_string(), max_temp),
    ]);
    Some(build_pattern(
        PatternKind::HeatWave,
        level,
        confidence,
        trigger_values,
        thresholds_exceeded,
        format!(
            "{high_days:.1} días con temperatura en o por encima de {HEAT_WAVE_DAY_C}C, máxima {max_temp:.1}C"
        ),
        from,
        until,
    ))
}

fn detect_cold_wave(forecasts: &[UnifiedForecast], from: DateTime<Utc>, until: DateTime<Utc>) -> Option<DetectedPattern> {
    let low_temp_hours =
        forecasts.iter().filter(|f| f.temperature_celsius.map_or(false, |t| t <= COLD_WAVE_C)).count();
    let low_days = low_temp_hours as f64 / 24.0;
    if low_days < 2.0 {
        return None;
    }
    let min_temp = min_field(forecasts, |f| f.temperature_celsius).unwrap_or(COLD_WAVE_C);
    let (level, confidence) = if min_temp <= SEVERE_FROST_C || low_days >= 5.0 {
        (RiskLevel::Extreme, 0.85)
    } else if low_days >= 3.0 {
        (RiskLevel::High, 0.80)
    } else {
        (RiskLevel::Moderate, 0.70)
    };
    let mut thresholds_exceeded = vec!["cold_wave".to_string()];
    if min_temp <= SEVERE_FROST_C {
        thresholds_exceeded.push("severe_frost".to_string());
    }
    let trigger_values = HashMap::from([
        ("low_temp_hours".to_string(), low_temp_hours as f64),
        ("days_below_threshold".to_string(), low_days),
        ("min_temp".to_string(), min_temp),
    ]);
    Some(build_pattern(
        PatternKind::ColdWave,
        level,
        confidence,
        trigger_values,
        thresholds_exceeded,
        format!(
            "{low_days:.1} días con temperatura en o por debajo de {COLD_WAVE_C}C, mínima {min_temp:.1}C"
        ),
        from,
        until,
    ))
}

fn detect_frost(forecasts: &[UnifiedForecast], from: DateTime<Utc>, until: DateTime<Utc>) -> Option<DetectedPattern> {
    let min_temp = min_field(forecasts, |f| f.temperature_celsius)?;
    if min_temp > FROST_C {
        return None;
    }
    let (level, confidence) = if min_temp <= SEVERE_FROST_C {
        (RiskLevel::Extreme, 0.90)
    } else if min_temp <= FROST_HIGH_C {
        (RiskLevel::High, 0.85)
    } else {
        (RiskLevel::Moderate, 0.80)
    };
    let mut thresholds_exceeded = vec!["frost".to_string()];
    if min_temp <= SEVERE_FROST_C {
        thresholds_exceeded.push("severe_frost".to_string());
    } else if min_temp <= FROST_HIGH_C {
        thresholds_exceeded.push("frost_high".to_string());
    }
    let trigger_values = HashMap::from([("min_temp".to_string(), min_temp)]);
    Some(build_pattern(
        PatternKind::Frost,
        level,
        confidence,
        trigger_values,
        thresholds_exceeded,
        format!("Temperatura mínima de {min_temp:.1}C"),
        from,
        until,
    ))
}

fn detect_extreme_heat(forecasts: &[UnifiedForecast], from: DateTime<Utc>, until: DateTime<Utc>) -> Option<DetectedPattern> {
    let max_temp = max_field(forecasts, |f| f.temperature_celsius)?;
    if max_temp < EXTREME_HEAT_C {
        return None;
    }
    let trigger_values = HashMap::from([("max_temp".to_string(), max_temp)]);
    Some(build_pattern(
        PatternKind::ExtremeHeat,
        RiskLevel::Extreme,
        0.90,
        trigger_values,
        vec!["extreme_heat".to_string()],
        format!("Temperatura máxima de {max_temp:.1}C"),
        from,
        until,
    ))
}

fn detect_severe_convection(forecasts: &[UnifiedForecast], from: DateTime<Utc>, until: DateTime<Utc>) -> Option<DetectedPattern> {
    let max_cape = max_field(forecasts, |f| f.cape_j_kg);
    if let Some(cape) = max_cape {
        if cape >= CAPE_MODERATE {
            let (level, confidence) = if cape >= CAPE_EXTREME {
                (RiskLevel::Extreme, 0.9)
            } else if cape >= CAPE_STRONG {
                (RiskLevel::High, 0.8)
            } else {
                (RiskLevel::Moderate, 0.7)
            };
            let trigger_values = HashMap::from([("max_cape".to_string(), cape)]);
            return Some(build_pattern(
                PatternKind::SevereConvection,
                level,
                confidence,
                trigger_values,
                vec!["cape_moderate".to_string()],
                format!("CAPE máximo de {cape:.0} J/kg"),
                from,
                until,
            ));
        }
    }

    let max_precip = max_field(forecasts, |f| f.precipitation_mm).unwrap_or(0.0);
    let max_wind = max_field(forecasts, |f| f.wind_speed_ms).unwrap_or(0.0);
    if max_precip >= CONVECTIVE_PRECIP_MM && max_wind >= CONVECTIVE_WIND_MS {
        let risk = max_precip / 50.0 + max_wind / 30.0;
        let (level, confidence) = if risk >= 1.5 {
            (RiskLevel::High, 0.6)
        } else if risk >= 1.0 {
            (RiskLevel::Moderate, 0.5)
        } else {
            return None;
        };
        let trigger_values = HashMap::from([
            ("max_precip".to_string(), max_precip),
            ("max_wind".to_string(), max_wind),
            ("risk".to_string(), risk),
        ]);
        return Some(build_pattern(
            PatternKind::SevereConvection,
            level,
            confidence,
            trigger_values,
            vec!["precip_wind_proxy".to_string()],
            format!("Precipitación {max_precip:.1}mm/h y viento {max_wind:.1}m/s sostenidos"),
            from,
            until,
        ));
    }

    None
}

/// Scans a forecast series (any horizon, any number of hours) and
/// returns every pattern detected within it.
pub fn detect(forecasts: &[UnifiedForecast]) -> Vec<DetectedPattern> {
    if forecasts.is_empty() {
        return Vec::new();
    }
    let (from, until) = series_bounds(forecasts);
    [
        detect_severe_convection(forecasts, from, until),
        detect_heat_wave(forecasts, from, until),
        detect_cold_wave(forecasts, from, until),
        detect_frost(forecasts, from, until),
        detect_extreme_heat(forecasts, from, until),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crate::domain::ConfidenceLevel;

    fn forecast_at(hour: u32, temp: f64) -> UnifiedForecast {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour as i64);
        UnifiedForecast {
            timestamp: ts,
            forecast_hour: hour,
            latitude: -34.6,
            longitude: -58.4,
            temperature_celsius: Some(temp),
            wind_speed_ms: None,
            wind_direction_deg: None,
            precipitation_mm: None,
            cloud_cover_pct: None,
            humidity_pct: None,
            pressure_hpa: None,
            cape_j_kg: None,
            temperature_confidence: 1.0,
            wind_confidence: 1.0,
            precipitation_confidence: 1.0,
            overall_confidence: 1.0,
            confidence_level: ConfidenceLevel::VeryHigh,
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
    fn detects_heat_wave_at_high() {
        let forecasts: Vec<_> = (0..72).map(|h| forecast_at(h, 36.0)).collect();
        let patterns = detect(&forecasts);
        let heat_wave = patterns.iter().find(|p| p.kind == PatternKind::HeatWave).unwrap();
        assert_eq!(heat_wave.risk_level, RiskLevel::High);
        assert!((heat_wave.confidence - 0.80).abs() < 1e-9);
    }

    #[test]
    fn two_hot_days_is_not_a_heat_wave() {
        let forecasts: Vec<_> = (0..48).map(|h| forecast_at(h, 36.0)).collect();
        let patterns = detect(&forecasts);
        assert!(!patterns.iter().any(|p| p.kind == PatternKind::HeatWave));
    }

    #[test]
    fn detects_frost_at_high_not_severe() {
        let forecasts = vec![forecast_at(0, -3.0)];
        let patterns = detect(&forecasts);
        let frost = patterns.iter().find(|p| p.kind == PatternKind::Frost).unwrap();
        assert_eq!(frost.risk_level, RiskLevel::High);
        assert!((frost.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn detects_severe_frost() {
        let forecasts = vec![forecast_at(0, -6.0)];
        let patterns = detect(&forecasts);
        let frost = patterns.iter().find(|p| p.kind == PatternKind::Frost).unwrap();
        assert_eq!(frost.risk_level, RiskLevel::Extreme);
    }

    #[test]
    fn severe_convection_falls_back_to_precipitation_wind_proxy() {
        let mut f = forecast_at(0, 25.0);
        f.precipitation_mm = Some(40.0);
        f.wind_speed_ms = Some(20.0);
        let patterns = detect(&[f]);
        assert!(patterns.iter().any(|p| p.kind == PatternKind::SevereConvection));
    }

    #[test]
    fn every_pattern_populates_required_fields() {
        let forecasts = vec![forecast_at(0, -6.0)];
        let patterns = detect(&forecasts);
        for p in &patterns {
            assert!(!p.trigger_values.is_empty());
            assert!(!p.thresholds_exceeded.is_empty());
            assert!(!p.recommendations.is_empty());
            assert!(!p.title.is_empty());
        }
    }
}
