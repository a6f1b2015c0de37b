//! Profile-adjusted risk scoring: 8 consumer profiles, six 0-100
//! sub-scores (temperature/wind/precipitation/patterns weighted by
//! profile, storm/hail at a fixed weight), combined into one 0-5
//! score and a risk category.

use crate::domain::{
    DetectedPattern, OperationalAlert, PatternKind, RiskCategory, RiskProfile, RiskScore, SourceID,
    UnifiedForecast,
};

struct ProfileWeights {
    temperature: f64,
    wind: f64,
    precipitation: f64,
    patterns: f64,
}

struct TemperatureThresholds {
    cold: f64,
    hot: f64,
    optimal_min: f64,
    optimal_max: f64,
}

struct WindThresholds {
    moderate: f64,
    strong: f64,
    dangerous: f64,
}

struct PrecipThresholds {
    light: f64,
    moderate: f64,
    heavy: f64,
}

struct ProfileTable {
    weights: ProfileWeights,
    temperature: TemperatureThresholds,
    wind: WindThresholds,
    precipitation: PrecipThresholds,
}

const STORM_WEIGHT: f64 = 0.2;
const HAIL_WEIGHT: f64 = 0.2;

fn profile_table(profile: RiskProfile) -> ProfileTable {
    match profile {
        RiskProfile::General => ProfileTable {
            weights: ProfileWeights { temperature: 0.25, wind: 0.25, precipitation: 0.25, patterns: 0.25 },
            temperature: TemperatureThresholds { cold: 5.0, hot: 32.0, optimal_min: 18.0, optimal_max: 26.0 },
            wind: WindThresholds { moderate: 8.0, strong: 15.0, dangerous: 25.0 },
            precipitation: PrecipThresholds { light: 5.0, moderate: 15.0, heavy: 30.0 },
        },
        RiskProfile::Pilot => ProfileTable {
            weights: ProfileWeights { temperature: 0.15, wind: 0.45, precipitation: 0.20, patterns: 0.20 },
            temperature: TemperatureThresholds { cold: 0.0, hot: 35.0, optimal_min: 15.0, optimal_max: 28.0 },
            wind: WindThresholds { moderate: 6.0, strong: 12.0, dangerous: 20.0 },
            precipitation: PrecipThresholds { light: 2.0, moderate: 10.0, heavy: 20.0 },
        },
        RiskProfile::Trucker => ProfileTable {
            weights: ProfileWeights { temperature: 0.15, wind: 0.30, precipitation: 0.30, patterns: 0.25 },
            temperature: TemperatureThresholds { cold: 2.0, hot: 36.0, optimal_min: 15.0, optimal_max: 28.0 },
            wind: WindThresholds { moderate: 10.0, strong: 18.0, dangerous: 28.0 },
            precipitation: PrecipThresholds { light: 5.0, moderate: 15.0, heavy: 30.0 },
        },
        RiskProfile::Farmer => ProfileTable {
            weights: ProfileWeights { temperature: 0.30, wind: 0.15, precipitation: 0.35, patterns: 0.20 },
            temperature: TemperatureThresholds { cold: 3.0, hot: 34.0, optimal_min: 15.0, optimal_max: 27.0 },
            wind: WindThresholds { moderate: 10.0, strong: 20.0, dangerous: 30.0 },
            precipitation: PrecipThresholds { light: 5.0, moderate: 20.0, heavy: 40.0 },
        },
        RiskProfile::OutdoorSports => ProfileTable {
            weights: ProfileWeights { temperature: 0.30, wind: 0.25, precipitation: 0.25, patterns: 0.20 },
            temperature: TemperatureThresholds { cold: 8.0, hot: 30.0, optimal_min: 16.0, optimal_max: 24.0 },
            wind: WindThresholds { moderate: 8.0, strong: 14.0, dangerous: 22.0 },
            precipitation: PrecipThresholds { light: 2.0, moderate: 8.0, heavy: 20.0 },
        },
        RiskProfile::OutdoorEvent => ProfileTable {
            weights: ProfileWeights { temperature: 0.25, wind: 0.25, precipitation: 0.30, patterns: 0.20 },
            temperature: TemperatureThresholds { cold: 8.0, hot: 32.0, optimal_min: 17.0, optimal_max: 25.0 },
            wind: WindThresholds { moderate: 8.0, strong: 15.0, dangerous: 23.0 },
            precipitation: PrecipThresholds { light: 2.0, moderate: 8.0, heavy: 20.0 },
        },
        RiskProfile::Construction => ProfileTable {
            weights: ProfileWeights { temperature: 0.20, wind: 0.30, precipitation: 0.25, patterns: 0.25 },
            temperature: TemperatureThresholds { cold: 2.0, hot: 34.0, optimal_min: 14.0, optimal_max: 26.0 },
            wind: WindThresholds { moderate: 10.0, strong: 18.0, dangerous: 28.0 },
            precipitation: PrecipThresholds { light: 5.0, moderate: 15.0, heavy: 30.0 },
        },
        RiskProfile::Tourism => ProfileTable {
            weights: ProfileWeights { temperature: 0.30, wind: 0.20, precipitation: 0.30, patterns: 0.20 },
            temperature: TemperatureThresholds { cold: 10.0, hot: 32.0, optimal_min: 18.0, optimal_max: 26.0 },
            wind: WindThresholds { moderate: 8.0, strong: 15.0, dangerous: 25.0 },
            precipitation: PrecipThresholds { light: 2.0, moderate: 10.0, heavy: 25.0 },
        },
    }
}

/// Selects the forecasts to score: those within `hours_ahead`, or (if
/// none fall in that window) the first `hours_ahead` items available.
fn window<'a>(forecasts: &'a [UnifiedForecast], hours_ahead: u32) -> Vec<&'a UnifiedForecast> {
    let matching: Vec<&UnifiedForecast> =
        forecasts.iter().filter(|f| f.forecast_hour <= hours_ahead).collect();
    if !matching.is_empty() {
        return matching;
    }
    forecasts.iter().take(hours_ahead.max(1) as usize).collect()
}

fn temperature_sub_score(t: &TemperatureThresholds, forecasts: &[&UnifiedForecast]) -> f64 {
    let temps: Vec<f64> = forecasts.iter().filter_map(|f| f.temperature_celsius).collect();
    if temps.is_empty() {
        return 0.0;
    }
    let effective_max = temps.iter().cloned().fold(f64::MIN, f64::max);
    let effective_min = temps.iter().cloned().fold(f64::MAX, f64::min);

    let mut score = 0.0_f64;
    if effective_max > t.optimal_max {
        let excess = effective_max - t.optimal_max;
        let denom = (t.hot - t.optimal_max).max(1e-6);
        let mut base = (excess / denom * 100.0).min(100.0);
        if effective_max > 32.0 {
            base = (base * 1.3).min(100.0);
        }
        score = score.max(base);
    }
    if effective_min < t.optimal_min {
        let deficit = t.optimal_min - effective_min;
        let denom = (t.optimal_min - t.cold).max(1e-6);
        let base = (deficit / denom * 100.0).min(100.0);
        score = score.max(base);
    }
    if effective_max >= t.hot {
        score = 100.0;
    }
    if effective_min <= t.cold {
        score = score.max(90.0);
    }
    score.clamp(0.0, 100.0)
}

fn wind_sub_score(w: &WindThresholds, forecasts: &[&UnifiedForecast]) -> f64 {
    let max_wind = forecasts.iter().filter_map(|f| f.wind_speed_ms).fold(f64::MIN, f64::max);
    if max_wind == f64::MIN {
        return 0.0;
    }
    if max_wind >= w.dangerous {
        100.0
    } else if max_wind >= w.strong {
        60.0 + (max_wind - w.strong) / (w.dangerous - w.strong) * 40.0
    } else if max_wind >= w.moderate {
        20.0 + (max_wind - w.moderate) / (w.strong - w.moderate) * 40.0
    } else {
        0.0
    }
}

fn precipitation_sub_score(p: &PrecipThresholds, forecasts: &[&UnifiedForecast]) -> f64 {
    let values: Vec<f64> = forecasts.iter().filter_map(|f| f.precipitation_mm).collect();
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let max = values.iter().cloned().fold(f64::MIN, f64::max);
    let effective = mean.max(max);

    if effective <= 0.0 {
        0.0
    } else if effective < p.light {
        effective / p.light * 10.0
    } else if effective < p.moderate {
        10.0 + (effective - p.light) / (p.moderate - p.light) * 40.0
    } else if effective < p.heavy {
        50.0 + (effective - p.moderate) / (p.heavy - p.moderate) * 50.0
    } else {
        100.0
    }
}

fn pattern_base_risk(level: crate::domain::RiskLevel) -> f64 {
    use crate::domain::RiskLevel::*;
    match level {
        Low => 20.0,
        Moderate => 45.0,
        High => 75.0,
        Extreme => 100.0,
    }
}

fn pattern_multiplier(profile: RiskProfile, kind: PatternKind) -> f64 {
    use RiskProfile::*;
    match (profile, kind) {
        (Pilot | Tourism | OutdoorSports | OutdoorEvent, PatternKind::SevereConvection) => 1.3,
        (OutdoorSports | Construction, PatternKind::HeatWave) => 1.2,
        (Farmer, PatternKind::ColdWave | PatternKind::Frost) => 1.3,
        _ => 1.0,
    }
}

fn alert_level_risk(level: u8) -> f64 {
    match level {
        0 => 0.0,
        1 => 20.0,
        2 => 45.0,
        3 => 75.0,
        _ => 100.0,
    }
}

/// Over `(patterns, alerts)`, takes the max of the pattern-risk and
/// alert-risk mappings.
fn pattern_sub_score(profile: RiskProfile, patterns: &[DetectedPattern], alerts: &[OperationalAlert]) -> f64 {
    let pattern_risk = patterns
        .iter()
        .map(|p| pattern_base_risk(p.risk_level) * p.confidence * pattern_multiplier(profile, p.kind))
        .fold(0.0, f64::max);
    let alert_risk = alerts.iter().map(|a| alert_level_risk(a.level)).fold(0.0, f64::max);
    pattern_risk.max(alert_risk).min(100.0)
}

/// Storm/hail provenance is derived from which sources contributed to
/// the unified forecast, not from a per-record provider label — once
/// values are fused there is no per-record label left to read. With
/// no WMO weather codes in the canonical schema, both fall back to a
/// precipitation/humidity/source-identity heuristic.
fn storm_sub_score(forecasts: &[&UnifiedForecast]) -> f64 {
    let wrf_involved = forecasts.iter().any(|f| f.sources_used.contains(&SourceID::WrfSmn));
    if !wrf_involved {
        return 0.0;
    }
    let max_precip = forecasts.iter().filter_map(|f| f.precipitation_mm).fold(0.0_f64, f64::max);
    let max_humidity = forecasts.iter().filter_map(|f| f.humidity_pct).fold(0.0_f64, f64::max);
    if max_precip < 10.0 || max_humidity < 70.0 {
        return 0.0;
    }
    if max_precip >= 30.0 && max_humidity >= 85.0 {
        90.0
    } else if max_precip >= 20.0 {
        75.0
    } else if max_precip >= 15.0 {
        55.0
    } else {
        40.0
    }
}

fn hail_sub_score(storm: f64) -> f64 {
    (storm * 0.6).clamp(0.0, 100.0)
}

fn score_to_category(score: f64) -> RiskCategory {
    if score < 1.0 {
        RiskCategory::VeryLow
    } else if score < 2.0 {
        RiskCategory::Low
    } else if score < 3.0 {
        RiskCategory::Moderate
    } else if score < 4.0 {
        RiskCategory::High
    } else if score < 4.5 {
        RiskCategory::VeryHigh
    } else {
        RiskCategory::Extreme
    }
}

fn factor_name(label: &str) -> &'static str {
    match label {
        "temperature" => "temperatura",
        "wind" => "viento",
        "precipitation" => "precipitación",
        "storm" => "tormenta",
        "hail" => "granizo",
        "pattern" => "patrones de riesgo",
        _ => label_fallback(),
    }
}

fn label_fallback() -> &'static str {
    "otros"
}

fn main_risk_factors(
    temperature: f64,
    wind: f64,
    precipitation: f64,
    storm: f64,
    hail: f64,
    pattern: f64,
) -> Vec<String> {
    let mut ranked = vec![
        ("temperature", temperature),
        ("wind", wind),
        ("precipitation", precipitation),
        ("storm", storm),
        ("hail", hail),
        ("pattern", pattern),
    ];
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    ranked
        .into_iter()
        .filter(|(_, score)| *score >= 50.0)
        .map(|(label, _)| factor_name(label).to_string())
        .collect()
}

fn recommendation_for(category: RiskCategory) -> String {
    match category {
        RiskCategory::VeryLow | RiskCategory::Low => {
            "Condiciones favorables, sin recomendaciones especiales.".to_string()
        }
        RiskCategory::Moderate => "Monitorear la evolución del pronóstico durante la jornada.".to_string(),
        RiskCategory::High => "Tomar precauciones y limitar la exposición a los factores de riesgo.".to_string(),
        RiskCategory::VeryHigh => {
            "Adoptar medidas preventivas activas; reprogramar actividades sensibles si es posible.".to_string()
        }
        RiskCategory::Extreme => {
            "Riesgo extremo: suspender o posponer actividades no esenciales hasta que mejoren las condiciones."
                .to_string()
        }
    }
}

/// Computes a profile-adjusted risk score from unified forecasts,
/// detected patterns, and any already-generated alerts.
pub fn calculate(
    profile: RiskProfile,
    forecasts: &[UnifiedForecast],
    patterns: &[DetectedPattern],
    alerts: &[OperationalAlert],
    hours_ahead: u32,
) -> RiskScore {
    let windowed = window(forecasts, hours_ahead);
    let table = profile_table(profile);

    let temperature = temperature_sub_score(&table.temperature, &windowed);
    let wind = wind_sub_score(&table.wind, &windowed);
    let precipitation = precipitation_sub_score(&table.precipitation, &windowed);
    let pattern = pattern_sub_score(profile, patterns, alerts);
    let storm = storm_sub_score(&windowed);
    let hail = hail_sub_score(storm);

    let weighted = temperature * table.weights.temperature
        + wind * table.weights.wind
        + precipitation * table.weights.precipitation
        + pattern * table.weights.patterns
        + storm * STORM_WEIGHT
        + hail * HAIL_WEIGHT;

    let max_individual = [temperature, wind, precipitation, pattern, storm, hail]
        .into_iter()
        .fold(0.0, f64::max);

    let combined = 0.6 * weighted + 0.4 * max_individual;
    let score = (combined / 100.0 * 5.0).min(5.0);
    let category = score_to_category(score);

    RiskScore {
        profile,
        score,
        category,
        temperature_risk: temperature,
        wind_risk: wind,
        precipitation_risk: precipitation,
        storm_risk: storm,
        hail_risk: hail,
        pattern_risk: pattern,
        max_risk: max_individual,
        apparent_temperature: None,
        main_risk_factors: main_risk_factors(temperature, wind, precipitation, storm, hail, pattern),
        recommendation: recommendation_for(category),
        action_required: matches!(category, RiskCategory::VeryHigh | RiskCategory::Extreme),
        valid_for_hours: hours_ahead,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfidenceLevel;
    use chrono::Utc;

    fn forecast(hour: u32, temp: f64, wind: f64) -> UnifiedForecast {
        UnifiedForecast {
            timestamp: Utc::now(),
            forecast_hour: hour,
            latitude: -34.6,
            longitude: -58.4,
            temperature_celsius: Some(temp),
            wind_speed_ms: Some(wind),
            wind_direction_deg: None,
            precipitation_mm: Some(0.0),
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
            sources_used: vec![SourceID::WrfSmn],
            sources_available: 1,
            inconsistencies: vec![],
            has_significant_inconsistencies: false,
            fusion_method: "weighted_average".to_string(),
        }
    }

    #[test]
    fn score_is_within_bounds() {
        let forecasts = vec![forecast(0, 45.0, 30.0)];
        let result = calculate(RiskProfile::General, &forecasts, &[], &[], 24);
        assert!(result.score >= 0.0 && result.score <= 5.0);
    }

    #[test]
    fn calm_forecast_is_very_low_risk() {
        let forecasts = vec![forecast(0, 20.0, 2.0)];
        let result = calculate(RiskProfile::General, &forecasts, &[], &[], 24);
        assert_eq!(result.category, RiskCategory::VeryLow);
    }

    #[test]
    fn strong_wind_surfaces_viento_as_a_main_risk_factor() {
        let forecasts = vec![forecast(0, 20.0, 30.0)];
        let result = calculate(RiskProfile::General, &forecasts, &[], &[], 24);
        assert!(result.wind_risk >= 60.0);
        assert!(result.main_risk_factors.iter().any(|f| f == "viento"));
    }

    #[test]
    fn pilot_profile_weighs_wind_more_than_farmer() {
        let forecasts = vec![forecast(0, 20.0, 15.0)];
        let pilot = calculate(RiskProfile::Pilot, &forecasts, &[], &[], 24);
        let farmer = calculate(RiskProfile::Farmer, &forecasts, &[], &[], 24);
        assert!(pilot.score >= farmer.score);
    }

    #[test]
    fn falls_back_to_first_n_when_window_is_empty() {
        let forecasts = vec![forecast(48, 40.0, 10.0), forecast(50, 41.0, 12.0)];
        let result = calculate(RiskProfile::General, &forecasts, &[], &[], 5);
        assert!(result.score > 0.0);
    }

    #[test]
    fn extreme_category_requires_action() {
        let forecasts = vec![forecast(0, 50.0, 40.0)];
        let result = calculate(RiskProfile::General, &forecasts, &[], &[], 24);
        assert!(result.action_required);
    }
}
