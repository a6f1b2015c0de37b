//! Canonical entities shared by every stage of the pipeline.
//!
//! Values that can be built from untrusted provider payloads expose a
//! constructor instead of public field mutation, so invariants (wind
//! direction modulo 360, bounded temperatures) are enforced exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Upstream data provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceID {
    WindyEcmwf,
    WindyGfs,
    WindyIcon,
    WrfSmn,
}

impl SourceID {
    pub fn all() -> &'static [SourceID] {
        &[
            SourceID::WindyEcmwf,
            SourceID::WindyGfs,
            SourceID::WindyIcon,
            SourceID::WrfSmn,
        ]
    }
}

impl fmt::Display for SourceID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceID::WindyEcmwf => "windy_ecmwf",
            SourceID::WindyGfs => "windy_gfs",
            SourceID::WindyIcon => "windy_icon",
            SourceID::WrfSmn => "wrf_smn",
        };
        write!(f, "{s}")
    }
}

/// A single provider's reading normalized into the canonical schema.
///
/// `forecast_hour` is `0` for the current-conditions reading, and `N`
/// for the reading valid `N` hours after the batch's first timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub source: SourceID,
    pub timestamp: DateTime<Utc>,
    pub forecast_hour: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature_celsius: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub cape_j_kg: Option<f64>,
}

impl NormalizedPoint {
    /// Clamps temperature to [-100, 60]C and wraps wind direction into
    /// [0, 360) degrees, matching the bounds the original backend
    /// enforced at its validation boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: SourceID,
        timestamp: DateTime<Utc>,
        forecast_hour: u32,
        latitude: f64,
        longitude: f64,
        temperature_celsius: Option<f64>,
        wind_speed_ms: Option<f64>,
        wind_direction_deg: Option<f64>,
        precipitation_mm: Option<f64>,
        cloud_cover_pct: Option<f64>,
        humidity_pct: Option<f64>,
        pressure_hpa: Option<f64>,
        cape_j_kg: Option<f64>,
    ) -> Self {
        Self {
            source,
            timestamp,
            forecast_hour,
            latitude,
            longitude,
            temperature_celsius: temperature_celsius.map(|t| t.clamp(-100.0, 60.0)),
            wind_speed_ms: wind_speed_ms.map(|w| w.clamp(0.0, 150.0)),
            wind_direction_deg: wind_direction_deg.map(|d| d.rem_euclid(360.0)),
            precipitation_mm: precipitation_mm.map(|p| p.max(0.0)),
            cloud_cover_pct: cloud_cover_pct.map(|c| c.clamp(0.0, 100.0)),
            humidity_pct: humidity_pct.map(|h| h.clamp(0.0, 100.0)),
            pressure_hpa: pressure_hpa.map(|p| p.clamp(800.0, 1100.0)),
            cape_j_kg: cape_j_kg.map(|c| c.max(0.0)),
        }
    }
}

/// Cross-source dispersion report for a single variable at a single
/// `(timestamp, forecast_hour)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyReport {
    pub variable: String,
    pub timestamp: DateTime<Utc>,
    pub forecast_hour: u32,
    pub source_values: HashMap<SourceID, f64>,
    pub mean: f64,
    pub stddev: f64,
    pub max_deviation: f64,
    pub coefficient_of_variation: f64,
    pub outlier_sources: Vec<SourceID>,
    pub severity: f64,
}

impl InconsistencyReport {
    pub fn is_significant(&self) -> bool {
        self.severity > 0.3
    }
}

/// One source's contribution to a fused variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub source: SourceID,
    pub value: f64,
    pub weight: f64,
    pub confidence: f64,
}

/// Qualitative bucketing of a numeric confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.9 {
            ConfidenceLevel::VeryHigh
        } else if confidence > 0.7 {
            ConfidenceLevel::High
        } else if confidence > 0.5 {
            ConfidenceLevel::Medium
        } else if confidence > 0.3 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

/// A weighted fusion of every source's reading for one forecast hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedForecast {
    pub timestamp: DateTime<Utc>,
    pub forecast_hour: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature_celsius: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub cape_j_kg: Option<f64>,
    pub temperature_confidence: f64,
    pub wind_confidence: f64,
    pub precipitation_confidence: f64,
    pub overall_confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub temperature_contributions: Vec<Contribution>,
    pub wind_contributions: Vec<Contribution>,
    pub precipitation_contributions: Vec<Contribution>,
    pub sources_used: Vec<SourceID>,
    pub sources_available: usize,
    pub inconsistencies: Vec<InconsistencyReport>,
    pub has_significant_inconsistencies: bool,
    pub fusion_method: String,
}

/// Kind of meteorological pattern recognized across a forecast window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    SevereConvection,
    HeatWave,
    ColdWave,
    Frost,
    ExtremeHeat,
}

/// Severity tier within a pattern, independent of the pattern's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub trigger_values: HashMap<String, f64>,
    pub thresholds_exceeded: Vec<String>,
    pub recommendations: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalAlert {
    pub level: u8,
    pub level_name: String,
    pub phenomenon: String,
    pub description: String,
    pub time_window: String,
    pub horizon_hours: i64,
    pub proximity: Option<String>,
    pub expected_impact: Vec<String>,
    pub recommendation: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// SMN-aligned level name, fixed Spanish strings for levels 0-4.
pub fn level_name(level: u8) -> &'static str {
    match level {
        0 => "Condición Normal",
        1 => "Atención",
        2 => "Precaución",
        3 => "Alerta",
        4 => "Alerta Crítica",
        _ => "Alerta Crítica",
    }
}

/// Risk consumer profile — determines which sub-scores dominate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Pilot,
    Trucker,
    Farmer,
    OutdoorSports,
    OutdoorEvent,
    Construction,
    Tourism,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub profile: RiskProfile,
    pub score: f64,
    pub category: RiskCategory,
    pub temperature_risk: f64,
    pub wind_risk: f64,
    pub precipitation_risk: f64,
    pub storm_risk: f64,
    pub hail_risk: f64,
    pub pattern_risk: f64,
    pub max_risk: f64,
    pub apparent_temperature: Option<f64>,
    pub main_risk_factors: Vec<String>,
    pub recommendation: String,
    pub action_required: bool,
    pub valid_for_hours: u32,
}
