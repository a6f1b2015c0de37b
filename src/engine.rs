//! `WeatherEngine`: the single place that wires Ingestor, Fuser,
//! PatternDetector, AlertService and RiskScorer together behind the
//! consumer-facing API. Holds no business logic of its own beyond
//! wiring and boundary validation.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::alerts;
use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::config::EngineConfig;
use crate::domain::{
    DetectedPattern, OperationalAlert, RiskProfile, RiskScore, SourceID, UnifiedForecast,
};
use crate::error::{Error, Result};
use crate::fuser;
use crate::ingestor::Ingestor;
use crate::patterns;
use crate::provider::ProviderClient;
use crate::risk;

fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::Validation(format!("latitude {lat} out of range [-90, 90]")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::Validation(format!("longitude {lon} out of range [-180, 180]")));
    }
    Ok(())
}

fn validate_hours(hours: u32, max: u32, label: &str) -> Result<()> {
    if hours == 0 || hours > max {
        return Err(Error::Validation(format!(
            "{label} must be between 1 and {max} (got {hours})"
        )));
    }
    Ok(())
}

pub struct WeatherEngine {
    ingestor: Ingestor,
}

impl WeatherEngine {
    pub fn new(config: EngineConfig, providers: Vec<Arc<dyn ProviderClient>>) -> Self {
        let sources: Vec<SourceID> = providers.iter().map(|p| p.source()).collect();
        let breaker_settings = config.breaker_settings.clone();
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            move |source| breaker_settings.get(&source).cloned().unwrap_or_default(),
            &sources,
        ));
        let ingestor = Ingestor::new(providers, breakers, config);
        Self { ingestor }
    }

    pub async fn get_unified_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
        sources: Option<&[SourceID]>,
    ) -> Result<Vec<UnifiedForecast>> {
        validate_coordinates(lat, lon)?;
        validate_hours(hours, 240, "hours")?;
        let base_time = Utc::now();
        let by_hour = self.ingestor.fetch_forecast(lat, lon, hours, sources).await;
        Ok(fuser::fuse_all(&by_hour, base_time, lat, lon))
    }

    pub async fn get_current_unified(
        &self,
        lat: f64,
        lon: f64,
        sources: Option<&[SourceID]>,
    ) -> Result<UnifiedForecast> {
        validate_coordinates(lat, lon)?;
        let points = self.ingestor.fetch_current(lat, lon, sources).await;
        Ok(fuser::fuse(0, Utc::now(), lat, lon, &points))
    }

    pub fn detect_patterns(&self, forecasts: &[UnifiedForecast]) -> Vec<DetectedPattern> {
        patterns::detect(forecasts)
    }

    pub fn generate_alerts(
        &self,
        patterns: &[DetectedPattern],
        forecasts: &[UnifiedForecast],
        now: DateTime<Utc>,
    ) -> Vec<OperationalAlert> {
        alerts::generate(patterns, forecasts, now)
    }

    pub fn calculate_risk(
        &self,
        profile: RiskProfile,
        forecasts: &[UnifiedForecast],
        patterns: &[DetectedPattern],
        alerts: &[OperationalAlert],
        hours_ahead: u32,
    ) -> Result<RiskScore> {
        validate_hours(hours_ahead, 240, "hours_ahead")?;
        Ok(risk::calculate(profile, forecasts, patterns, alerts, hours_ahead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::FakeProviderClient;

    #[tokio::test]
    async fn rejects_out_of_range_coordinates() {
        let engine = WeatherEngine::new(EngineConfig::default(), vec![]);
        let result = engine.get_unified_forecast(200.0, 0.0, 24, None).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn end_to_end_pipeline_runs_with_fake_providers() {
        let providers: Vec<Arc<dyn ProviderClient>> = vec![
            Arc::new(FakeProviderClient::healthy(SourceID::WrfSmn, 48)),
            Arc::new(FakeProviderClient::healthy(SourceID::WindyGfs, 48)),
        ];
        let engine = WeatherEngine::new(EngineConfig::default(), providers);
        let forecasts = engine
            .get_unified_forecast(-34.6, -58.4, 48, None)
            .await
            .unwrap();
        assert!(!forecasts.is_empty());
        let patterns = engine.detect_patterns(&forecasts);
        let alerts = engine.generate_alerts(&patterns, &forecasts, Utc::now());
        let risk = engine
            .calculate_risk(RiskProfile::General, &forecasts, &patterns, &alerts, 24)
            .unwrap();
        assert!(risk.score >= 0.0 && risk.score <= 5.0);
    }
}
