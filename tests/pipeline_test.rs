//! End-to-end pipeline tests against the public API, using the
//! in-memory fake provider (enabled via the `test-utils` feature)
//! instead of real network calls.

use std::sync::Arc;

use chrono::Utc;
use weather_risk_engine::config::EngineConfig;
use weather_risk_engine::domain::{RiskProfile, SourceID};
use weather_risk_engine::engine::WeatherEngine;
use weather_risk_engine::provider::ProviderClient;
use weather_risk_engine::providers::fake::FakeProviderClient;

fn engine_with(providers: Vec<Arc<dyn ProviderClient>>) -> WeatherEngine {
    WeatherEngine::new(EngineConfig::default(), providers)
}

#[tokio::test]
async fn full_pipeline_produces_consistent_bounded_outputs() {
    let providers: Vec<Arc<dyn ProviderClient>> = vec![
        Arc::new(FakeProviderClient::healthy(SourceID::WrfSmn, 72)),
        Arc::new(FakeProviderClient::healthy(SourceID::WindyGfs, 72)),
        Arc::new(FakeProviderClient::healthy(SourceID::WindyEcmwf, 72)),
    ];
    let engine = engine_with(providers);

    let forecasts = engine
        .get_unified_forecast(-34.6037, -58.3816, 72, None)
        .await
        .expect("valid coordinates and horizon");
    assert!(!forecasts.is_empty());
    for f in &forecasts {
        assert!(f.overall_confidence >= 0.0 && f.overall_confidence <= 1.0);
        assert_eq!(f.sources_used.len(), 3);
    }

    let patterns = engine.detect_patterns(&forecasts);
    let alerts = engine.generate_alerts(&patterns, &forecasts, Utc::now());
    for alert in &alerts {
        assert!(alert.level <= 4);
    }

    for profile in [
        RiskProfile::General,
        RiskProfile::Farmer,
        RiskProfile::Pilot,
        RiskProfile::Tourism,
    ] {
        let risk = engine
            .calculate_risk(profile, &forecasts, &patterns, &alerts, 48)
            .unwrap();
        assert!(risk.score >= 0.0 && risk.score <= 5.0);
    }
}

#[tokio::test]
async fn single_source_outage_does_not_break_the_pipeline() {
    let providers: Vec<Arc<dyn ProviderClient>> = vec![
        Arc::new(FakeProviderClient::healthy(SourceID::WrfSmn, 24)),
        Arc::new(FakeProviderClient::always_failing(SourceID::WindyGfs)),
    ];
    let engine = engine_with(providers);

    let forecasts = engine
        .get_unified_forecast(-34.6037, -58.3816, 24, None)
        .await
        .unwrap();
    assert!(!forecasts.is_empty());
    assert!(forecasts.iter().all(|f| f.sources_used == vec![SourceID::WrfSmn]));
}

#[tokio::test]
async fn rejects_invalid_horizon() {
    let engine = engine_with(vec![]);
    let result = engine.get_unified_forecast(-34.6, -58.4, 0, None).await;
    assert!(result.is_err());
}
