//! Parallel fan-out across every configured provider, with per-source
//! retry and circuit-breaker protection. A single source failing
//! (breaker open, exhausted retries, bad payload) never blocks the
//! others — the caller gets back whatever sources actually answered.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::StreamExt;
use tracing::warn;

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::config::EngineConfig;
use crate::domain::{NormalizedPoint, SourceID};
use crate::normalizer::normalize_batch;
use crate::provider::ProviderClient;
use crate::retry::with_retry;

pub struct Ingestor {
    providers: Vec<Arc<dyn ProviderClient>>,
    breakers: Arc<CircuitBreakerRegistry>,
    config: EngineConfig,
}

impl Ingestor {
    pub fn new(
        providers: Vec<Arc<dyn ProviderClient>>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self { providers, breakers, config }
    }

    fn active_providers(&self, sources: Option<&[SourceID]>) -> Vec<Arc<dyn ProviderClient>> {
        match sources {
            None => self.providers.clone(),
            Some(sources) => self
                .providers
                .iter()
                .filter(|p| sources.contains(&p.source()))
                .cloned()
                .collect(),
        }
    }

    /// Fetches and normalizes the forecast from every active source,
    /// bounded to at most `config.max_parallelism` concurrent calls.
    /// Sources whose breaker is open or whose retries are exhausted
    /// are skipped and logged, not propagated as a hard error.
    pub async fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
        sources: Option<&[SourceID]>,
    ) -> HashMap<u32, Vec<NormalizedPoint>> {
        let active = self.active_providers(sources);
        let base_time = Utc::now();
        let max_parallelism = self.config.max_parallelism.max(1);
        let retry_settings = self.config.retry.clone();

        let results: Vec<Option<(SourceID, Vec<NormalizedPoint>)>> = futures::stream::iter(active)
            .map(|provider| {
                let breaker = self.breakers.get(provider.source());
                let retry_settings = retry_settings.clone();
                async move { fetch_one(provider, breaker, &retry_settings, lat, lon, hours, base_time).await }
            })
            .buffer_unordered(max_parallelism)
            .collect()
            .await;

        let mut by_hour: HashMap<u32, Vec<NormalizedPoint>> = HashMap::new();
        for (_source, points) in results.into_iter().flatten() {
            for point in points {
                by_hour.entry(point.forecast_hour).or_default().push(point);
            }
        }
        by_hour
    }

    /// Current-conditions reading from every active source.
    pub async fn fetch_current(
        &self,
        lat: f64,
        lon: f64,
        sources: Option<&[SourceID]>,
    ) -> Vec<NormalizedPoint> {
        let by_hour = self.fetch_forecast(lat, lon, 0, sources).await;
        by_hour.into_values().flatten().collect()
    }
}

async fn fetch_one(
    provider: Arc<dyn ProviderClient>,
    breaker: Option<Arc<crate::circuit_breaker::CircuitBreaker>>,
    retry_settings: &crate::config::RetrySettings,
    lat: f64,
    lon: f64,
    hours: u32,
    base_time: chrono::DateTime<Utc>,
) -> Option<(SourceID, Vec<NormalizedPoint>)> {
    let source = provider.source();

    if let Some(b) = &breaker {
        if let Err(err) = b.allow_request(source) {
            warn!(%source, %err, "skipping source: circuit breaker open");
            return None;
        }
    }

    let outcome = with_retry(retry_settings, &source.to_string(), || {
        let provider = Arc::clone(&provider);
        async move { provider.get_forecast(lat, lon, hours).await }
    })
    .await;

    match outcome {
        Ok(raw_records) => {
            if let Some(b) = &breaker {
                b.record_success(source);
            }
            let points = normalize_batch(&raw_records, source, lat, lon, base_time);
            Some((source, points))
        }
        Err(err) => {
            if let Some(b) = &breaker {
                b.record_failure(source);
            }
            warn!(%source, %err, "provider fetch failed after retries");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;
    use crate::providers::fake::FakeProviderClient;
    use std::time::Duration;

    fn registry(sources: &[SourceID]) -> Arc<CircuitBreakerRegistry> {
        Arc::new(CircuitBreakerRegistry::new(
            |_| BreakerSettings { failure_threshold: 2, recovery_timeout: Duration::from_secs(60) },
            sources,
        ))
    }

    #[tokio::test]
    async fn partial_failure_still_returns_healthy_sources() {
        let good = Arc::new(FakeProviderClient::healthy(SourceID::WrfSmn, 3));
        let bad = Arc::new(FakeProviderClient::always_failing(SourceID::WindyGfs));
        let providers: Vec<Arc<dyn ProviderClient>> = vec![good, bad];
        let breakers = registry(&[SourceID::WrfSmn, SourceID::WindyGfs]);
        let mut config = EngineConfig::default();
        config.retry.max_attempts = 1;
        let ingestor = Ingestor::new(providers, breakers, config);

        let result = ingestor.fetch_forecast(-34.6, -58.4, 3, None).await;
        let all_sources: Vec<SourceID> =
            result.values().flatten().map(|p| p.source).collect();
        assert!(all_sources.contains(&SourceID::WrfSmn));
        assert!(!all_sources.contains(&SourceID::WindyGfs));
    }

    #[tokio::test]
    async fn open_breaker_skips_source_without_calling_it() {
        let bad = Arc::new(FakeProviderClient::always_failing(SourceID::WindyGfs));
        let providers: Vec<Arc<dyn ProviderClient>> = vec![bad.clone()];
        let breakers = registry(&[SourceID::WindyGfs]);
        breakers.get(SourceID::WindyGfs).unwrap().record_failure(SourceID::WindyGfs);
        breakers.get(SourceID::WindyGfs).unwrap().record_failure(SourceID::WindyGfs);
        let mut config = EngineConfig::default();
        config.retry.max_attempts = 1;
        let ingestor = Ingestor::new(providers, breakers, config);

        let _ = ingestor.fetch_forecast(-34.6, -58.4, 3, None).await;
        assert_eq!(bad.call_count(), 0);
    }
}
