//! In-memory `ProviderClient` used by tests: deterministic, no
//! network, and able to simulate an always-failing upstream for
//! circuit-breaker and partial-failure-resilience tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::SourceID;
use crate::error::Error;
use crate::provider::{ProviderClient, RawField, RawRecord};

pub struct FakeProviderClient {
    source: SourceID,
    hours: u32,
    fail: bool,
    calls: AtomicU32,
}

impl FakeProviderClient {
    pub fn healthy(source: SourceID, hours: u32) -> Self {
        Self { source, hours, fail: false, calls: AtomicU32::new(0) }
    }

    pub fn always_failing(source: SourceID) -> Self {
        Self { source, hours: 0, fail: true, calls: AtomicU32::new(0) }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    fn source(&self) -> SourceID {
        self.source
    }

    async fn get_current(&self, lat: f64, lon: f64) -> Result<RawRecord, Error> {
        self.get_forecast(lat, lon, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProviderBadPayload("no data".into()))
    }

    async fn get_forecast(&self, _lat: f64, _lon: f64, hours: u32) -> Result<Vec<RawRecord>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Transient("simulated provider outage".into()));
        }
        let n = hours.min(self.hours).max(1);
        let now = Utc::now();
        Ok((0..n)
            .map(|i| {
                let mut record = RawRecord::new();
                record.insert("timestamp", RawField::Timestamp(now + chrono::Duration::hours(i as i64)));
                record.insert("temperature", RawField::Number(20.0 + i as f64));
                record.insert("wind_speed", RawField::Number(5.0));
                record.insert("wind_direction", RawField::Number(180.0));
                record.insert("precipitation", RawField::Number(0.0));
                record
            })
            .collect())
    }
}
