//! Optional short-TTL in-memory forecast cache.
//!
//! Keyed by `(source, init hour, lat, lon)` and evicted lazily on
//! read. This is an optimization only — correctness never depends on
//! a cache hit, so it defaults to unused unless a caller populates it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::{NormalizedPoint, SourceID};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: SourceID,
    pub init_hour: i64,
    pub lat_e4: i64,
    pub lon_e4: i64,
}

impl CacheKey {
    pub fn new(source: SourceID, init_hour_unix: i64, lat: f64, lon: f64) -> Self {
        Self {
            source,
            init_hour: init_hour_unix,
            lat_e4: (lat * 10_000.0).round() as i64,
            lon_e4: (lon * 10_000.0).round() as i64,
        }
    }
}

pub struct ForecastCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, Vec<NormalizedPoint>)>>,
}

impl ForecastCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<NormalizedPoint>> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some((inserted, points)) if inserted.elapsed() < self.ttl => Some(points.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: CacheKey, points: Vec<NormalizedPoint>) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(key, (Instant::now(), points));
    }
}
