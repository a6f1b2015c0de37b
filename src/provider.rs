//! The `ProviderClient` contract: the boundary between this core and
//! whatever transport a concrete weather API needs. Implementations
//! live under `providers/`; this module only defines the shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::SourceID;
use crate::error::Result;

/// A provider field value, typed just enough that the normalizer
/// never has to guess what a raw JSON value "really" is.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Number(f64),
    Text(String),
    NumberArray(Vec<f64>),
    Timestamp(DateTime<Utc>),
}

impl RawField {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawField::Number(n) => Some(*n),
            RawField::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One provider reading, keyed by whatever field names that provider
/// uses natively. The normalizer resolves aliases by trying each
/// candidate key in order and taking the first present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(pub HashMap<String, RawField>);

impl RawRecord {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawField) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    /// First present key wins; later keys are synonyms of earlier ones.
    pub fn get_f64(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| self.0.get(*k).and_then(RawField::as_f64))
    }

    pub fn get_text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| match self.0.get(*k) {
            Some(RawField::Text(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn get_timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        keys.iter().find_map(|k| match self.0.get(*k) {
            Some(RawField::Timestamp(ts)) => Some(*ts),
            _ => None,
        })
    }
}

/// Contract every concrete weather API adapter must satisfy.
///
/// Implementations own their own HTTP transport, auth, and payload
/// parsing into `RawRecord`s; everything past this boundary (unit
/// normalization, fusion, pattern detection, risk scoring) is
/// transport-agnostic.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn source(&self) -> SourceID;

    /// Current-conditions reading at the given coordinates.
    async fn get_current(&self, lat: f64, lon: f64) -> Result<RawRecord>;

    /// Hourly forecast records, nearest hour first, covering at least
    /// `hours` hours ahead where the provider has data.
    async fn get_forecast(&self, lat: f64, lon: f64, hours: u32) -> Result<Vec<RawRecord>>;
}
