//! WRF-SMN adapter: Argentina's national weather service regional
//! model, served from a configurable internal endpoint. Trusted most
//! heavily near-term by the fuser (see `crate::fuser::base_weight`).

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::SourceID;
use crate::error::Error as EngineError;
use crate::provider::{ProviderClient, RawField, RawRecord};

#[derive(Debug, Deserialize)]
struct WrfSmnHour {
    valid_time: String,
    t2m: Option<f64>,
    wind_speed10m: Option<f64>,
    wind_dir10m: Option<f64>,
    precip: Option<f64>,
    cloud_total: Option<f64>,
    rh2m: Option<f64>,
    mslp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WrfSmnResponse {
    hours: Vec<WrfSmnHour>,
}

pub struct WrfSmnClient {
    http: reqwest::Client,
    base_url: String,
}

impl WrfSmnClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<WrfSmnResponse, EngineError> {
        let url = format!("{}/forecast?lat={lat}&lon={lon}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Transient(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return if status >= 500 || status == 429 {
                Err(EngineError::Transient(format!("HTTP {status}")))
            } else {
                Err(EngineError::ProviderHttpError { status })
            };
        }
        response
            .json::<WrfSmnResponse>()
            .await
            .map_err(|e| EngineError::ProviderBadPayload(e.to_string()))
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00"))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn record_from(hour: &WrfSmnHour) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert("timestamp", RawField::Timestamp(Self::parse_timestamp(&hour.valid_time)));
        if let Some(v) = hour.t2m {
            record.insert("temperature", RawField::Number(v));
        }
        if let Some(v) = hour.wind_speed10m {
            record.insert("wind_speed", RawField::Number(v));
        }
        if let Some(v) = hour.wind_dir10m {
            record.insert("wind_direction", RawField::Number(v));
        }
        if let Some(v) = hour.precip {
            record.insert("precipitation", RawField::Number(v));
        }
        if let Some(v) = hour.cloud_total {
            record.insert("cloud_cover", RawField::Number(v));
        }
        if let Some(v) = hour.rh2m {
            record.insert("humidity", RawField::Number(v));
        }
        if let Some(v) = hour.mslp {
            record.insert("pressure", RawField::Number(v));
        }
        record
    }
}

#[async_trait]
impl ProviderClient for WrfSmnClient {
    fn source(&self) -> SourceID {
        SourceID::WrfSmn
    }

    async fn get_current(&self, lat: f64, lon: f64) -> Result<RawRecord, EngineError> {
        let payload = self.fetch(lat, lon).await?;
        payload
            .hours
            .first()
            .map(Self::record_from)
            .ok_or_else(|| EngineError::ProviderBadPayload("wrf-smn returned no hours".into()))
    }

    async fn get_forecast(&self, lat: f64, lon: f64, hours: u32) -> Result<Vec<RawRecord>, EngineError> {
        let payload = self.fetch(lat, lon).await?;
        Ok(payload
            .hours
            .iter()
            .take(hours.max(1) as usize)
            .map(Self::record_from)
            .collect())
    }
}
