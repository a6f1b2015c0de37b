//! Windy Point Forecast API adapter (ECMWF/GFS/ICON models).
//!
//! Windy's point-forecast endpoint returns wind as separate u/v
//! vector components and temperature in Kelvin; this adapter hands
//! both straight through as raw fields and lets the normalizer do the
//! unit/vector work, rather than converting here.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::SourceID;
use crate::error::Error as EngineError;
use crate::provider::{ProviderClient, RawField, RawRecord};

#[derive(Debug, Error)]
enum WindyApiError {
    #[error("windy request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("windy returned HTTP {0}")]
    Status(u16),
    #[error("windy payload missing expected field '{0}'")]
    MissingField(&'static str),
}

impl From<WindyApiError> for EngineError {
    fn from(err: WindyApiError) -> Self {
        match err {
            WindyApiError::Request(_) => EngineError::Transient(err.to_string()),
            WindyApiError::Status(status) if status >= 500 || status == 429 => {
                EngineError::Transient(format!("HTTP {status}"))
            }
            WindyApiError::Status(status) => EngineError::ProviderHttpError { status },
            WindyApiError::MissingField(_) => EngineError::ProviderBadPayload(err.to_string()),
        }
    }
}

fn model_for(source: SourceID) -> &'static str {
    match source {
        SourceID::WindyEcmwf => "ecmwf",
        SourceID::WindyGfs => "gfs",
        SourceID::WindyIcon => "icon",
        SourceID::WrfSmn => "gfs",
    }
}

#[derive(Debug, Serialize)]
struct PointForecastRequest<'a> {
    lat: f64,
    lon: f64,
    model: &'a str,
    parameters: &'a [&'a str],
    key: &'a str,
}

const PARAMETERS: &[&str] = &["temp", "wind", "precip", "clouds", "rh", "pressure", "cape"];

#[derive(Debug, Deserialize)]
struct PointForecastResponse {
    ts: Vec<i64>,
    #[serde(rename = "temp-surface", default)]
    temp_surface: Vec<f64>,
    #[serde(rename = "wind_u-surface", default)]
    wind_u_surface: Vec<f64>,
    #[serde(rename = "wind_v-surface", default)]
    wind_v_surface: Vec<f64>,
    #[serde(rename = "past3hprecip-surface", default)]
    precip_surface: Vec<f64>,
    #[serde(rename = "lclouds-surface", default)]
    low_clouds: Vec<f64>,
    #[serde(rename = "mclouds-surface", default)]
    mid_clouds: Vec<f64>,
    #[serde(rename = "hclouds-surface", default)]
    high_clouds: Vec<f64>,
    #[serde(rename = "rh-surface", default)]
    rh_surface: Vec<f64>,
    #[serde(rename = "pressure-surface", default)]
    pressure_surface: Vec<f64>,
    #[serde(rename = "cape-surface", default)]
    cape_surface: Vec<f64>,
}

pub struct WindyClient {
    http: reqwest::Client,
    api_key: String,
    source: SourceID,
    base_url: String,
}

impl WindyClient {
    pub fn new(http: reqwest::Client, api_key: String, source: SourceID) -> Self {
        Self {
            http,
            api_key,
            source,
            base_url: "https://api.windy.com/api/point-forecast/v2".to_string(),
        }
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<PointForecastResponse, WindyApiError> {
        let body = PointForecastRequest {
            lat,
            lon,
            model: model_for(self.source),
            parameters: PARAMETERS,
            key: &self.api_key,
        };
        let response = self.http.post(&self.base_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(WindyApiError::Status(response.status().as_u16()));
        }
        response.json::<PointForecastResponse>().await.map_err(WindyApiError::Request)
    }

    fn records_from(&self, payload: PointForecastResponse) -> Result<Vec<RawRecord>, WindyApiError> {
        if payload.ts.is_empty() {
            return Err(WindyApiError::MissingField("ts"));
        }
        let n = payload.ts.len();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let mut record = RawRecord::new();
            let timestamp = Utc
                .timestamp_millis_opt(payload.ts[i])
                .single()
                .unwrap_or_else(Utc::now);
            record.insert("timestamp", RawField::Timestamp(timestamp));
            if let Some(v) = payload.temp_surface.get(i) {
                record.insert("temperature", RawField::Number(*v));
            }
            if let Some(v) = payload.wind_u_surface.get(i) {
                record.insert("wind_u", RawField::Number(*v));
            }
            if let Some(v) = payload.wind_v_surface.get(i) {
                record.insert("wind_v", RawField::Number(*v));
            }
            if let Some(v) = payload.precip_surface.get(i) {
                record.insert("precipitation", RawField::Number(*v));
            }
            let clouds = [
                payload.low_clouds.get(i),
                payload.mid_clouds.get(i),
                payload.high_clouds.get(i),
            ]
            .into_iter()
            .flatten()
            .cloned()
            .fold(0.0_f64, f64::max);
            if clouds > 0.0 {
                record.insert("cloud_cover", RawField::Number(clouds));
            }
            if let Some(v) = payload.rh_surface.get(i) {
                record.insert("humidity", RawField::Number(*v));
            }
            if let Some(v) = payload.pressure_surface.get(i) {
                // Windy reports pressure in Pa; hPa is Pa / 100.
                record.insert("pressure", RawField::Number(*v / 100.0));
            }
            if let Some(v) = payload.cape_surface.get(i) {
                record.insert("cape", RawField::Number(*v));
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl ProviderClient for WindyClient {
    fn source(&self) -> SourceID {
        self.source
    }

    async fn get_current(&self, lat: f64, lon: f64) -> Result<RawRecord, EngineError> {
        let payload = self.fetch(lat, lon).await?;
        let records = self.records_from(payload)?;
        records.into_iter().next().ok_or_else(|| {
            EngineError::ProviderBadPayload("windy returned an empty forecast".into())
        })
    }

    async fn get_forecast(&self, lat: f64, lon: f64, hours: u32) -> Result<Vec<RawRecord>, EngineError> {
        let payload = self.fetch(lat, lon).await?;
        let mut records = self.records_from(payload)?;
        records.truncate(hours.max(1) as usize);
        Ok(records)
    }
}
