//! Weather fusion and risk engine: ingests forecasts from multiple
//! providers, normalizes them to a canonical schema, fuses them into
//! a unified forecast, detects meteorological patterns, raises
//! SMN-aligned operational alerts, and scores profile-adjusted risk.
//!
//! HTTP surfaces, auth, persistence and provider transport details
//! beyond the `ProviderClient` contract are intentionally out of
//! scope — this crate is the decision core a service wraps.

pub mod alerts;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fuser;
pub mod inconsistency;
pub mod ingestor;
pub mod normalizer;
pub mod patterns;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod risk;
