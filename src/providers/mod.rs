//! Concrete `ProviderClient` adapters.
//!
//! These are illustrative transports, not the production integration
//! layer — enough to exercise the ingestor against something real and
//! to give `cargo run` two live sources to try.

pub mod windy;
pub mod wrfsmn;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
