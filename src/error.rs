//! Error taxonomy shared by every pipeline stage.
//!
//! `ErrorClass` is what the retry and circuit-breaker combinators act
//! on, so call sites never have to match the full `Error` enum to
//! decide whether a failure is worth retrying.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying: network blip, timeout, 5xx.
    Transient,
    /// Caller gave us something invalid; retrying changes nothing.
    Expected,
    /// Programming/config error; retrying changes nothing.
    Permanent,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider returned HTTP {status}")]
    ProviderHttpError { status: u16 },

    #[error("provider returned an unparseable payload: {0}")]
    ProviderBadPayload(String),

    #[error("circuit breaker open for {source}")]
    BreakerOpen { source: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Transient(_) => ErrorClass::Transient,
            Error::ProviderHttpError { status } if *status >= 500 || *status == 429 => {
                ErrorClass::Transient
            }
            Error::ProviderHttpError { .. } => ErrorClass::Expected,
            Error::ProviderBadPayload(_) => ErrorClass::Expected,
            Error::BreakerOpen { .. } => ErrorClass::Expected,
            Error::Validation(_) => ErrorClass::Expected,
            Error::Config(_) => ErrorClass::Permanent,
            Error::Internal(_) => ErrorClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

pub type Result<T> = std::result::Result<T, Error>;
