//! Errors for the AIS forwarder
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AisPluginError {
    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    ConfigurationError { message: String },

    #[error("Feed connection failed: {0}")]
    FeedConnectionError(String),

    #[error("Exchange connection failed: {0}")]
    ExchangeConnectionError(String),

    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

/// Sentence-level decode failure.
///
/// Never fatal to the process; the offending sentence is routed to the
/// parsing-error destination and processing continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("bit stream too short: need {required} bits, have {actual}")]
    Truncated { required: usize, actual: usize },

    #[error("field {0} is wider than 64 bits")]
    FieldTooWide(&'static str),
}

/// Failure to hand a payload to the exchange bus.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("exchange bus unavailable: {0}")]
    Unavailable(String),
}
