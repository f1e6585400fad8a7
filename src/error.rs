// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    /// Broker session unavailable. Fatal to the current poll only; the loop
    /// retries on the next cycle.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Fewer bars than classification needs. Local to one ticket.
    #[error("insufficient history: have {have} bars, need {need}")]
    DataInsufficient { have: usize, need: usize },

    /// Notification transport failed. Logged, never fatal to detection.
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("bad indicator parameters: {0}")]
    Indicator(String),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("state persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}

impl SentinelError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SentinelError::Connection(_))
    }
}
