// src/connectors/traits.rs
use crate::error::SentinelError;
use crate::types::{AccountSnapshot, Bar, Position};
use async_trait::async_trait;

#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Establish (or re-establish) the broker session.
    async fn connect(&mut self) -> Result<(), SentinelError>;

    /// Current open set. Empty is a valid answer and means no open trades;
    /// a dead session is `SentinelError::Connection`, never an empty vec.
    async fn get_open_positions(&self) -> Result<Vec<Position>, SentinelError>;

    async fn get_account_snapshot(&self) -> Result<AccountSnapshot, SentinelError>;

    /// Recent bars for `symbol`, most-recent-last.
    async fn get_recent_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<Bar>, SentinelError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), SentinelError>;
}
