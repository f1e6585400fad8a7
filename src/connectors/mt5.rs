// src/connectors/mt5.rs
use crate::config::Mt5Config;
use crate::connectors::traits::BrokerClient;
use crate::error::SentinelError;
use crate::types::{AccountSnapshot, Bar, Direction, Position};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// REST client for a local MT5 terminal bridge. The bridge owns the actual
/// platform session; every endpoint answers 503 while that session is down,
/// which we surface as `SentinelError::Connection`.
pub struct Mt5BridgeClient {
    config: Mt5Config,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    ticket: u64,
    symbol: String,
    /// 0 = buy, 1 = sell, MT5 convention.
    #[serde(rename = "type")]
    kind: u8,
    price_open: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    balance: Decimal,
    equity: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Mt5BridgeClient {
    pub fn new(config: Mt5Config) -> Result<Self, SentinelError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SentinelError::Connection(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<T, SentinelError> {
        let url = format!("{}{}", self.config.bridge_url, path);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SentinelError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| SentinelError::Connection(e.to_string()))?;

        response
            .json::<T>()
            .await
            .map_err(|e| SentinelError::Connection(e.to_string()))
    }
}

#[async_trait]
impl BrokerClient for Mt5BridgeClient {
    async fn connect(&mut self) -> Result<(), SentinelError> {
        let url = format!("{}/login", self.config.bridge_url);
        let body = serde_json::json!({
            "login": self.config.login,
            "password": self.config.password,
            "server": self.config.server,
        });

        self.http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SentinelError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| SentinelError::Connection(format!("login rejected: {}", e)))?;

        info!("MT5 session established on {}", self.config.server);
        Ok(())
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, SentinelError> {
        let raw: Vec<RawPosition> = self.get_json("/positions").await?;
        Ok(raw
            .into_iter()
            .map(|p| Position {
                ticket: p.ticket,
                symbol: p.symbol,
                direction: if p.kind == 0 {
                    Direction::Buy
                } else {
                    Direction::Sell
                },
                entry_price: p.price_open,
                volume: p.volume,
            })
            .collect())
    }

    async fn get_account_snapshot(&self) -> Result<AccountSnapshot, SentinelError> {
        let raw: RawAccount = self.get_json("/account").await?;
        Ok(AccountSnapshot {
            balance: raw.balance,
            equity: raw.equity,
            day: Local::now().date_naive(),
        })
    }

    async fn get_recent_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<Bar>, SentinelError> {
        let path = format!(
            "/bars?symbol={}&timeframe={}&count={}",
            symbol, timeframe, count
        );
        let raw: Vec<RawBar> = self.get_json(&path).await?;
        Ok(raw
            .into_iter()
            .map(|b| Bar {
                time: DateTime::<Utc>::from_timestamp(b.time, 0).unwrap_or(DateTime::UNIX_EPOCH),
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
            })
            .collect())
    }
}
