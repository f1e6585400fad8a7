// src/config.rs

use config::{Config, ConfigError, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Mt5Config {
    pub bridge_url: String,
    pub login: u64,
    pub password: String,
    pub server: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Bars required before classification is attempted.
    pub min_bars: usize,
    pub timeframe: String,
    pub history_bars: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mt5: Mt5Config,
    pub webhook_url: String,
    pub poll_interval_secs: u64,
    pub equity_jump_threshold: Decimal,
    /// Consecutive failed polls before an operator alert goes out.
    pub connection_alert_after: u32,
    pub state_file: String,
    pub trend: TrendConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("poll_interval_secs", 5)?
            .set_default("equity_jump_threshold", "100")?
            .set_default("connection_alert_after", 5)?
            .set_default("state_file", "sentinel_state.json")?
            .set_default("trend.fast_period", 20)?
            .set_default("trend.slow_period", 50)?
            .set_default("trend.min_bars", 50)?
            .set_default("trend.timeframe", "M15")?
            .set_default("trend.history_bars", 100)?
            .add_source(File::with_name("Settings").required(false))
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .separator("__"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
