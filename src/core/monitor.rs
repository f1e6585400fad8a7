// src/core/monitor.rs
use crate::analysis::indicators;
use crate::config::AppConfig;
use crate::connectors::traits::{BrokerClient, Notifier};
use crate::core::detector::{BarCache, Detector, DetectorState};
use crate::core::messages;
use crate::error::SentinelError;
use crate::types::{Direction, Event, Position, TrendStatus};
use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info, warn};

/// Owns the poll loop: fetch -> detect -> notify -> persist, fixed interval,
/// graceful shutdown between polls. All broker and webhook I/O lives here;
/// the detector stays pure.
pub struct Monitor {
    config: AppConfig,
    broker: Box<dyn BrokerClient>,
    notifier: Box<dyn Notifier>,
    detector: Detector,
    state: DetectorState,
    connected: bool,
    consecutive_failures: u32,
    outage_alerted: bool,
}

impl Monitor {
    pub fn new(config: AppConfig, broker: Box<dyn BrokerClient>, notifier: Box<dyn Notifier>) -> Self {
        let detector = Detector::new(config.equity_jump_threshold, config.trend.clone());
        Self {
            config,
            broker,
            notifier,
            detector,
            state: DetectorState::default(),
            connected: false,
            consecutive_failures: 0,
            outage_alerted: false,
        }
    }

    async fn load_state(&mut self) {
        if let Ok(data) = tokio::fs::read_to_string(&self.config.state_file).await {
            match serde_json::from_str::<DetectorState>(&data) {
                Ok(state) => {
                    info!(
                        "Restored state: {} open positions, last day {:?}",
                        state.positions.len(),
                        state.day
                    );
                    self.state = state;
                }
                Err(e) => warn!("State file unreadable, starting fresh: {}", e),
            }
        }
    }

    async fn save_state(&self) {
        match serde_json::to_string_pretty(&self.state) {
            Ok(data) => {
                if let Err(e) = tokio::fs::write(&self.config.state_file, data).await {
                    error!("Failed to save detector state: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize detector state: {}", e),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Monitor loop running. Interval: {}s, equity jump threshold: {}",
            self.config.poll_interval_secs, self.config.equity_jump_threshold
        );
        self.load_state().await;

        loop {
            self.poll_once().await;

            // Shutdown is honored between polls only: the poll above always
            // runs to completion before we look at the signal.
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, stopping after current poll");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
            }
        }

        self.save_state().await;
        Ok(())
    }

    /// One full poll. Broker failures make this a no-op; the state is only
    /// replaced once the whole snapshot was fetched and diffed.
    pub async fn poll_once(&mut self) {
        match self.try_poll().await {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "Broker connection recovered after {} failed polls",
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                self.outage_alerted = false;
            }
            Err(e) if e.is_connection() => {
                self.connected = false;
                self.consecutive_failures += 1;
                warn!(
                    "Poll skipped ({} consecutive failures): {}",
                    self.consecutive_failures, e
                );
                self.escalate_outage().await;
            }
            Err(e) => error!("Poll failed: {}", e),
        }
    }

    async fn try_poll(&mut self) -> Result<(), SentinelError> {
        if !self.connected {
            self.broker.connect().await?;
            self.connected = true;
        }

        let positions = self.broker.get_open_positions().await?;
        let account = self.broker.get_account_snapshot().await?;
        let bars = self.prefetch_bars(&positions).await;

        let (events, next) = self.detector.poll(&self.state, &positions, &account, &bars);

        for event in &events {
            let mut text = messages::format_event(event);
            if let Some(extra) = self.snapshot_section(event, &bars) {
                text.push('\n');
                text.push_str(&extra);
            }
            if let Err(e) = self.notifier.deliver(&text).await {
                error!("Dropping notification: {}", e);
            }
        }

        let changed = next != self.state;
        self.state = next;
        if changed {
            self.save_state().await;
        }
        Ok(())
    }

    /// One history fetch per unique symbol that this poll may classify:
    /// unseen tickets and tickets classified on a previous poll. A failed
    /// fetch skips that symbol without failing the poll.
    async fn prefetch_bars(&self, positions: &[Position]) -> BarCache {
        let mut needed = HashSet::new();
        for position in positions {
            let new = !self.state.positions.contains_key(&position.ticket);
            let classified = self.state.classifications.contains_key(&position.ticket);
            if new || classified {
                needed.insert(position.symbol.clone());
            }
        }

        let mut bars = BarCache::new();
        for symbol in needed {
            match self
                .broker
                .get_recent_bars(&symbol, &self.config.trend.timeframe, self.config.trend.history_bars)
                .await
            {
                Ok(series) => {
                    bars.insert(symbol, series);
                }
                Err(e) => warn!("No history for {}: {}", symbol, e),
            }
        }
        bars
    }

    /// Technical context for new-position notifications, computed from the
    /// same bars the classification used.
    fn snapshot_section(&self, event: &Event, bars: &BarCache) -> Option<String> {
        let Event::NewPosition { position, trend } = event else {
            return None;
        };
        let uptrend = match (position.direction, trend) {
            (_, TrendStatus::Unknown) => return None,
            (Direction::Buy, TrendStatus::AlignedUp) => true,
            (Direction::Sell, TrendStatus::Misaligned) => true,
            _ => false,
        };
        let series = bars.get(&position.symbol)?;
        let snapshot = indicators::analyze_symbol(series, uptrend)?;
        Some(messages::format_symbol_snapshot(&snapshot))
    }

    async fn escalate_outage(&mut self) {
        if self.outage_alerted || self.consecutive_failures < self.config.connection_alert_after {
            return;
        }
        let alert = format!(
            "🚨 Broker connection lost: {} consecutive failed polls",
            self.consecutive_failures
        );
        match self.notifier.deliver(&alert).await {
            Ok(()) => self.outage_alerted = true,
            Err(e) => error!("Could not deliver outage alert: {}", e),
        }
    }
}
