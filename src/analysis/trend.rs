// src/analysis/trend.rs
use crate::config::TrendConfig;
use crate::error::SentinelError;
use crate::types::{Direction, TrendStatus};
use ta::indicators::ExponentialMovingAverage;
use ta::Next;

/// Classify an open position against the fast/slow EMA cross of its recent
/// closes. `closes` must be ordered most-recent-last; fewer than
/// `config.min_bars` closes is `DataInsufficient`.
pub fn classify(
    direction: Direction,
    closes: &[f64],
    config: &TrendConfig,
) -> Result<TrendStatus, SentinelError> {
    if closes.len() < config.min_bars {
        return Err(SentinelError::DataInsufficient {
            have: closes.len(),
            need: config.min_bars,
        });
    }

    let mut fast = ExponentialMovingAverage::new(config.fast_period)
        .map_err(|e| SentinelError::Indicator(format!("fast EMA: {}", e)))?;
    let mut slow = ExponentialMovingAverage::new(config.slow_period)
        .map_err(|e| SentinelError::Indicator(format!("slow EMA: {}", e)))?;

    let mut fast_value = 0.0;
    let mut slow_value = 0.0;
    for &close in closes {
        fast_value = fast.next(close);
        slow_value = slow.next(close);
    }

    let status = match direction {
        Direction::Buy if fast_value > slow_value => TrendStatus::AlignedUp,
        Direction::Sell if fast_value < slow_value => TrendStatus::AlignedDown,
        _ => TrendStatus::Misaligned,
    };
    Ok(status)
}
