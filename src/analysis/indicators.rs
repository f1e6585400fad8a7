// src/analysis/indicators.rs
//
// Snapshot indicators shown alongside new-position notifications: RSI zone,
// rolling support/resistance, structure break and a rough SL/TP estimate.
// None of this feeds the change detector.
use crate::types::Bar;
use ta::indicators::RelativeStrengthIndex;
use ta::Next;

pub const RSI_PERIOD: usize = 14;
const SUPPORT_RESISTANCE_WINDOW: usize = 20;
const STRUCTURE_WINDOW: usize = 5;
const TARGET_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn from_value(rsi: f64) -> Self {
        if rsi > 70.0 {
            RsiZone::Overbought
        } else if rsi < 30.0 {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RsiZone::Overbought => "overbought 🟠",
            RsiZone::Oversold => "oversold 🔵",
            RsiZone::Neutral => "neutral 🟢",
        }
    }
}

/// RSI over the full close series, `None` with fewer closes than the period.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period || period == 0 {
        return None;
    }
    let mut indicator = RelativeStrengthIndex::new(period).ok()?;
    let mut value = 0.0;
    for &close in closes {
        value = indicator.next(close);
    }
    Some(value)
}

/// Support and resistance as the min low / max high of the trailing window.
pub fn support_resistance(bars: &[Bar], window: usize) -> Option<(f64, f64)> {
    if bars.len() < window || window == 0 {
        return None;
    }
    let tail = &bars[bars.len() - window..];
    let support = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let resistance = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    Some((support, resistance))
}

/// True when the last close breaks above the high or below the low of the
/// `window` bars preceding it. The current bar is excluded from the window,
/// otherwise its own high/low would mask any break.
pub fn structure_break(bars: &[Bar], window: usize) -> Option<bool> {
    let (last, prior) = bars.split_last()?;
    let (low, high) = support_resistance(prior, window)?;
    Some(last.close > high || last.close < low)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeTargets {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Rough entry/SL/TP estimate: entry offset from the last close, stop beyond
/// the trailing extreme, target at 1.5x the risk distance.
pub fn estimate_targets(bars: &[Bar], uptrend: bool, window: usize) -> Option<TradeTargets> {
    let (low, high) = support_resistance(bars, window)?;
    let close = bars.last()?.close;

    let targets = if uptrend {
        let entry = close + 1.5;
        let stop_loss = low - 2.0;
        TradeTargets {
            entry,
            stop_loss,
            take_profit: entry + (entry - stop_loss) * 1.5,
        }
    } else {
        let entry = close - 1.5;
        let stop_loss = high + 2.0;
        TradeTargets {
            entry,
            stop_loss,
            take_profit: entry - (stop_loss - entry) * 1.5,
        }
    };
    Some(targets)
}

/// Everything the notification template needs in one pass over the bars.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSnapshot {
    pub rsi: f64,
    pub rsi_zone: RsiZone,
    pub support: f64,
    pub resistance: f64,
    pub structure_break: bool,
    pub targets: TradeTargets,
}

pub fn analyze_symbol(bars: &[Bar], uptrend: bool) -> Option<SymbolSnapshot> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let rsi = rsi(&closes, RSI_PERIOD)?;
    let (support, resistance) = support_resistance(bars, SUPPORT_RESISTANCE_WINDOW)?;
    let structure_break = structure_break(bars, STRUCTURE_WINDOW)?;
    let targets = estimate_targets(bars, uptrend, TARGET_WINDOW)?;
    Some(SymbolSnapshot {
        rsi,
        rsi_zone: RsiZone::from_value(rsi),
        support,
        resistance,
        structure_break,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 900, 0).unwrap(),
            open,
            high,
            low,
            close,
        }
    }

    fn flat_bars(n: usize, price: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| bar(i, price, price + 1.0, price - 1.0, price))
            .collect()
    }

    #[test]
    fn support_resistance_uses_trailing_window() {
        let mut bars = flat_bars(30, 100.0);
        bars.push(bar(30, 100.0, 110.0, 95.0, 100.0));
        let (support, resistance) = support_resistance(&bars, 20).unwrap();
        assert_eq!(support, 95.0);
        assert_eq!(resistance, 110.0);
    }

    #[test]
    fn structure_break_detects_close_beyond_window() {
        // Flat bars trade 99..101; a close at 102.5 breaks the prior highs.
        let mut bars = flat_bars(10, 100.0);
        bars.push(bar(10, 100.0, 103.0, 99.5, 102.5));
        assert_eq!(structure_break(&bars, 5), Some(true));

        // A close back inside the range is no break.
        let mut bars = flat_bars(10, 100.0);
        bars.push(bar(10, 100.0, 101.0, 99.5, 100.5));
        assert_eq!(structure_break(&bars, 5), Some(false));
    }

    #[test]
    fn uptrend_targets_reward_exceeds_risk() {
        let bars = flat_bars(20, 100.0);
        let t = estimate_targets(&bars, true, 10).unwrap();
        assert_eq!(t.entry, 101.5);
        assert_eq!(t.stop_loss, 97.0);
        assert!((t.take_profit - (101.5 + 4.5 * 1.5)).abs() < 1e-9);
    }

    #[test]
    fn rsi_needs_enough_closes() {
        assert!(rsi(&[100.0; 5], RSI_PERIOD).is_none());
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let value = rsi(&closes, RSI_PERIOD).unwrap();
        assert!(value > 70.0, "monotonic rise should read overbought, got {}", value);
    }

    #[test]
    fn rsi_zone_buckets() {
        assert_eq!(RsiZone::from_value(75.0), RsiZone::Overbought);
        assert_eq!(RsiZone::from_value(25.0), RsiZone::Oversold);
        assert_eq!(RsiZone::from_value(50.0), RsiZone::Neutral);
    }
}
