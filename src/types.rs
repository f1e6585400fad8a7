// src/types.rs
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "Buy"),
            Direction::Sell => write!(f, "Sell"),
        }
    }
}

/// One broker-held open trade. Broker-reported fields are immutable for the
/// life of the ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub volume: f64,
}

/// Trend alignment of an open position against the recent EMA cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStatus {
    /// Buy with fast EMA above slow EMA.
    AlignedUp,
    /// Sell with fast EMA below slow EMA.
    AlignedDown,
    /// Position direction against the EMA cross.
    Misaligned,
    /// Not enough history to classify.
    Unknown,
}

impl fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendStatus::AlignedUp => write!(f, "✅ correct entry (uptrend)"),
            TrendStatus::AlignedDown => write!(f, "✅ correct entry (downtrend)"),
            TrendStatus::Misaligned => write!(f, "❌ wrong entry (against the trend)"),
            TrendStatus::Unknown => write!(f, "insufficient data"),
        }
    }
}

/// Point-in-time broker account state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub equity: Decimal,
    /// Calendar date the snapshot was taken, account-local time.
    pub day: NaiveDate,
}

/// One OHLC bar. Series are ordered most-recent-last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One trend flip observed for an already-classified position.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendChange {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub status: TrendStatus,
}

/// Notification record emitted by the detector. Within one poll events are
/// ordered New -> TrendChanged -> Closed -> Balance -> Equity, and the
/// notifier delivers them in that order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NewPosition {
        position: Position,
        trend: TrendStatus,
    },
    /// All trend flips from one poll, batched into a single notification.
    TrendChanged { changes: Vec<TrendChange> },
    /// All tickets that vanished in one poll, batched into a single
    /// notification.
    ClosedPositions { tickets: Vec<Ticket> },
    BalanceChanged {
        previous: Decimal,
        current: Decimal,
        delta: Decimal,
        daily_delta: Decimal,
        day: NaiveDate,
    },
    EquityJump {
        previous: Decimal,
        current: Decimal,
        delta: Decimal,
    },
}
