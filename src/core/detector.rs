// src/core/detector.rs
use crate::analysis::trend;
use crate::config::TrendConfig;
use crate::types::{
    AccountSnapshot, Bar, Event, Position, Ticket, TrendChange, TrendStatus,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bars prefetched by the caller, one series per symbol, most-recent-last.
/// The detector never does I/O itself.
pub type BarCache = HashMap<String, Vec<Bar>>;

/// Everything carried between polls. Serialized to the state file so a
/// restart does not re-announce tickets we already know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    pub positions: HashMap<Ticket, Position>,
    /// Only tickets whose classification succeeded; always a subset of
    /// `positions` after a poll completes.
    pub classifications: HashMap<Ticket, TrendStatus>,
    pub last_account: Option<AccountSnapshot>,
    /// Balance at the first poll of `day`, baseline for daily P/L.
    pub daily_reference_balance: Option<Decimal>,
    pub day: Option<NaiveDate>,
}

pub struct Detector {
    equity_jump_threshold: Decimal,
    trend: TrendConfig,
}

impl Detector {
    pub fn new(equity_jump_threshold: Decimal, trend: TrendConfig) -> Self {
        Self {
            equity_jump_threshold,
            trend,
        }
    }

    /// Diff one fresh observation of broker state against the previous one.
    /// Pure: same inputs, same events, same next state. Event order within a
    /// poll is New -> TrendChanged -> Closed -> Balance -> Equity.
    pub fn poll(
        &self,
        previous: &DetectorState,
        current_positions: &[Position],
        account: &AccountSnapshot,
        bars: &BarCache,
    ) -> (Vec<Event>, DetectorState) {
        let mut events = Vec::new();
        let mut positions = HashMap::with_capacity(current_positions.len());
        let mut classifications = HashMap::new();
        let mut trend_changes = Vec::new();

        for position in current_positions {
            let ticket = position.ticket;

            if !previous.positions.contains_key(&ticket) {
                // New ticket. Classification failure must never suppress the
                // event itself.
                let status = self.classify(position, bars);
                if let Some(status) = status {
                    classifications.insert(ticket, status);
                }
                events.push(Event::NewPosition {
                    position: position.clone(),
                    trend: status.unwrap_or(TrendStatus::Unknown),
                });
            } else if let Some(&stored) = previous.classifications.get(&ticket) {
                // Known ticket that classified at entry: watch for flips.
                // Missing history this poll keeps the stored value.
                match self.classify(position, bars) {
                    Some(status) if status != stored => {
                        trend_changes.push(TrendChange {
                            ticket,
                            symbol: position.symbol.clone(),
                            direction: position.direction,
                            status,
                        });
                        classifications.insert(ticket, status);
                    }
                    Some(status) => {
                        classifications.insert(ticket, status);
                    }
                    None => {
                        classifications.insert(ticket, stored);
                    }
                }
            }

            positions.insert(ticket, position.clone());
        }

        if !trend_changes.is_empty() {
            events.push(Event::TrendChanged {
                changes: trend_changes,
            });
        }

        let mut closed: Vec<Ticket> = previous
            .positions
            .keys()
            .copied()
            .filter(|t| !positions.contains_key(t))
            .collect();
        if !closed.is_empty() {
            closed.sort_unstable();
            events.push(Event::ClosedPositions { tickets: closed });
        }

        // Day rollover resets the daily baseline before any delta below.
        let daily_reference_balance = match (previous.day, previous.daily_reference_balance) {
            (Some(day), Some(reference)) if day == account.day => reference,
            _ => account.balance,
        };

        if let Some(last) = &previous.last_account {
            if account.balance != last.balance {
                events.push(Event::BalanceChanged {
                    previous: last.balance,
                    current: account.balance,
                    delta: account.balance - last.balance,
                    daily_delta: account.balance - daily_reference_balance,
                    day: account.day,
                });
            }

            let equity_delta = account.equity - last.equity;
            if equity_delta.abs() >= self.equity_jump_threshold {
                events.push(Event::EquityJump {
                    previous: last.equity,
                    current: account.equity,
                    delta: equity_delta,
                });
            }
        }

        let next = DetectorState {
            positions,
            classifications,
            last_account: Some(account.clone()),
            daily_reference_balance: Some(daily_reference_balance),
            day: Some(account.day),
        };
        (events, next)
    }

    /// `None` when history is missing for the symbol or too short; errors
    /// here are local to the ticket and never abort the poll.
    fn classify(&self, position: &Position, bars: &BarCache) -> Option<TrendStatus> {
        let series = bars.get(&position.symbol)?;
        let closes: Vec<f64> = series.iter().map(|b| b.close).collect();
        trend::classify(position.direction, &closes, &self.trend).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::{TimeZone, Utc};

    fn detector() -> Detector {
        Detector::new(
            Decimal::from(100),
            TrendConfig {
                fast_period: 20,
                slow_period: 50,
                min_bars: 50,
                timeframe: "M15".to_string(),
                history_bars: 100,
            },
        )
    }

    fn position(ticket: Ticket, symbol: &str, direction: Direction) -> Position {
        Position {
            ticket,
            symbol: symbol.to_string(),
            direction,
            entry_price: 2350.0,
            volume: 0.1,
        }
    }

    fn account(balance: i64, equity: i64, day: &str) -> AccountSnapshot {
        AccountSnapshot {
            balance: Decimal::from(balance),
            equity: Decimal::from(equity),
            day: day.parse().unwrap(),
        }
    }

    fn series(closes: impl Iterator<Item = f64>) -> Vec<Bar> {
        closes
            .enumerate()
            .map(|(i, close)| Bar {
                time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 900, 0).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<Bar> {
        series((0..n).map(|i| 100.0 + i as f64))
    }

    fn falling(n: usize) -> Vec<Bar> {
        series((0..n).map(|i| 500.0 - i as f64))
    }

    fn cache(symbol: &str, bars: Vec<Bar>) -> BarCache {
        let mut map = BarCache::new();
        map.insert(symbol.to_string(), bars);
        map
    }

    #[test]
    fn unchanged_world_emits_nothing() {
        let d = detector();
        let positions = vec![position(101, "XAUUSD", Direction::Buy)];
        let acct = account(1000, 1000, "2025-06-10");
        let bars = cache("XAUUSD", rising(60));

        let (_, state) = d.poll(&DetectorState::default(), &positions, &acct, &bars);
        let (events, next) = d.poll(&state, &positions, &acct, &bars);

        assert!(events.is_empty());
        assert_eq!(next, state);
    }

    #[test]
    fn second_identical_poll_is_idempotent() {
        let d = detector();
        let positions = vec![
            position(101, "XAUUSD", Direction::Buy),
            position(102, "EURUSD", Direction::Sell),
        ];
        let acct = account(5000, 5000, "2025-06-10");
        let mut bars = cache("XAUUSD", rising(60));
        bars.insert("EURUSD".to_string(), falling(60));

        let (first_events, state) =
            d.poll(&DetectorState::default(), &positions, &acct, &bars);
        assert_eq!(first_events.len(), 2);

        let (events, _) = d.poll(&state, &positions, &acct, &bars);
        assert!(events.is_empty());
    }

    #[test]
    fn new_buy_in_uptrend_is_aligned_up() {
        let d = detector();
        let positions = vec![position(101, "XAUUSD", Direction::Buy)];
        let acct = account(1000, 1000, "2025-06-10");
        let bars = cache("XAUUSD", rising(60));

        let (events, state) = d.poll(&DetectorState::default(), &positions, &acct, &bars);

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::NewPosition { position, trend } => {
                assert_eq!(position.ticket, 101);
                assert_eq!(*trend, TrendStatus::AlignedUp);
            }
            other => panic!("expected NewPosition, got {:?}", other),
        }
        assert_eq!(state.classifications.get(&101), Some(&TrendStatus::AlignedUp));
    }

    #[test]
    fn new_position_without_history_still_fires() {
        let d = detector();
        let positions = vec![position(101, "XAUUSD", Direction::Buy)];
        let acct = account(1000, 1000, "2025-06-10");

        let (events, state) =
            d.poll(&DetectorState::default(), &positions, &acct, &BarCache::new());

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::NewPosition { trend, .. } => assert_eq!(*trend, TrendStatus::Unknown),
            other => panic!("expected NewPosition, got {:?}", other),
        }
        // Failed classifications are never stored.
        assert!(state.classifications.is_empty());
        assert!(state.positions.contains_key(&101));
    }

    #[test]
    fn trend_flip_is_reported_once_and_batched() {
        let d = detector();
        let positions = vec![position(101, "XAUUSD", Direction::Buy)];
        let acct = account(1000, 1000, "2025-06-10");

        let (_, state) = d.poll(
            &DetectorState::default(),
            &positions,
            &acct,
            &cache("XAUUSD", rising(60)),
        );

        let (events, next) = d.poll(&state, &positions, &acct, &cache("XAUUSD", falling(60)));
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::TrendChanged { changes } => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].ticket, 101);
                assert_eq!(changes[0].status, TrendStatus::Misaligned);
            }
            other => panic!("expected TrendChanged, got {:?}", other),
        }

        // Same bars again: flip already recorded, nothing new.
        let (events, _) = d.poll(&next, &positions, &acct, &cache("XAUUSD", falling(60)));
        assert!(events.is_empty());
    }

    #[test]
    fn missing_history_keeps_stored_classification() {
        let d = detector();
        let positions = vec![position(101, "XAUUSD", Direction::Buy)];
        let acct = account(1000, 1000, "2025-06-10");

        let (_, state) = d.poll(
            &DetectorState::default(),
            &positions,
            &acct,
            &cache("XAUUSD", rising(60)),
        );

        let (events, next) = d.poll(&state, &positions, &acct, &BarCache::new());
        assert!(events.is_empty());
        assert_eq!(next.classifications.get(&101), Some(&TrendStatus::AlignedUp));
    }

    #[test]
    fn simultaneous_closes_are_one_batched_event() {
        let d = detector();
        let acct = account(1000, 1000, "2025-06-10");
        let open = vec![
            position(101, "XAUUSD", Direction::Buy),
            position(102, "EURUSD", Direction::Sell),
        ];

        let (_, state) = d.poll(&DetectorState::default(), &open, &acct, &BarCache::new());
        let (events, next) = d.poll(&state, &[], &acct, &BarCache::new());

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::ClosedPositions { tickets } => assert_eq!(tickets, &vec![101, 102]),
            other => panic!("expected ClosedPositions, got {:?}", other),
        }
        assert!(next.positions.is_empty());
        assert!(next.classifications.is_empty());
    }

    #[test]
    fn classification_pruned_with_its_ticket() {
        let d = detector();
        let acct = account(1000, 1000, "2025-06-10");
        let open = vec![
            position(101, "XAUUSD", Direction::Buy),
            position(102, "EURUSD", Direction::Sell),
        ];
        let mut bars = cache("XAUUSD", rising(60));
        bars.insert("EURUSD".to_string(), falling(60));

        let (_, state) = d.poll(&DetectorState::default(), &open, &acct, &bars);
        assert_eq!(state.classifications.len(), 2);

        let keep = vec![position(102, "EURUSD", Direction::Sell)];
        let (_, next) = d.poll(&state, &keep, &acct, &bars);
        assert!(!next.classifications.contains_key(&101));
        assert_eq!(next.classifications.get(&102), Some(&TrendStatus::AlignedDown));
    }

    #[test]
    fn balance_change_reports_both_deltas() {
        let d = detector();
        let (_, state) = d.poll(
            &DetectorState::default(),
            &[],
            &account(1000, 1000, "2025-06-10"),
            &BarCache::new(),
        );

        let (events, _) = d.poll(
            &state,
            &[],
            &account(1200, 1200, "2025-06-10"),
            &BarCache::new(),
        );

        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::BalanceChanged {
                previous,
                current,
                delta,
                daily_delta,
                ..
            } => {
                assert_eq!(*previous, Decimal::from(1000));
                assert_eq!(*current, Decimal::from(1200));
                assert_eq!(*delta, Decimal::from(200));
                assert_eq!(*daily_delta, Decimal::from(200));
            }
            other => panic!("expected BalanceChanged, got {:?}", other),
        }
    }

    #[test]
    fn equity_jump_threshold_is_inclusive() {
        let d = detector();
        let (_, state) = d.poll(
            &DetectorState::default(),
            &[],
            &account(5000, 5000, "2025-06-10"),
            &BarCache::new(),
        );

        let (events, state) = d.poll(
            &state,
            &[],
            &account(5000, 5090, "2025-06-10"),
            &BarCache::new(),
        );
        assert!(events.is_empty(), "delta 90 is below the threshold");

        let (events, _) = d.poll(
            &state,
            &[],
            &account(5000, 5240, "2025-06-10"),
            &BarCache::new(),
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::EquityJump { delta, .. } => assert_eq!(*delta, Decimal::from(150)),
            other => panic!("expected EquityJump, got {:?}", other),
        }
    }

    #[test]
    fn day_rollover_resets_daily_reference() {
        let d = detector();
        let (_, state) = d.poll(
            &DetectorState::default(),
            &[],
            &account(1000, 1000, "2025-06-10"),
            &BarCache::new(),
        );
        let (_, state) = d.poll(
            &state,
            &[],
            &account(1500, 1500, "2025-06-10"),
            &BarCache::new(),
        );
        assert_eq!(state.daily_reference_balance, Some(Decimal::from(1000)));

        // New day: baseline becomes this day's first observed balance, so
        // the delta against yesterday reports a daily delta of zero.
        let (events, state) = d.poll(
            &state,
            &[],
            &account(1700, 1700, "2025-06-11"),
            &BarCache::new(),
        );
        assert_eq!(state.daily_reference_balance, Some(Decimal::from(1700)));
        match &events[0] {
            Event::BalanceChanged {
                delta, daily_delta, ..
            } => {
                assert_eq!(*delta, Decimal::from(200));
                assert_eq!(*daily_delta, Decimal::ZERO);
            }
            other => panic!("expected BalanceChanged, got {:?}", other),
        }
    }

    #[test]
    fn events_keep_discovery_order() {
        let d = detector();
        let acct0 = account(1000, 1000, "2025-06-10");
        let open = vec![
            position(101, "XAUUSD", Direction::Buy),
            position(102, "EURUSD", Direction::Sell),
        ];
        let mut bars = cache("XAUUSD", rising(60));
        bars.insert("EURUSD".to_string(), falling(60));

        let (_, state) = d.poll(&DetectorState::default(), &open, &acct0, &bars);

        // One poll with everything at once: a new ticket, a flip on 101, a
        // close on 102, a balance change and an equity jump.
        let next_open = vec![
            position(101, "XAUUSD", Direction::Buy),
            position(103, "GBPUSD", Direction::Buy),
        ];
        let mut bars = cache("XAUUSD", falling(60));
        bars.insert("GBPUSD".to_string(), rising(60));
        let acct1 = account(1300, 1250, "2025-06-10");

        let (events, _) = d.poll(&state, &next_open, &acct1, &bars);
        let kinds: Vec<&'static str> = events
            .iter()
            .map(|e| match e {
                Event::NewPosition { .. } => "new",
                Event::TrendChanged { .. } => "trend",
                Event::ClosedPositions { .. } => "closed",
                Event::BalanceChanged { .. } => "balance",
                Event::EquityJump { .. } => "equity",
            })
            .collect();
        assert_eq!(kinds, vec!["new", "trend", "closed", "balance", "equity"]);
    }

    #[test]
    fn state_survives_a_json_round_trip() {
        let d = detector();
        let positions = vec![position(101, "XAUUSD", Direction::Buy)];
        let acct = account(1000, 1000, "2025-06-10");
        let bars = cache("XAUUSD", rising(60));

        let (_, state) = d.poll(&DetectorState::default(), &positions, &acct, &bars);
        let json = serde_json::to_string(&state).unwrap();
        let restored: DetectorState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);

        // A restart must not re-announce ticket 101.
        let (events, _) = d.poll(&restored, &positions, &acct, &bars);
        assert!(events.is_empty());
    }
}
