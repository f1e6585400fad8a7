// src/core/messages.rs
use crate::analysis::indicators::SymbolSnapshot;
use crate::types::{Event, TrendStatus};
use std::fmt::Write;

/// Render one detector event as notification text. One event, one message;
/// batching already happened inside the detector.
pub fn format_event(event: &Event) -> String {
    match event {
        Event::NewPosition { position, trend } => {
            let mut msg = format!(
                "📥 New position: {} | {} @ {:.2} | volume: {:.2}",
                position.symbol, position.direction, position.entry_price, position.volume
            );
            if *trend != TrendStatus::Unknown {
                let _ = write!(msg, "\n📊 Analysis: {}", trend);
            }
            msg
        }
        Event::TrendChanged { changes } => {
            let mut msg = String::new();
            for change in changes {
                let _ = writeln!(
                    msg,
                    "🔄 Analysis changed: {} | {} | {}",
                    change.symbol, change.direction, change.status
                );
            }
            msg.trim_end().to_string()
        }
        Event::ClosedPositions { tickets } => {
            let mut msg = String::from("🔴 Closed positions:\n");
            for ticket in tickets {
                let _ = writeln!(msg, "📤 Position {} was closed", ticket);
            }
            msg.trim_end().to_string()
        }
        Event::BalanceChanged {
            previous,
            current,
            delta,
            daily_delta,
            day,
        } => {
            let change = if delta.is_sign_positive() {
                "📈 increase"
            } else {
                "📉 decrease"
            };
            let daily_status = if daily_delta.is_sign_positive() && !daily_delta.is_zero() {
                "⬆️ profit"
            } else {
                "⬇️ loss"
            };
            format!(
                "💰 Balance change: {}\n\
                 🔢 Previous balance: {:.2}\n\
                 🔢 Current balance: {:.2}\n\
                 🔁 Instant delta: {:.2}\n\
                 📆 Total for {}: {} {:.2} 💵",
                change, previous, current, delta, day, daily_status, daily_delta
            )
        }
        Event::EquityJump {
            previous,
            current,
            delta,
        } => format!(
            "⚠️ Large equity move\n\
             🔢 Previous equity: {:.2}\n\
             🔢 Current equity: {:.2}\n\
             📉 Delta: {:.2} 💵",
            previous, current, delta
        ),
    }
}

/// Extra technical context appended to new-position notifications when
/// history was available.
pub fn format_symbol_snapshot(snapshot: &SymbolSnapshot) -> String {
    let structure = if snapshot.structure_break {
        "✅ structure break / liquidity present"
    } else {
        "❌ no structure break"
    };
    format!(
        "📊 RSI: {:.1} ({})\n\
         🛑 Support: {:.2} — 📈 Resistance: {:.2}\n\
         {}\n\
         🟢 Possible setup: entry {:.2} | SL {:.2} | TP {:.2}",
        snapshot.rsi,
        snapshot.rsi_zone.label(),
        snapshot.support,
        snapshot.resistance,
        structure,
        snapshot.targets.entry,
        snapshot.targets.stop_loss,
        snapshot.targets.take_profit
    )
}
