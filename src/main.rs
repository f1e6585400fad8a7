// src/main.rs
use crate::config::AppConfig;
use crate::connectors::discord::DiscordNotifier;
use crate::connectors::mt5::Mt5BridgeClient;
use crate::core::monitor::Monitor;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod analysis;
mod config;
mod connectors;
mod core;
mod error;
mod types;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::new()?;

    // Console plus a non-blocking daily log file.
    let file_appender = tracing_appender::rolling::daily("logs", "sentinel.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    println!("========================================");
    println!("        MT5 SENTINEL - v0.1.0");
    println!("========================================");
    println!("Bridge:   {}", config.mt5.bridge_url);
    println!("Server:   {}", config.mt5.server);
    println!("Interval: {}s", config.poll_interval_secs);
    println!("========================================");

    let broker = Mt5BridgeClient::new(config.mt5.clone())?;
    let notifier = DiscordNotifier::new(config.webhook_url.clone())?;

    let mut monitor = Monitor::new(config, Box::new(broker), Box::new(notifier));
    monitor.run().await?;

    info!("Monitor stopped cleanly");
    Ok(())
}
