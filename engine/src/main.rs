//! Arbitrage engine binary
//!
//! Loads configuration, wires the engine with scripted demo feeds for every
//! enabled venue, and runs until SIGINT/SIGTERM. Real venue adapters plug in
//! through [`Engine::register_venue`].

use anyhow::Result;
use common::{EngineConfig, InstrumentType, MarketData, MarketDataKey, PriceLevel, Ts, VenueConfig};
use engine::{load_config, Engine};
use feeds::SimFeed;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_new(&config.system.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.system.log_file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return;
    }

    match std::fs::File::create(&config.system.log_file) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            warn!(
                path = %config.system.log_file,
                error = %e,
                "log file unavailable; using stdout"
            );
        }
    }
}

/// Seed a scripted feed with a small market for each configured symbol
fn demo_feed(venue_config: &VenueConfig, config: &EngineConfig) -> SimFeed {
    let mut feed = SimFeed::new(venue_config.venue);
    let venue = venue_config.venue;

    // Deterministic per-venue offset so cross-venue spreads exist
    let offset = match venue {
        common::Venue::Okx => 0.0,
        common::Venue::Binance => 15.0,
        common::Venue::Bybit => -5.0,
    };

    for (i, symbol) in config.arbitrage.symbols.iter().enumerate() {
        let mid = 50_000.0 / (i + 1) as f64 + offset;
        let key = MarketDataKey::new(symbol.clone(), venue, InstrumentType::Spot);

        feed.push_book(
            key,
            vec![
                PriceLevel::new(mid - 1.0, 1.0),
                PriceLevel::new(mid - 2.0, 2.0),
            ],
            vec![
                PriceLevel::new(mid + 1.0, 1.0),
                PriceLevel::new(mid + 2.0, 2.0),
            ],
            Ts::now(),
        );
        feed.push_ticker(MarketData {
            symbol: symbol.clone(),
            venue,
            instrument: InstrumentType::Spot,
            ts: Ts::now(),
            bid_price: mid - 1.0,
            ask_price: mid + 1.0,
            bid_size: 1.0,
            ask_size: 1.0,
            last_price: mid,
            volume_24h: 0.0,
            funding_rate: None,
            expiry: None,
        });
        feed.push_wait(50);
    }

    feed
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(std::path::Path::new(&path))?,
        None => {
            let mut config = EngineConfig::default();
            config.venues = common::Venue::ALL
                .into_iter()
                .map(VenueConfig::for_venue)
                .collect();
            config
        }
    };

    init_tracing(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.system.thread_pool_size.max(1))
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: EngineConfig) -> Result<()> {
    info!(
        symbols = config.arbitrage.symbols.len(),
        venues = config.venues.iter().filter(|v| v.enabled).count(),
        "starting arbitrage engine"
    );

    let engine = Engine::new(config);
    for venue_config in engine.config().venues.clone() {
        if !venue_config.enabled {
            continue;
        }
        let feed = demo_feed(&venue_config, engine.config());
        engine.register_venue(Box::new(feed));
    }

    engine.start().await?;

    engine.detector().register_opportunity_callback(Box::new(|opp| {
        info!(
            id = %opp.id,
            profit = opp.expected_profit,
            capital = opp.required_capital,
            executable = opp.is_executable,
            "opportunity"
        );
        Ok(())
    }));

    shutdown_signal().await;
    info!("shutdown signal received");

    engine.stop().await?;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
