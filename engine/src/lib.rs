//! Engine context: owns and wires every component
//!
//! There is no process-global state; the [`Engine`] holds the store, the
//! consolidator, the detector, the risk manager and the metrics collector,
//! and everything is reached through it.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use common::EngineConfig;
use detector::ArbitrageDetector;
use feeds::{Consolidator, VenueAdapter};
use lob::BookStore;
use metrics::MetricsCollector;
use parking_lot::Mutex;
use risk::{RiskConfig, RiskManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// File the final metrics snapshot is written to on shutdown
pub const FINAL_METRICS_FILE: &str = "metrics_final.json";

/// The assembled arbitrage engine
pub struct Engine {
    config: EngineConfig,
    store: Arc<BookStore>,
    consolidator: Arc<Consolidator>,
    detector: Arc<ArbitrageDetector>,
    risk: Arc<RiskManager>,
    metrics: Arc<MetricsCollector>,
    sampler: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
    metrics_dir: PathBuf,
}

impl Engine {
    /// Assemble every component from configuration
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(BookStore::new(config.system.order_book_depth));
        let consolidator = Arc::new(Consolidator::new(
            Arc::clone(&store),
            config.system.market_data_buffer_size,
        ));
        let metrics = Arc::new(MetricsCollector::new());

        let risk_config = RiskConfig {
            max_portfolio_exposure: config.arbitrage.max_portfolio_exposure,
            ..RiskConfig::default()
        };
        let risk = Arc::new(RiskManager::new(risk_config));

        let detector = Arc::new(ArbitrageDetector::new(
            Arc::clone(&consolidator),
            Arc::clone(&risk),
            Arc::clone(&metrics),
            config.arbitrage.clone(),
        ));

        // Bridge ingest volume into the metrics surface
        let sink = Arc::clone(&metrics);
        consolidator.register_market_data_callback(Box::new(move |_| {
            sink.increment_messages_processed();
            Ok(())
        }));
        let sink = Arc::clone(&metrics);
        consolidator.register_orderbook_callback(Box::new(move |_, _| {
            sink.increment_messages_processed();
            Ok(())
        }));

        Self {
            config,
            store,
            consolidator,
            detector,
            risk,
            metrics,
            sampler: Mutex::new(None),
            metrics_dir: PathBuf::from("."),
        }
    }

    /// Write the final metrics snapshot under `dir` instead of the cwd
    pub fn with_metrics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metrics_dir = dir.into();
        self
    }

    /// Register one venue's adapter
    pub fn register_venue(&self, adapter: Box<dyn VenueAdapter>) {
        self.consolidator.register_adapter(adapter);
    }

    /// Subscribe configured symbols, connect feeds, start detection
    pub async fn start(&self) -> Result<()> {
        for symbol in &self.config.arbitrage.symbols {
            for venue_config in self.config.venues.iter().filter(|v| v.enabled) {
                for &instrument in &venue_config.instrument_types {
                    self.consolidator.subscribe_on(
                        venue_config.venue,
                        symbol.clone(),
                        instrument,
                    );
                }
            }
        }

        self.consolidator
            .start()
            .await
            .context("starting market-data consolidator")?;
        self.detector.start();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(metrics::run_sampler(Arc::clone(&self.metrics), rx));
        *self.sampler.lock() = Some((tx, handle));

        info!("engine started");
        Ok(())
    }

    /// Stop every worker and write the final metrics snapshot
    pub async fn stop(&self) -> Result<()> {
        self.detector.stop().await;
        self.consolidator.stop().await;

        let sampler = self.sampler.lock().take();
        if let Some((tx, handle)) = sampler {
            let _ = tx.send(true);
            let _ = handle.await;
        }

        let path = self.metrics_dir.join(FINAL_METRICS_FILE);
        self.metrics
            .write_final_snapshot(&path)
            .with_context(|| format!("writing {}", path.display()))?;

        info!("engine stopped");
        Ok(())
    }

    /// Order-book store
    pub fn store(&self) -> &Arc<BookStore> {
        &self.store
    }

    /// Market-data consolidator
    pub fn consolidator(&self) -> &Arc<Consolidator> {
        &self.consolidator
    }

    /// Arbitrage detector
    pub fn detector(&self) -> &Arc<ArbitrageDetector> {
        &self.detector
    }

    /// Risk manager
    pub fn risk(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Load an [`EngineConfig`] from a JSON file
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{InstrumentType, MarketData, Symbol, Ts, Venue};
    use feeds::{FeedEvent, SimFeed};

    fn ticker(venue: Venue, bid: f64, ask: f64) -> MarketData {
        MarketData {
            symbol: Symbol::from("BTC-USDT"),
            venue,
            instrument: InstrumentType::Spot,
            ts: Ts::now(),
            bid_price: bid,
            ask_price: ask,
            bid_size: 0.5,
            ask_size: 0.5,
            last_price: (bid + ask) / 2.0,
            volume_24h: 0.0,
            funding_rate: None,
            expiry: None,
        }
    }

    #[tokio::test]
    async fn full_cycle_writes_final_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.venues = vec![
            common::VenueConfig::for_venue(Venue::Okx),
            common::VenueConfig::for_venue(Venue::Binance),
        ];
        let engine = Engine::new(config).with_metrics_dir(dir.path());

        let mut okx = SimFeed::new(Venue::Okx);
        okx.push_ticker(ticker(Venue::Okx, 50_000.0, 50_005.0));
        let mut binance = SimFeed::new(Venue::Binance);
        binance.push_ticker(ticker(Venue::Binance, 50_100.0, 50_105.0));
        engine.register_venue(Box::new(okx));
        engine.register_venue(Box::new(binance));

        engine.start().await.unwrap();
        // Let the feeds drain and a few detection passes run
        tokio::time::sleep(std::time::Duration::from_millis(350)).await;
        engine.stop().await.unwrap();

        // Both tickers made it through the pump
        assert!(engine.consolidator().stats().messages_received >= 2);
        // The profitable inversion was detected
        assert!(engine.detector().stats().opportunities_detected >= 1);
        // Final snapshot landed on disk
        let written = dir.path().join(FINAL_METRICS_FILE);
        assert!(written.exists());
        let parsed: metrics::MetricsSnapshot =
            serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
        assert!(parsed.performance.opportunities_detected >= 1);
    }

    #[tokio::test]
    async fn direct_ingest_without_feeds() {
        let engine = Engine::new(EngineConfig::default());
        engine
            .consolidator()
            .ingest(FeedEvent::Ticker(ticker(Venue::Okx, 100.0, 101.0)));
        assert_eq!(engine.consolidator().stats().messages_received, 1);
    }
}
