//! Cross-venue consolidation: ticker cache, best prices, subscriber fan-out

use crate::adapter::VenueAdapter;
use crate::event::FeedEvent;
use anyhow::Result;
use common::{InstrumentType, MarketData, MarketDataKey, Symbol, Venue};
use dashmap::DashMap;
use lob::{BookSnapshot, BookStore};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Market-data change subscriber
pub type MarketDataCallback = Box<dyn Fn(&MarketData) -> Result<()> + Send + Sync>;

/// Order-book change subscriber
pub type BookCallback = Box<dyn Fn(&MarketDataKey, &BookSnapshot) -> Result<()> + Send + Sync>;

/// Best bid and ask for a symbol across all venues of one instrument type
#[derive(Debug, Clone, PartialEq)]
pub struct BestPrices {
    /// Highest bid across venues
    pub best_bid: f64,
    /// Venue quoting the best bid
    pub best_bid_venue: Venue,
    /// Size at the best bid
    pub best_bid_size: f64,
    /// Lowest ask across venues
    pub best_ask: f64,
    /// Venue quoting the best ask
    pub best_ask_venue: Venue,
    /// Size at the best ask
    pub best_ask_size: f64,
}

/// Ingest counters
#[derive(Debug, Clone, Default)]
pub struct ConsolidatorStats {
    /// Events received from adapters
    pub messages_received: u64,
    /// Events routed into the store or cache
    ///
    /// Divergence from `messages_received` is the drop rate.
    pub messages_processed: u64,
    /// Updates per venue
    pub updates_by_venue: FxHashMap<Venue, u64>,
}

#[derive(Debug, Clone)]
struct Subscription {
    symbol: Symbol,
    instrument: InstrumentType,
    venue: Option<Venue>,
}

/// Fan-in point for all venue adapters
///
/// Owns the ticker/funding cache, routes book updates into the shared
/// [`BookStore`], and invokes subscriber callbacks synchronously on the
/// ingest path in arrival order. Callbacks must not call back into the
/// consolidator.
pub struct Consolidator {
    store: Arc<BookStore>,
    tickers: DashMap<MarketDataKey, MarketData>,
    adapters: Mutex<Vec<Box<dyn VenueAdapter>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    md_callbacks: RwLock<Vec<MarketDataCallback>>,
    book_callbacks: RwLock<Vec<BookCallback>>,
    buffer_size: usize,
    running: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    messages_received: AtomicU64,
    messages_processed: AtomicU64,
    updates_by_venue: DashMap<Venue, u64>,
}

impl Consolidator {
    /// Create a consolidator routing book updates into `store`
    pub fn new(store: Arc<BookStore>, buffer_size: usize) -> Self {
        Self {
            store,
            tickers: DashMap::new(),
            adapters: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            md_callbacks: RwLock::new(Vec::new()),
            book_callbacks: RwLock::new(Vec::new()),
            buffer_size,
            running: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            messages_received: AtomicU64::new(0),
            messages_processed: AtomicU64::new(0),
            updates_by_venue: DashMap::new(),
        }
    }

    /// Shared order-book store
    pub fn store(&self) -> &Arc<BookStore> {
        &self.store
    }

    /// Park an adapter until [`start`](Self::start)
    pub fn register_adapter(&self, adapter: Box<dyn VenueAdapter>) {
        info!(venue = %adapter.venue(), "registered venue adapter");
        self.adapters.lock().push(adapter);
    }

    /// Subscribe a symbol on every venue
    pub fn subscribe(&self, symbol: Symbol, instrument: InstrumentType) {
        self.subscriptions.lock().push(Subscription {
            symbol,
            instrument,
            venue: None,
        });
    }

    /// Subscribe a symbol on one venue only
    pub fn subscribe_on(&self, venue: Venue, symbol: Symbol, instrument: InstrumentType) {
        self.subscriptions.lock().push(Subscription {
            symbol,
            instrument,
            venue: Some(venue),
        });
    }

    /// Register a ticker-change subscriber
    pub fn register_market_data_callback(&self, cb: MarketDataCallback) {
        self.md_callbacks.write().push(cb);
    }

    /// Register an order-book-change subscriber
    pub fn register_orderbook_callback(&self, cb: BookCallback) {
        self.book_callbacks.write().push(cb);
    }

    /// Connect every registered adapter and start pumping events
    ///
    /// Idempotent; a second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock() = Some(shutdown_tx);

        let (tx, mut rx) = mpsc::channel::<FeedEvent>(self.buffer_size);

        // Event pump: single consumer keeps per-key callback order equal to
        // arrival order.
        let pump = {
            let this = Arc::clone(self);
            let mut shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        event = rx.recv() => match event {
                            Some(event) => this.ingest(event),
                            None => break,
                        },
                        _ = shutdown.changed() => break,
                    }
                }
            })
        };
        self.tasks.lock().push(pump);

        let adapters: Vec<Box<dyn VenueAdapter>> = self.adapters.lock().drain(..).collect();
        let subscriptions = self.subscriptions.lock().clone();
        info!(adapters = adapters.len(), "starting consolidator");

        for mut adapter in adapters {
            let venue = adapter.venue();
            let subs: Vec<Subscription> = subscriptions
                .iter()
                .filter(|s| s.venue.is_none() || s.venue == Some(venue))
                .cloned()
                .collect();
            let tx = tx.clone();
            let shutdown = shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = Self::drive_adapter(adapter.as_mut(), &subs, tx, shutdown).await {
                    error!(%venue, error = %e, "venue feed terminated");
                }
                let _ = adapter.disconnect().await;
            });
            self.tasks.lock().push(handle);
        }

        Ok(())
    }

    /// Connect, apply subscriptions, then pump with bounded reconnects
    async fn drive_adapter(
        adapter: &mut dyn VenueAdapter,
        subs: &[Subscription],
        tx: mpsc::Sender<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let config = adapter.config();
        let venue = adapter.venue();

        adapter.connect().await?;
        for sub in subs {
            adapter
                .subscribe_orderbook(&sub.symbol, sub.instrument)
                .await?;
            adapter.subscribe_ticker(&sub.symbol, sub.instrument).await?;
            adapter.subscribe_trades(&sub.symbol, sub.instrument).await?;
            if sub.instrument == InstrumentType::Perpetual {
                adapter.subscribe_funding_rate(&sub.symbol).await?;
            }
        }

        let mut attempts = 0u32;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                result = adapter.run(tx.clone()) => match result {
                    Ok(()) => {
                        info!(%venue, "feed stream ended");
                        break;
                    }
                    Err(e) => {
                        attempts += 1;
                        if attempts > config.max_reconnects {
                            return Err(crate::adapter::FeedError::ReconnectExhausted {
                                venue,
                                attempts: attempts - 1,
                            }
                            .into());
                        }
                        warn!(%venue, error = %e, attempt = attempts, "feed error; reconnecting");
                        tokio::time::sleep(std::time::Duration::from_millis(
                            config.reconnect_delay_ms,
                        ))
                        .await;
                        adapter.connect().await?;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        Ok(())
    }

    /// Stop pumping and join every worker
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(true);
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        info!("consolidator stopped");
    }

    /// Route one normalized event (also the test entry point)
    pub fn ingest(&self, event: FeedEvent) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        match event {
            FeedEvent::Ticker(md) => {
                *self.updates_by_venue.entry(md.venue).or_insert(0) += 1;
                self.tickers.insert(md.key(), md.clone());
                for cb in self.md_callbacks.read().iter() {
                    if let Err(e) = cb(&md) {
                        warn!(key = %md.key(), error = %e, "market-data subscriber failed");
                    }
                }
                self.messages_processed.fetch_add(1, Ordering::Relaxed);
            }
            FeedEvent::Book {
                key,
                bids,
                asks,
                ts,
            } => {
                *self.updates_by_venue.entry(key.venue).or_insert(0) += 1;
                self.store.update_bids(&key, bids, ts);
                self.store.update_asks(&key, asks, ts);
                if let Some(snapshot) = self.store.snapshot(&key) {
                    for cb in self.book_callbacks.read().iter() {
                        if let Err(e) = cb(&key, &snapshot) {
                            warn!(%key, error = %e, "order-book subscriber failed");
                        }
                    }
                }
                self.messages_processed.fetch_add(1, Ordering::Relaxed);
            }
            FeedEvent::Error { venue, message } => {
                warn!(%venue, %message, "venue feed error");
            }
        }
    }

    /// Latest ticker entry for a key
    pub fn market_data(&self, key: &MarketDataKey) -> Option<MarketData> {
        self.tickers.get(key).map(|entry| entry.value().clone())
    }

    /// Every cached ticker entry for a symbol, across venues and instruments
    pub fn all_for_symbol(&self, symbol: &Symbol) -> Vec<MarketData> {
        self.tickers
            .iter()
            .filter(|entry| &entry.key().symbol == symbol)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Funding rate for a perpetual, when cached
    pub fn funding_rate(&self, symbol: &Symbol, venue: Venue) -> Option<f64> {
        let key = MarketDataKey::new(symbol.clone(), venue, InstrumentType::Perpetual);
        self.tickers.get(&key).and_then(|md| md.funding_rate)
    }

    /// Best bid and ask for `symbol` across all venues quoting `instrument`
    ///
    /// Absent when no venue has cached data for the pair.
    pub fn best_prices(&self, symbol: &Symbol, instrument: InstrumentType) -> Option<BestPrices> {
        let mut best: Option<BestPrices> = None;

        for venue in Venue::ALL {
            let key = MarketDataKey::new(symbol.clone(), venue, instrument);
            let Some(md) = self.tickers.get(&key) else {
                continue;
            };

            match &mut best {
                None => {
                    best = Some(BestPrices {
                        best_bid: md.bid_price,
                        best_bid_venue: venue,
                        best_bid_size: md.bid_size,
                        best_ask: md.ask_price,
                        best_ask_venue: venue,
                        best_ask_size: md.ask_size,
                    });
                }
                Some(best) => {
                    if md.bid_price > best.best_bid {
                        best.best_bid = md.bid_price;
                        best.best_bid_venue = venue;
                        best.best_bid_size = md.bid_size;
                    }
                    if md.ask_price < best.best_ask {
                        best.best_ask = md.ask_price;
                        best.best_ask_venue = venue;
                        best.best_ask_size = md.ask_size;
                    }
                }
            }
        }

        best
    }

    /// Ingest counters
    pub fn stats(&self) -> ConsolidatorStats {
        ConsolidatorStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            updates_by_venue: self
                .updates_by_venue
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{PriceLevel, Ts};
    use std::sync::atomic::AtomicUsize;

    fn consolidator() -> Arc<Consolidator> {
        Arc::new(Consolidator::new(Arc::new(BookStore::new(50)), 64))
    }

    fn ticker(venue: Venue, bid: f64, ask: f64, size: f64) -> MarketData {
        MarketData {
            symbol: Symbol::from("BTC-USDT"),
            venue,
            instrument: InstrumentType::Spot,
            ts: Ts::now(),
            bid_price: bid,
            ask_price: ask,
            bid_size: size,
            ask_size: size,
            last_price: (bid + ask) / 2.0,
            volume_24h: 1_000.0,
            funding_rate: None,
            expiry: None,
        }
    }

    #[test]
    fn best_prices_aggregates_across_venues() {
        let c = consolidator();
        c.ingest(FeedEvent::Ticker(ticker(Venue::Okx, 50_010.0, 50_012.0, 1.0)));
        c.ingest(FeedEvent::Ticker(ticker(
            Venue::Binance,
            50_050.0,
            50_052.0,
            1.0,
        )));

        let best = c
            .best_prices(&Symbol::from("BTC-USDT"), InstrumentType::Spot)
            .unwrap();
        assert_eq!(best.best_bid, 50_050.0);
        assert_eq!(best.best_bid_venue, Venue::Binance);
        assert_eq!(best.best_ask, 50_012.0);
        assert_eq!(best.best_ask_venue, Venue::Okx);
    }

    #[test]
    fn best_prices_absent_without_data() {
        let c = consolidator();
        assert!(c
            .best_prices(&Symbol::from("BTC-USDT"), InstrumentType::Spot)
            .is_none());
    }

    #[test]
    fn book_events_reach_the_store() {
        let c = consolidator();
        let key = MarketDataKey::new(Symbol::from("BTC-USDT"), Venue::Okx, InstrumentType::Spot);
        c.ingest(FeedEvent::Book {
            key: key.clone(),
            bids: vec![PriceLevel::new(100.0, 1.0)],
            asks: vec![PriceLevel::new(101.0, 1.0)],
            ts: Ts::from_millis(1),
        });
        assert_eq!(c.store().best_bid(&key).unwrap().price, 100.0);
        assert_eq!(c.store().best_ask(&key).unwrap().price, 101.0);
    }

    #[test]
    fn failing_subscriber_does_not_wedge_ingest() {
        let c = consolidator();
        let delivered = Arc::new(AtomicUsize::new(0));

        c.register_market_data_callback(Box::new(|_| anyhow::bail!("subscriber down")));
        let counter = Arc::clone(&delivered);
        c.register_market_data_callback(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        c.ingest(FeedEvent::Ticker(ticker(Venue::Okx, 100.0, 101.0, 1.0)));
        c.ingest(FeedEvent::Ticker(ticker(Venue::Okx, 100.5, 101.5, 1.0)));

        // The healthy subscriber saw every update despite the failing one
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        let stats = c.stats();
        assert_eq!(stats.messages_received, 2);
        assert_eq!(stats.messages_processed, 2);
    }

    #[test]
    fn callbacks_observe_arrival_order() {
        let c = consolidator();
        let seen: Arc<parking_lot::Mutex<Vec<f64>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        c.register_market_data_callback(Box::new(move |md| {
            sink.lock().push(md.bid_price);
            Ok(())
        }));

        for bid in [1.0, 2.0, 3.0, 4.0] {
            c.ingest(FeedEvent::Ticker(ticker(Venue::Bybit, bid, bid + 1.0, 1.0)));
        }
        assert_eq!(*seen.lock(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn feed_errors_are_counted_not_processed() {
        let c = consolidator();
        c.ingest(FeedEvent::Error {
            venue: Venue::Okx,
            message: "parse failure".to_string(),
        });
        let stats = c.stats();
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.messages_processed, 0);
    }

    #[test]
    fn all_for_symbol_filters() {
        let c = consolidator();
        c.ingest(FeedEvent::Ticker(ticker(Venue::Okx, 100.0, 101.0, 1.0)));
        let mut other = ticker(Venue::Okx, 5.0, 6.0, 1.0);
        other.symbol = Symbol::from("ETH-USDT");
        c.ingest(FeedEvent::Ticker(other));

        assert_eq!(c.all_for_symbol(&Symbol::from("BTC-USDT")).len(), 1);
        assert_eq!(c.all_for_symbol(&Symbol::from("ETH-USDT")).len(), 1);
        assert!(c.all_for_symbol(&Symbol::from("SOL-USDT")).is_empty());
    }
}
