//! Concurrent order-book store keyed by (symbol, venue, instrument)

use crate::book::{BookSnapshot, DepthStats, OrderBook};
use common::{MarketDataKey, PriceLevel, Side, Ts};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// Shared store of per-key order books
///
/// Each key has exactly one writer (its venue adapter); readers take a brief
/// rwlock read and are never blocked across updates to other keys. Books are
/// created on first update and never removed while the engine runs. All
/// queries return `None` for keys that have not seen an update yet.
pub struct BookStore {
    books: DashMap<MarketDataKey, Arc<RwLock<OrderBook>>>,
    depth: usize,
}

impl BookStore {
    /// Create a store retaining at most `depth` levels per side
    pub fn new(depth: usize) -> Self {
        Self {
            books: DashMap::new(),
            depth,
        }
    }

    fn book(&self, key: &MarketDataKey) -> Option<Arc<RwLock<OrderBook>>> {
        self.books.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn book_or_insert(&self, key: &MarketDataKey) -> Arc<RwLock<OrderBook>> {
        Arc::clone(
            self.books
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RwLock::new(OrderBook::new(self.depth))))
                .value(),
        )
    }

    /// Atomically replace the bid side for `key`, returning the new sequence
    pub fn update_bids(&self, key: &MarketDataKey, levels: Vec<PriceLevel>, ts: Ts) -> u64 {
        let book = self.book_or_insert(key);
        let mut guard = book.write();
        let seq = guard.replace_bids(levels, ts);
        if !guard.is_valid() {
            warn!(%key, "book crossed after bid update; excluded from detection");
        }
        seq
    }

    /// Atomically replace the ask side for `key`, returning the new sequence
    pub fn update_asks(&self, key: &MarketDataKey, levels: Vec<PriceLevel>, ts: Ts) -> u64 {
        let book = self.book_or_insert(key);
        let mut guard = book.write();
        let seq = guard.replace_asks(levels, ts);
        if !guard.is_valid() {
            warn!(%key, "book crossed after ask update; excluded from detection");
        }
        seq
    }

    /// Best bid for `key`
    pub fn best_bid(&self, key: &MarketDataKey) -> Option<PriceLevel> {
        self.book(key)?.read().best_bid()
    }

    /// Best ask for `key`
    pub fn best_ask(&self, key: &MarketDataKey) -> Option<PriceLevel> {
        self.book(key)?.read().best_ask()
    }

    /// Mid price for `key`
    pub fn mid_price(&self, key: &MarketDataKey) -> Option<f64> {
        self.book(key)?.read().mid_price()
    }

    /// Spread in basis points for `key`
    pub fn spread_bps(&self, key: &MarketDataKey) -> Option<f64> {
        self.book(key)?.read().spread_bps()
    }

    /// Volume-weighted fill price for `target_qty` on `key`
    pub fn vwap(&self, key: &MarketDataKey, side: Side, target_qty: f64) -> Option<f64> {
        self.book(key)?.read().vwap(side, target_qty)
    }

    /// Depth imbalance over the top `depth` levels of `key`
    pub fn imbalance(&self, key: &MarketDataKey, depth: usize) -> Option<f64> {
        self.book(key).map(|b| b.read().imbalance(depth))
    }

    /// Depth-weighted mid price for `key`
    pub fn weighted_mid_price(&self, key: &MarketDataKey, depth: usize) -> Option<f64> {
        self.book(key)?.read().weighted_mid_price(depth)
    }

    /// Per-side depth statistics for `key`
    pub fn depth_stats(&self, key: &MarketDataKey, max_levels: usize) -> Option<DepthStats> {
        self.book(key).map(|b| b.read().depth_stats(max_levels))
    }

    /// Ladder snapshot for `key`
    pub fn snapshot(&self, key: &MarketDataKey) -> Option<BookSnapshot> {
        self.book(key).map(|b| b.read().snapshot())
    }

    /// Whether `key` has an uncrossed book; false for unknown keys
    pub fn is_valid(&self, key: &MarketDataKey) -> bool {
        self.book(key).map(|b| b.read().is_valid()).unwrap_or(false)
    }

    /// Drop all levels for `key`, e.g. before a post-reconnect snapshot
    pub fn clear(&self, key: &MarketDataKey) {
        if let Some(book) = self.book(key) {
            book.write().clear();
        }
    }

    /// Number of keys with a book
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Whether the store holds no books
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{InstrumentType, Symbol, Venue};

    fn key(venue: Venue) -> MarketDataKey {
        MarketDataKey::new(Symbol::from("BTC-USDT"), venue, InstrumentType::Spot)
    }

    fn levels(pairs: &[(f64, f64)]) -> Vec<PriceLevel> {
        pairs.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect()
    }

    #[test]
    fn unknown_key_is_absent_not_error() {
        let store = BookStore::new(50);
        let k = key(Venue::Okx);
        assert!(store.best_bid(&k).is_none());
        assert!(store.snapshot(&k).is_none());
        assert!(store.spread_bps(&k).is_none());
        assert!(store.vwap(&k, Side::Buy, 1.0).is_none());
        assert!(store.imbalance(&k, 5).is_none());
        assert!(!store.is_valid(&k));
    }

    #[test]
    fn books_created_on_first_update() {
        let store = BookStore::new(50);
        let k = key(Venue::Binance);
        assert!(store.is_empty());

        let seq = store.update_bids(&k, levels(&[(50_000.0, 1.0)]), Ts::from_millis(1));
        assert_eq!(seq, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.best_bid(&k).unwrap().price, 50_000.0);
    }

    #[test]
    fn sequences_are_monotonic_per_key() {
        let store = BookStore::new(50);
        let k = key(Venue::Okx);
        let s1 = store.update_bids(&k, levels(&[(100.0, 1.0)]), Ts::from_millis(1));
        let s2 = store.update_asks(&k, levels(&[(101.0, 1.0)]), Ts::from_millis(2));
        let s3 = store.update_bids(&k, levels(&[(100.5, 1.0)]), Ts::from_millis(3));
        assert!(s1 < s2 && s2 < s3);
    }

    #[test]
    fn crossed_book_accepted_but_invalid() {
        let store = BookStore::new(50);
        let k = key(Venue::Bybit);
        store.update_bids(&k, levels(&[(100.0, 1.0)]), Ts::from_millis(1));
        store.update_asks(&k, levels(&[(99.0, 1.0)]), Ts::from_millis(2));
        assert!(!store.is_valid(&k));
        // Snapshot still returns the stored ladders
        let snap = store.snapshot(&k).unwrap();
        assert_eq!(snap.bids[0].price, 100.0);
        assert_eq!(snap.asks[0].price, 99.0);
    }

    #[test]
    fn concurrent_reads_during_writes() {
        use std::thread;

        let store = Arc::new(BookStore::new(50));
        let k = key(Venue::Binance);
        store.update_bids(&k, levels(&[(100.0, 1.0)]), Ts::from_millis(1));
        store.update_asks(&k, levels(&[(101.0, 1.0)]), Ts::from_millis(1));

        let writer = {
            let store = Arc::clone(&store);
            let k = k.clone();
            thread::spawn(move || {
                for i in 0..1_000u64 {
                    let px = 100.0 + (i % 10) as f64 * 0.01;
                    store.update_bids(&k, vec![PriceLevel::new(px, 1.0)], Ts::from_millis(i));
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            let k = k.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    if let Some(bid) = store.best_bid(&k) {
                        assert!(bid.price >= 100.0);
                        assert!(bid.quantity > 0.0);
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
