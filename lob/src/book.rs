//! Single-key order book: sorted ladders plus derived analytics

use common::constants::MAX_ORDER_BOOK_DEPTH;
use common::{PriceLevel, Side, Ts};

/// Point-in-time copy of a book
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    /// Bid ladder, price-descending
    pub bids: Vec<PriceLevel>,
    /// Ask ladder, price-ascending
    pub asks: Vec<PriceLevel>,
    /// Sequence number of the last applied update
    pub sequence: u64,
    /// Time of the last applied update
    pub timestamp: Ts,
}

/// Aggregate depth statistics for one book
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthStats {
    /// Total bid quantity over the sampled levels
    pub total_bid_volume: f64,
    /// Total ask quantity over the sampled levels
    pub total_ask_volume: f64,
    /// Quantity-weighted average bid price
    pub avg_bid_price: f64,
    /// Quantity-weighted average ask price
    pub avg_ask_price: f64,
    /// Bid levels sampled
    pub bid_levels: usize,
    /// Ask levels sampled
    pub ask_levels: usize,
}

/// Order book for a single (symbol, venue, instrument)
///
/// Sides are replaced wholesale by the venue adapter; empty levels are
/// dropped on the way in and never become visible to readers.
#[derive(Debug, Clone)]
pub struct OrderBook {
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    depth: usize,
    sequence: u64,
    last_update: Ts,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new(MAX_ORDER_BOOK_DEPTH)
    }
}

impl OrderBook {
    /// Create an empty book retaining at most `depth` levels per side
    pub fn new(depth: usize) -> Self {
        Self {
            bids: Vec::with_capacity(depth),
            asks: Vec::with_capacity(depth),
            depth,
            sequence: 0,
            last_update: Ts::from_nanos(0),
        }
    }

    /// Replace the bid side with `levels`, sorted price-descending
    pub fn replace_bids(&mut self, levels: Vec<PriceLevel>, ts: Ts) -> u64 {
        self.bids = Self::normalize(levels, self.depth, true);
        self.bump(ts)
    }

    /// Replace the ask side with `levels`, sorted price-ascending
    pub fn replace_asks(&mut self, levels: Vec<PriceLevel>, ts: Ts) -> u64 {
        self.asks = Self::normalize(levels, self.depth, false);
        self.bump(ts)
    }

    fn normalize(mut levels: Vec<PriceLevel>, depth: usize, descending: bool) -> Vec<PriceLevel> {
        levels.retain(|l| !l.is_empty());
        if descending {
            levels.sort_by(|a, b| b.price.total_cmp(&a.price));
        } else {
            levels.sort_by(|a, b| a.price.total_cmp(&b.price));
        }
        levels.truncate(depth);
        levels
    }

    fn bump(&mut self, ts: Ts) -> u64 {
        self.sequence += 1;
        self.last_update = ts;
        self.sequence
    }

    /// Highest resting bid
    #[inline]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    /// Lowest resting ask
    #[inline]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    /// Sequence number of the last applied update
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time of the last applied update
    #[inline]
    pub fn last_update(&self) -> Ts {
        self.last_update
    }

    /// Mid price, absent unless both sides are quoted
    pub fn mid_price(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid.price + ask.price) / 2.0)
    }

    /// Absolute spread, absent unless both sides are quoted
    pub fn spread(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(ask.price - bid.price)
    }

    /// Spread in basis points of the mid
    pub fn spread_bps(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        let mid = (bid.price + ask.price) / 2.0;
        (mid > 0.0).then(|| (ask.price - bid.price) / mid * 10_000.0)
    }

    /// Depth imbalance over the top `depth` levels: `(Σbid - Σask)/(Σbid + Σask)`
    ///
    /// Zero when the sampled levels are empty or balanced.
    pub fn imbalance(&self, depth: usize) -> f64 {
        let bid_qty: f64 = self.bids.iter().take(depth).map(|l| l.quantity).sum();
        let ask_qty: f64 = self.asks.iter().take(depth).map(|l| l.quantity).sum();
        let total = bid_qty + ask_qty;
        if total <= 0.0 {
            return 0.0;
        }
        (bid_qty - ask_qty) / total
    }

    /// Volume-weighted fill price for `target_qty`
    ///
    /// A Buy walks the asks, a Sell walks the bids; the final level is
    /// clipped to the remaining quantity. Absent when the side cannot cover
    /// `target_qty`.
    pub fn vwap(&self, side: Side, target_qty: f64) -> Option<f64> {
        if target_qty <= 0.0 {
            return None;
        }
        let levels = match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };

        let mut total_value = 0.0;
        let mut total_qty = 0.0;
        for level in levels {
            if total_qty >= target_qty {
                break;
            }
            let take = (target_qty - total_qty).min(level.quantity);
            total_value += level.price * take;
            total_qty += take;
        }

        (total_qty >= target_qty - common::constants::EPSILON && total_qty > 0.0)
            .then(|| total_value / total_qty)
    }

    /// Depth-weighted mid: side VWAPs cross-weighted by opposite-side volume
    ///
    /// Falls back to the plain mid when a sampled side carries no volume.
    pub fn weighted_mid_price(&self, depth: usize) -> Option<f64> {
        if self.bids.is_empty() || self.asks.is_empty() {
            return None;
        }

        let (bid_value, bid_qty) = Self::side_totals(&self.bids, depth);
        let (ask_value, ask_qty) = Self::side_totals(&self.asks, depth);
        if bid_qty <= 0.0 || ask_qty <= 0.0 {
            return self.mid_price();
        }

        let bid_vwap = bid_value / bid_qty;
        let ask_vwap = ask_value / ask_qty;
        let total = bid_qty + ask_qty;
        Some((bid_vwap * ask_qty + ask_vwap * bid_qty) / total)
    }

    fn side_totals(levels: &[PriceLevel], depth: usize) -> (f64, f64) {
        levels.iter().take(depth).fold((0.0, 0.0), |(v, q), l| {
            (v + l.price * l.quantity, q + l.quantity)
        })
    }

    /// Per-side volume and weighted-average-price statistics
    pub fn depth_stats(&self, max_levels: usize) -> DepthStats {
        let mut stats = DepthStats::default();

        for level in self.bids.iter().take(max_levels) {
            stats.total_bid_volume += level.quantity;
            stats.avg_bid_price += level.price * level.quantity;
            stats.bid_levels += 1;
        }
        if stats.total_bid_volume > 0.0 {
            stats.avg_bid_price /= stats.total_bid_volume;
        }

        for level in self.asks.iter().take(max_levels) {
            stats.total_ask_volume += level.quantity;
            stats.avg_ask_price += level.price * level.quantity;
            stats.ask_levels += 1;
        }
        if stats.total_ask_volume > 0.0 {
            stats.avg_ask_price /= stats.total_ask_volume;
        }

        stats
    }

    /// A book is valid when at least one side is empty or bid < ask
    ///
    /// Crossed books are kept (the adapter keeps writing) but excluded from
    /// detection until the next update uncrosses them.
    pub fn is_valid(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price < ask.price,
            _ => true,
        }
    }

    /// Whether both sides carry at least one level
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Drop all levels, e.g. before a post-reconnect snapshot
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Copy out both ladders
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            sequence: self.sequence,
            timestamp: self.last_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn levels(pairs: &[(f64, f64)]) -> Vec<PriceLevel> {
        pairs.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect()
    }

    #[test]
    fn replace_sorts_and_trims() {
        let mut book = OrderBook::new(3);
        book.replace_bids(
            levels(&[(99.0, 1.0), (101.0, 1.0), (100.0, 1.0), (98.0, 1.0)]),
            Ts::from_nanos(1),
        );
        let snap = book.snapshot();
        let prices: Vec<f64> = snap.bids.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![101.0, 100.0, 99.0]);

        book.replace_asks(
            levels(&[(103.0, 1.0), (102.0, 1.0), (105.0, 1.0), (104.0, 1.0)]),
            Ts::from_nanos(2),
        );
        let snap = book.snapshot();
        let prices: Vec<f64> = snap.asks.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![102.0, 103.0, 104.0]);
        assert_eq!(snap.sequence, 2);
    }

    #[test]
    fn empty_levels_never_visible() {
        let mut book = OrderBook::default();
        book.replace_bids(
            levels(&[(100.0, 1.0), (99.5, 0.0), (99.0, -2.0)]),
            Ts::from_nanos(1),
        );
        let snap = book.snapshot();
        assert_eq!(snap.bids.len(), 1);
        assert!(snap.bids.iter().all(|l| l.quantity > 0.0));
    }

    #[test]
    fn best_levels_are_extremal() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(99.0, 1.0), (100.0, 2.0)]), Ts::from_nanos(1));
        book.replace_asks(levels(&[(101.0, 1.0), (102.0, 2.0)]), Ts::from_nanos(2));
        assert_eq!(book.best_bid().unwrap().price, 100.0);
        assert_eq!(book.best_ask().unwrap().price, 101.0);
    }

    #[test]
    fn empty_book_queries_absent() {
        let book = OrderBook::default();
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.mid_price().is_none());
        assert!(book.spread_bps().is_none());
        assert!(book.vwap(Side::Buy, 1.0).is_none());
    }

    #[test]
    fn one_sided_book_has_no_mid() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(100.0, 1.0)]), Ts::from_nanos(1));
        assert!(book.mid_price().is_none());
        assert!(book.spread().is_none());
        assert!(book.is_valid());
        assert!(!book.is_two_sided());
    }

    #[test]
    fn spread_bps_formula() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(99.0, 1.0)]), Ts::from_nanos(1));
        book.replace_asks(levels(&[(101.0, 1.0)]), Ts::from_nanos(2));
        // (101 - 99) / 100 * 10_000 = 200 bps
        assert_relative_eq!(book.spread_bps().unwrap(), 200.0);
    }

    #[rstest]
    // one level, clipped
    #[case(0.5, 100.0)]
    // exactly the first level
    #[case(1.0, 100.0)]
    // 1 @ 100 + 1 @ 101 + 0.5 @ 102 over 2.5
    #[case(2.5, (100.0 + 101.0 + 51.0) / 2.5)]
    // full depth
    #[case(4.0, (100.0 + 101.0 + 204.0) / 4.0)]
    fn vwap_walks_and_clips(#[case] target: f64, #[case] expected: f64) {
        let mut book = OrderBook::default();
        book.replace_asks(
            levels(&[(100.0, 1.0), (101.0, 1.0), (102.0, 2.0)]),
            Ts::from_nanos(1),
        );
        let vwap = book.vwap(Side::Buy, target).unwrap();
        assert_relative_eq!(vwap, expected);
    }

    #[test]
    fn vwap_exact_top_n_matches_weighted_mean() {
        let mut book = OrderBook::default();
        book.replace_bids(
            levels(&[(100.0, 2.0), (99.0, 3.0), (98.0, 5.0)]),
            Ts::from_nanos(1),
        );
        // Walking exactly the top-2 quantity reproduces their weighted mean
        let expected = (100.0 * 2.0 + 99.0 * 3.0) / 5.0;
        assert_relative_eq!(book.vwap(Side::Sell, 5.0).unwrap(), expected);
    }

    #[test]
    fn vwap_insufficient_depth_absent() {
        let mut book = OrderBook::default();
        book.replace_asks(levels(&[(100.0, 1.0)]), Ts::from_nanos(1));
        assert!(book.vwap(Side::Buy, 2.0).is_none());
    }

    #[test]
    fn imbalance_bounds_and_balance() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(100.0, 3.0)]), Ts::from_nanos(1));
        book.replace_asks(levels(&[(101.0, 3.0)]), Ts::from_nanos(2));
        assert_relative_eq!(book.imbalance(5), 0.0);

        book.replace_asks(levels(&[(101.0, 1.0)]), Ts::from_nanos(3));
        let imb = book.imbalance(5);
        assert!((-1.0..=1.0).contains(&imb));
        assert_relative_eq!(imb, 0.5);
    }

    #[test]
    fn crossed_book_flagged_invalid() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(100.0, 1.0)]), Ts::from_nanos(1));
        book.replace_asks(levels(&[(99.0, 1.0)]), Ts::from_nanos(2));
        assert!(!book.is_valid());
        // The data is still there for the next update to fix
        assert_eq!(book.best_bid().unwrap().price, 100.0);
    }

    #[test]
    fn weighted_mid_cross_weights() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(99.0, 1.0)]), Ts::from_nanos(1));
        book.replace_asks(levels(&[(101.0, 3.0)]), Ts::from_nanos(2));
        // bid vwap 99 weighted by ask qty 3, ask vwap 101 weighted by bid qty 1
        let wm = book.weighted_mid_price(5).unwrap();
        assert_relative_eq!(wm, (99.0 * 3.0 + 101.0 * 1.0) / 4.0);
    }

    #[test]
    fn depth_stats_totals() {
        let mut book = OrderBook::default();
        book.replace_bids(levels(&[(100.0, 2.0), (99.0, 2.0)]), Ts::from_nanos(1));
        book.replace_asks(levels(&[(101.0, 4.0)]), Ts::from_nanos(2));
        let stats = book.depth_stats(10);
        assert_relative_eq!(stats.total_bid_volume, 4.0);
        assert_relative_eq!(stats.avg_bid_price, 99.5);
        assert_eq!(stats.bid_levels, 2);
        assert_eq!(stats.ask_levels, 1);
    }
}
