//! Scripted feed adapter for tests and offline runs
//!
//! Plays a fixed sequence of normalized events, standing in for a live venue
//! connection. A full book snapshot should lead the script, mirroring the
//! snapshot-before-deltas rule real adapters follow after (re)connect.

use crate::adapter::{FeedConfig, FeedError, VenueAdapter};
use crate::event::FeedEvent;
use async_trait::async_trait;
use common::{InstrumentType, MarketData, MarketDataKey, PriceLevel, Symbol, Ts, Venue};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::debug;

/// One step of a scripted feed
#[derive(Debug, Clone)]
pub enum SimStep {
    /// Emit an event downstream
    Emit(FeedEvent),
    /// Pause for the given milliseconds
    Wait(u64),
}

/// Replay adapter that emits a prepared script
pub struct SimFeed {
    config: FeedConfig,
    connected: bool,
    subscriptions: FxHashSet<(Symbol, InstrumentType)>,
    script: VecDeque<SimStep>,
}

impl SimFeed {
    /// Empty feed for a venue
    pub fn new(venue: Venue) -> Self {
        Self {
            config: FeedConfig::for_venue(venue),
            connected: false,
            subscriptions: FxHashSet::default(),
            script: VecDeque::new(),
        }
    }

    /// Append a raw step
    pub fn push(&mut self, step: SimStep) -> &mut Self {
        self.script.push_back(step);
        self
    }

    /// Append a ticker event
    pub fn push_ticker(&mut self, md: MarketData) -> &mut Self {
        self.push(SimStep::Emit(FeedEvent::Ticker(md)))
    }

    /// Append a full book replacement
    pub fn push_book(
        &mut self,
        key: MarketDataKey,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        ts: Ts,
    ) -> &mut Self {
        self.push(SimStep::Emit(FeedEvent::Book {
            key,
            bids,
            asks,
            ts,
        }))
    }

    /// Append a pause
    pub fn push_wait(&mut self, millis: u64) -> &mut Self {
        self.push(SimStep::Wait(millis))
    }

    /// Steps remaining in the script
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Currently subscribed (symbol, instrument) pairs
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.len()
    }
}

#[async_trait]
impl VenueAdapter for SimFeed {
    fn venue(&self) -> Venue {
        self.config.venue
    }

    fn config(&self) -> FeedConfig {
        self.config.clone()
    }

    async fn connect(&mut self) -> Result<(), FeedError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), FeedError> {
        self.connected = false;
        Ok(())
    }

    async fn subscribe_orderbook(
        &mut self,
        symbol: &Symbol,
        instrument: InstrumentType,
    ) -> Result<(), FeedError> {
        if !self.connected {
            return Err(FeedError::NotConnected {
                venue: self.venue(),
            });
        }
        self.subscriptions.insert((symbol.clone(), instrument));
        Ok(())
    }

    async fn subscribe_trades(
        &mut self,
        _symbol: &Symbol,
        _instrument: InstrumentType,
    ) -> Result<(), FeedError> {
        Ok(())
    }

    async fn subscribe_ticker(
        &mut self,
        _symbol: &Symbol,
        _instrument: InstrumentType,
    ) -> Result<(), FeedError> {
        Ok(())
    }

    async fn subscribe_funding_rate(&mut self, _symbol: &Symbol) -> Result<(), FeedError> {
        Ok(())
    }

    async fn unsubscribe_orderbook(
        &mut self,
        symbol: &Symbol,
        instrument: InstrumentType,
    ) -> Result<(), FeedError> {
        self.subscriptions.remove(&(symbol.clone(), instrument));
        Ok(())
    }

    async fn unsubscribe_all(&mut self) -> Result<(), FeedError> {
        self.subscriptions.clear();
        Ok(())
    }

    async fn run(&mut self, tx: mpsc::Sender<FeedEvent>) -> Result<(), FeedError> {
        if !self.connected {
            return Err(FeedError::NotConnected {
                venue: self.venue(),
            });
        }
        while let Some(step) = self.script.pop_front() {
            match step {
                SimStep::Wait(millis) => {
                    tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                }
                SimStep::Emit(event) => {
                    if tx.send(event).await.is_err() {
                        // Receiver gone; orderly end
                        break;
                    }
                }
            }
        }
        debug!(venue = %self.venue(), "sim script exhausted");
        Ok(())
    }
}
