//! Market-data fan-in: venue adapter contract and the cross-venue consolidator
//!
//! Adapters normalize venue streams into [`FeedEvent`]s; the
//! [`Consolidator`] routes them into the order-book store and ticker cache
//! and fans change notifications out to subscribers.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod consolidator;
pub mod event;
pub mod sim;

pub use adapter::{FeedConfig, FeedError, VenueAdapter};
pub use consolidator::{BestPrices, Consolidator, ConsolidatorStats};
pub use event::FeedEvent;
pub use sim::{SimFeed, SimStep};
