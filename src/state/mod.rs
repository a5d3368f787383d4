//! State module for tracking per-identifier crawl progress
//!
//! # Components
//!
//! - `MarketState`: where a single market identifier is in the fetch/extract cycle
//! - `SkipReason`: why an identifier was given up on
//! - `MarketOutcome`: the terminal result handed back to the crawl loop

mod market_state;

// Re-export main types
pub use market_state::{MarketOutcome, MarketState, SkipReason};
