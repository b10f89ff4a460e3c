pub mod client;
pub mod collector;

pub use client::{ExchangeFeed, ExchangeVenue, HttpExchangeFeed};
pub use collector::ExchangeFeedCollector;
