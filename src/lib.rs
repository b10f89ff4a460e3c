// Anchor Price Syncer Library

pub mod config;
pub mod blockchain;
pub mod exchange;
pub mod oracle;
pub mod core;
pub mod mocks;

// Core types
pub mod types;
pub mod constants;

// Re-exports for convenience
pub use config::Config;
pub use core::{CycleReport, PriceSyncer, SyncStats};
pub use types::{SyncError, SyncResult};
