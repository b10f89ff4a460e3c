pub mod price_syncer;

pub use price_syncer::{AssetOracleState, AssetPriceReport, CycleReport, OracleStatus, PriceSyncer, SyncStats};
