pub mod aggregator;
pub mod capper;
pub mod reader;
pub mod account_locks;
pub mod submitter;

pub use aggregator::{median, to_mantissa, PriceAggregator};
pub use capper::AnchorSwingCapper;
pub use reader::{AnchorPriceReader, OracleReadClient};
pub use account_locks::AccountLocks;
pub use submitter::{PriceUpdateSubmitter, SubmitterSettings};
