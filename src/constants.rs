use ethers::types::Address;
use std::str::FromStr;

// Aggregation
pub const MIN_SOURCES: usize = 5;

// Swing capping
pub const DEFAULT_MAX_PENDING_ANCHOR_SWING: f64 = 0.10;
/// 클램프 배수를 정수로 만들 때 사용하는 스케일 ((1 + ratio) * 10 / 10)
pub const SWING_PRECISION: u64 = 10;

// Registry mantissa scale
pub const DEFAULT_MANTISSA_DECIMALS: u32 = 18;

// Gas limits
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
pub const MAX_GAS_PRICE_GWEI: u64 = 500;

// Time constants
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_CONFIRMATIONS: usize = 1;

// Error codes (kept numerically compatible with the legacy poster)
pub const DATA_ERROR: u32 = 100_001;
pub const NET_ERROR: u32 = 200_001;
pub const FEED_ERROR: u32 = 300_001;
pub const INSUFFICIENT_BALANCE: u32 = 300_002;
pub const POSTER_MISMATCH: u32 = 300_003;
pub const SYNC_PRICE_ERROR: u32 = 400_001;
pub const SYNC_PRICE_PARSE_ERROR: u32 = 400_002;
pub const SYNC_PRICE_FILTER_ERROR: u32 = 400_003;
pub const SYNC_PRICE_MEDIAN_ERROR: u32 = 400_004;

// Default synced assets (mainnet)
pub const IMBTC: &str = "0x3212b29E33587A00FB1C83346f5dBFA69A458923";
pub const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const USDX: &str = "0xeb269732ab75A6fD61Ea60b06fE994cD32a83549";

// Supported exchange venues
pub const EXCHANGES: [&str; 7] = [
    "binance",
    "hitbtc",
    "huobi",
    "gateio",
    "bitfinex",
    "bittrex",
    "kucoin",
];

// Helper function to get default asset addresses
pub fn get_asset_address(symbol: &str) -> Option<Address> {
    match symbol.to_lowercase().as_str() {
        "imbtc" => Address::from_str(IMBTC).ok(),
        "usdt" => Address::from_str(USDT).ok(),
        "usdx" => Address::from_str(USDX).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_asset_address() {
        assert!(get_asset_address("imbtc").is_some());
        assert!(get_asset_address("USDT").is_some());
        assert!(get_asset_address("doge").is_none());
    }
}
