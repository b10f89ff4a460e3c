pub mod chain_mock;
pub mod exchange_mock;

pub use chain_mock::MockChainClient;
pub use exchange_mock::{MockExchangeFeed, MockFeedResponse};

use std::env;

/// 테스트/데모용 poster 계정 (hardhat 기본 계정 #0)
pub const MOCK_POSTER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const MOCK_POSTER_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// 테스트/데모용 anchorAdmin 계정 (hardhat 기본 계정 #1)
pub const MOCK_ADMIN_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const MOCK_ADMIN_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

/// mock 모드 기본 오라클 주소
pub const MOCK_ORACLE_ADDRESS: &str = "0x02557a5E05DeFeFFD4cAe6D83eA3d173B272c904";

/// Check if mock mode is enabled
pub fn is_mock_mode() -> bool {
    env::var("API_MODE").unwrap_or_default() == "mock"
}

/// Get mock configuration values
pub fn get_mock_config() -> MockConfig {
    MockConfig {
        chain_id: env::var("MOCK_CHAIN_ID")
            .unwrap_or_else(|_| "1337".to_string())
            .parse()
            .unwrap_or(1337),
        gas_price: env::var("MOCK_GAS_PRICE")
            .unwrap_or_else(|_| "20000000000".to_string())
            .parse()
            .unwrap_or(20_000_000_000u64),
        network_latency: env::var("MOCK_NETWORK_LATENCY")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50),
        price_volatility: env::var("MOCK_PRICE_VOLATILITY")
            .unwrap_or_else(|_| "0.01".to_string())
            .parse()
            .unwrap_or(0.01),
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub chain_id: u64,
    /// wei
    pub gas_price: u64,
    /// 거래소 응답 지연 (ms)
    pub network_latency: u64,
    /// 기준가 대비 무작위 변동 폭
    pub price_volatility: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::Address;

    #[test]
    fn test_mock_keys_match_addresses() {
        let poster: LocalWallet = MOCK_POSTER_KEY.parse().unwrap();
        assert_eq!(poster.address(), MOCK_POSTER_ADDRESS.parse::<Address>().unwrap());

        let admin: LocalWallet = MOCK_ADMIN_KEY.parse().unwrap();
        assert_eq!(admin.address(), MOCK_ADMIN_ADDRESS.parse::<Address>().unwrap());
    }
}
