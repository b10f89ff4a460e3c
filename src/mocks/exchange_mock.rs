use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::time::{sleep, Duration};
use tracing::debug;

use super::{get_mock_config, MockConfig};
use crate::config::EndpointConfig;
use crate::exchange::ExchangeFeed;
use crate::types::{SyncError, SyncResult};

/// 거래소별 고정 응답
#[derive(Debug, Clone)]
pub enum MockFeedResponse {
    Price(Decimal),
    /// 지연 후 가격 응답
    Delayed(Decimal, Duration),
    Error(SyncError),
    /// 응답하지 않음 (타임아웃 유도)
    Hang,
}

/// Mock 거래소 시세 피드
///
/// 거래소별 고정 응답이 없으면 자산 기준가 주변의 무작위 가격을 돌려줍니다.
pub struct MockExchangeFeed {
    mock_config: MockConfig,
    responses: Mutex<HashMap<String, MockFeedResponse>>,
    base_prices: Mutex<HashMap<String, Decimal>>,
}

impl Default for MockExchangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchangeFeed {
    pub fn new() -> Self {
        Self {
            mock_config: get_mock_config(),
            responses: Mutex::new(HashMap::new()),
            base_prices: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_response(&self, exchange: &str, response: MockFeedResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(exchange.to_lowercase(), response);
    }

    /// 무작위 시세 모드의 자산 기준가
    pub fn set_base_price(&self, asset: &str, price: Decimal) {
        self.base_prices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(asset.to_lowercase(), price);
    }

    fn random_price(&self, asset: &str) -> Option<Decimal> {
        let base = self
            .base_prices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&asset.to_lowercase())
            .cloned()?;

        let volatility = self.mock_config.price_volatility.abs();
        let jitter = if volatility > 0.0 {
            rand::thread_rng().gen_range(-volatility..volatility)
        } else {
            0.0
        };

        let factor = Decimal::from_f64(1.0 + jitter).unwrap_or(Decimal::ONE);
        Some((base * factor).round_dp(8))
    }
}

#[async_trait]
impl ExchangeFeed for MockExchangeFeed {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_price(&self, asset: &str, endpoint: &EndpointConfig) -> SyncResult<Decimal> {
        let response = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&endpoint.exchange.to_lowercase())
            .cloned();

        match response {
            Some(MockFeedResponse::Price(price)) => Ok(price),
            Some(MockFeedResponse::Delayed(price, delay)) => {
                sleep(delay).await;
                Ok(price)
            }
            Some(MockFeedResponse::Error(e)) => Err(e),
            Some(MockFeedResponse::Hang) => {
                std::future::pending::<()>().await;
                Err(SyncError::Net("unreachable".to_string()))
            }
            None => {
                let price = self.random_price(asset).ok_or_else(|| {
                    SyncError::Net(format!("no mock price for {} on {}", asset, endpoint.exchange))
                })?;

                sleep(Duration::from_millis(self.mock_config.network_latency)).await;
                debug!("🎭 [MOCK] {} {} = {}", endpoint.exchange, asset, price);
                Ok(price)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(exchange: &str) -> EndpointConfig {
        EndpointConfig {
            exchange: exchange.to_string(),
            url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_fixed_response_wins() {
        let feed = MockExchangeFeed::new();
        feed.set_base_price("usdt", Decimal::ONE);
        feed.set_response("Binance", MockFeedResponse::Price(Decimal::from(7)));

        assert_eq!(feed.fetch_price("usdt", &endpoint("binance")).await.unwrap(), Decimal::from(7));
    }

    #[tokio::test]
    async fn test_random_price_stays_near_base() {
        let feed = MockExchangeFeed::new();
        feed.set_base_price("usdt", Decimal::from(100));

        let price = feed.fetch_price("usdt", &endpoint("kucoin")).await.unwrap();
        assert!(price > Decimal::from(50) && price < Decimal::from(150));
    }

    #[tokio::test]
    async fn test_unknown_asset_errors() {
        let feed = MockExchangeFeed::new();
        let err = feed.fetch_price("doge", &endpoint("kucoin")).await.unwrap_err();
        assert!(matches!(err, SyncError::Net(_)));
    }
}
