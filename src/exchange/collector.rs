use std::sync::Arc;
use futures::future::join_all;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};

use super::client::ExchangeFeed;
use crate::config::AssetConfig;
use crate::types::{Quote, SyncError};

/// 거래소 시세 수집기
///
/// 자산 하나에 대해 설정된 모든 거래소에 동시에 요청을 보내고,
/// 각 요청은 개별 타임아웃으로 제한됩니다. 실패한 거래소는 로그만 남기고
/// 결과에서 제외되며 호출자에게 에러를 전파하지 않습니다. 사이클 내 재시도 없음.
pub struct ExchangeFeedCollector {
    feed: Arc<dyn ExchangeFeed>,
    fetch_timeout: Duration,
}

impl ExchangeFeedCollector {
    pub fn new(feed: Arc<dyn ExchangeFeed>, fetch_timeout: Duration) -> Self {
        Self { feed, fetch_timeout }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// 모든 엔드포인트에서 시세 수집 (fan-out / fan-in)
    pub async fn collect(&self, asset: &AssetConfig) -> Vec<Quote> {
        let start = Instant::now();

        let requests = asset.endpoints.iter().map(|endpoint| {
            let feed = Arc::clone(&self.feed);
            let symbol = asset.symbol.as_str();
            async move {
                let result = match timeout(self.fetch_timeout, feed.fetch_price(symbol, endpoint)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Net(format!(
                        "timed out after {}ms",
                        self.fetch_timeout.as_millis()
                    ))),
                };
                (endpoint.exchange.as_str(), result)
            }
        });

        let results = join_all(requests).await;

        let mut quotes = Vec::with_capacity(results.len());
        for (exchange, result) in results {
            match result {
                Ok(price) => {
                    let quote = Quote::new(exchange, &asset.symbol, price);
                    if !quote.valid {
                        warn!("⚠️ {} {} 비정상 가격: {}", exchange, asset.symbol, price);
                    }
                    quotes.push(quote);
                }
                Err(e) => {
                    warn!(
                        "❌ {} {} 시세 조회 실패 [{}:{}]: {}",
                        exchange,
                        asset.symbol,
                        e.kind(),
                        e.code(),
                        e
                    );
                }
            }
        }

        let valid = quotes.iter().filter(|q| q.valid).count();
        info!(
            "📊 {} 시세 수집 완료: {}/{} 유효 ({}ms)",
            asset.symbol,
            valid,
            asset.endpoints.len(),
            start.elapsed().as_millis()
        );
        debug!(
            "{} quotes: {:?}",
            asset.symbol,
            quotes.iter().map(|q| (q.exchange.as_str(), q.price)).collect::<Vec<_>>()
        );

        quotes
    }
}
