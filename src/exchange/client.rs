use std::str::FromStr;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::types::{SyncError, SyncResult};

/// Exchange price feed trait
#[async_trait]
pub trait ExchangeFeed: Send + Sync {
    /// Get feed name
    fn name(&self) -> &str;

    /// Fetch current price of `asset` from one configured endpoint
    async fn fetch_price(&self, asset: &str, endpoint: &EndpointConfig) -> SyncResult<Decimal>;
}

/// 지원하는 거래소 (ticker 응답 스키마 단위)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeVenue {
    Binance,
    HitBtc,
    Huobi,
    GateIo,
    Bitfinex,
    Bittrex,
    Kucoin,
}

impl FromStr for ExchangeVenue {
    type Err = SyncError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeVenue::Binance),
            "hitbtc" => Ok(ExchangeVenue::HitBtc),
            "huobi" => Ok(ExchangeVenue::Huobi),
            "gateio" => Ok(ExchangeVenue::GateIo),
            "bitfinex" => Ok(ExchangeVenue::Bitfinex),
            "bittrex" => Ok(ExchangeVenue::Bittrex),
            "kucoin" => Ok(ExchangeVenue::Kucoin),
            other => Err(SyncError::Feed(format!("unsupported exchange: {}", other))),
        }
    }
}

impl ExchangeVenue {
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeVenue::Binance => "binance",
            ExchangeVenue::HitBtc => "hitbtc",
            ExchangeVenue::Huobi => "huobi",
            ExchangeVenue::GateIo => "gateio",
            ExchangeVenue::Bitfinex => "bitfinex",
            ExchangeVenue::Bittrex => "bittrex",
            ExchangeVenue::Kucoin => "kucoin",
        }
    }

    /// 거래소별 ticker 응답에서 최종 체결가 추출
    pub fn parse_price(&self, body: &Value) -> SyncResult<Decimal> {
        let field = match self {
            // {"symbol":"ETHBTC","price":"0.03"}
            ExchangeVenue::Binance => body.get("price"),
            // {"last":"0.03", ...}
            ExchangeVenue::HitBtc => body.get("last"),
            // {"status":"ok","tick":{"close":0.03, ...}}
            ExchangeVenue::Huobi => body.get("tick").and_then(|t| t.get("close")),
            // {"result":"true","last":"0.03", ...}
            ExchangeVenue::GateIo => body.get("last"),
            // [["tETHBTC", bid, bidSize, ask, askSize, chg, chgRel, last, ...]]
            ExchangeVenue::Bitfinex => body.get(0).and_then(|row| row.get(7)),
            // {"success":true,"result":{"Bid":..,"Ask":..,"Last":0.03}}
            ExchangeVenue::Bittrex => body.get("result").and_then(|r| r.get("Last")),
            // {"code":"200000","data":{"price":"0.03", ...}}
            ExchangeVenue::Kucoin => body.get("data").and_then(|d| d.get("price")),
        };

        let field = field.ok_or_else(|| self.parse_error("price field missing"))?;
        value_to_decimal(field).ok_or_else(|| self.parse_error(&format!("not a number: {}", field)))
    }

    fn parse_error(&self, message: &str) -> SyncError {
        SyncError::Parse {
            exchange: self.name().to_string(),
            message: message.to_string(),
        }
    }
}

/// 문자열/숫자 JSON 값을 Decimal 로 변환
fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                // 부동소수 표현 오차를 피하기 위해 문자열 경유
                Decimal::from_str(&n.to_string())
                    .ok()
                    .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            }
        }
        _ => None,
    }
}

/// HTTP ticker feed (인증 없음)
#[derive(Debug, Clone)]
pub struct HttpExchangeFeed {
    client: Client,
}

impl HttpExchangeFeed {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("anchor-price-syncer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ExchangeFeed for HttpExchangeFeed {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_price(&self, asset: &str, endpoint: &EndpointConfig) -> SyncResult<Decimal> {
        let venue: ExchangeVenue = endpoint.exchange.parse()?;

        let response = self
            .client
            .get(&endpoint.url)
            .send()
            .await
            .map_err(|e| SyncError::Net(format!("{}: {}", venue.name(), e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Net(format!("{} returned HTTP {}", venue.name(), status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Data(format!("{} response decode failed: {}", venue.name(), e)))?;

        let price = venue.parse_price(&body)?;
        debug!("💱 {} {} = {}", venue.name(), asset, price);
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_venue_from_str() {
        assert_eq!("Binance".parse::<ExchangeVenue>().unwrap(), ExchangeVenue::Binance);
        assert_eq!(" kucoin ".parse::<ExchangeVenue>().unwrap(), ExchangeVenue::Kucoin);

        let err = "ftx".parse::<ExchangeVenue>().unwrap_err();
        assert_eq!(err.kind(), "FEED_ERROR");
    }

    #[test]
    fn test_parse_each_venue() {
        let cases = vec![
            (ExchangeVenue::Binance, json!({"symbol": "ETHBTC", "price": "0.03412000"}), "0.03412000"),
            (ExchangeVenue::HitBtc, json!({"ask": "0.0342", "bid": "0.0341", "last": "0.03413"}), "0.03413"),
            (ExchangeVenue::Huobi, json!({"status": "ok", "tick": {"close": 0.034135, "open": 0.0339}}), "0.034135"),
            (ExchangeVenue::GateIo, json!({"result": "true", "last": "0.0341"}), "0.0341"),
            (ExchangeVenue::GateIo, json!({"result": "true", "last": 0.0342}), "0.0342"),
            (
                ExchangeVenue::Bitfinex,
                json!([["tETHBTC", 0.0341, 10.5, 0.0342, 8.1, 0.0001, 0.003, 0.03415, 1200.0, 0.035, 0.033]]),
                "0.03415",
            ),
            (ExchangeVenue::Bittrex, json!({"success": true, "result": {"Bid": 0.0341, "Ask": 0.0342, "Last": 0.03411}}), "0.03411"),
            (ExchangeVenue::Kucoin, json!({"code": "200000", "data": {"price": "0.034121", "size": "0.1"}}), "0.034121"),
        ];

        for (venue, body, expected) in cases {
            assert_eq!(venue.parse_price(&body).unwrap(), dec(expected), "{:?}", venue);
        }
    }

    #[test]
    fn test_parse_integer_price() {
        let body = json!({"tick": {"close": 3000}});
        assert_eq!(ExchangeVenue::Huobi.parse_price(&body).unwrap(), dec("3000"));
    }

    #[test]
    fn test_parse_missing_or_garbage() {
        let err = ExchangeVenue::Binance.parse_price(&json!({"code": -1121, "msg": "Invalid symbol."})).unwrap_err();
        assert_eq!(err.kind(), "SYNC_PRICE_PARSE_ERROR");

        let err = ExchangeVenue::Kucoin.parse_price(&json!({"data": {"price": "n/a"}})).unwrap_err();
        assert_eq!(err.kind(), "SYNC_PRICE_PARSE_ERROR");

        let err = ExchangeVenue::Bitfinex.parse_price(&json!([])).unwrap_err();
        assert_eq!(err.kind(), "SYNC_PRICE_PARSE_ERROR");

        let err = ExchangeVenue::Bittrex.parse_price(&json!({"success": false, "result": null})).unwrap_err();
        assert_eq!(err.kind(), "SYNC_PRICE_PARSE_ERROR");
    }

    #[tokio::test]
    async fn test_http_feed_rejects_unknown_exchange() {
        let feed = HttpExchangeFeed::new(Duration::from_secs(1)).unwrap();
        let endpoint = EndpointConfig {
            exchange: "mtgox".to_string(),
            url: "http://127.0.0.1:1/ticker".to_string(),
        };

        let err = feed.fetch_price("usdt", &endpoint).await.unwrap_err();
        assert!(matches!(err, SyncError::Feed(_)));
    }
}
