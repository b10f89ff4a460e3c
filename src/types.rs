use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants;

/// 거래소 1곳에서 받은 단일 시세
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 거래소 이름 (binance, huobi, ...)
    pub exchange: String,
    /// 자산 심볼
    pub asset: String,
    pub price: Decimal,
    pub fetched_at: DateTime<Utc>,
    /// 0 이하의 가격은 valid=false 로 기록되고 집계에서 제외됨
    pub valid: bool,
}

impl Quote {
    pub fn new(exchange: &str, asset: &str, price: Decimal) -> Self {
        Self {
            exchange: exchange.to_string(),
            asset: asset.to_string(),
            price,
            fetched_at: Utc::now(),
            valid: price > Decimal::ZERO,
        }
    }
}

/// 한 사이클에서 계산된 자산별 중간값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub asset: String,
    pub median: Decimal,
    pub source_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// 온체인에 기록된 앵커 가격
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPrice {
    pub asset: Address,
    pub mantissa: U256,
    /// 조회 시점의 블록 높이
    pub as_of: u64,
}

/// 앵커 대비 스윙 제한이 적용된 최종 가격
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CappedPrice {
    pub asset: Address,
    pub mantissa: U256,
    /// 스윙 한도에 걸려 클램프되었는지 여부
    pub capped: bool,
}

/// 가격 업데이트 트랜잭션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Confirmed => write!(f, "confirmed"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 영수증 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceiptSummary {
    /// receipt.status == 1
    pub success: bool,
    pub block_number: u64,
    pub gas_used: U256,
}

/// 제출 시도 1회가 소유하는 트랜잭션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdateTx {
    pub assets: Vec<Address>,
    pub mantissas: Vec<U256>,
    pub nonce: U256,
    /// 서명된 raw 트랜잭션
    pub signature: Bytes,
    pub hash: Option<H256>,
    pub status: TxStatus,
    pub receipt: Option<TxReceiptSummary>,
}

impl PriceUpdateTx {
    /// 온체인에서 성공적으로 실행되었는지 확인
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Confirmed
            && self.receipt.as_ref().map(|r| r.success).unwrap_or(false)
    }
}

/// Error types
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Net(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Insufficient balance: {balance} < {required}")]
    InsufficientBalance { balance: U256, required: U256 },

    #[error("Poster mismatch: oracle expects {expected:?}, signer is {signer:?}")]
    PosterMismatch { expected: Address, signer: Address },

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Parsing price anomalies from {exchange}: {message}")]
    Parse { exchange: String, message: String },

    #[error("Get price less than {required}: only {found} valid quotes")]
    Filter { found: usize, required: usize },

    #[error("Did not get median")]
    Median,
}

impl SyncError {
    /// 에러 종류 이름
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Net(_) => "NET_ERROR",
            SyncError::Data(_) => "DATA_ERROR",
            SyncError::Feed(_) => "FEED_ERROR",
            SyncError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            SyncError::PosterMismatch { .. } => "POSTER_MISMATCH",
            SyncError::Sync(_) => "SYNC_PRICE_ERROR",
            SyncError::Parse { .. } => "SYNC_PRICE_PARSE_ERROR",
            SyncError::Filter { .. } => "SYNC_PRICE_FILTER_ERROR",
            SyncError::Median => "SYNC_PRICE_MEDIAN_ERROR",
        }
    }

    /// 숫자 에러 코드
    pub fn code(&self) -> u32 {
        match self {
            SyncError::Net(_) => constants::NET_ERROR,
            SyncError::Data(_) => constants::DATA_ERROR,
            SyncError::Feed(_) => constants::FEED_ERROR,
            SyncError::InsufficientBalance { .. } => constants::INSUFFICIENT_BALANCE,
            SyncError::PosterMismatch { .. } => constants::POSTER_MISMATCH,
            SyncError::Sync(_) => constants::SYNC_PRICE_ERROR,
            SyncError::Parse { .. } => constants::SYNC_PRICE_PARSE_ERROR,
            SyncError::Filter { .. } => constants::SYNC_PRICE_FILTER_ERROR,
            SyncError::Median => constants::SYNC_PRICE_MEDIAN_ERROR,
        }
    }

    /// 체인 쓰기 이전 단계(집계)에서 발생한 에러인지
    pub fn is_aggregation_error(&self) -> bool {
        matches!(self, SyncError::Filter { .. } | SyncError::Median)
    }
}

/// Result type alias
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_validity() {
        assert!(Quote::new("binance", "usdt", Decimal::new(3000, 0)).valid);
        assert!(!Quote::new("binance", "usdt", Decimal::ZERO).valid);
        assert!(!Quote::new("binance", "usdt", Decimal::new(-1, 0)).valid);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SyncError::Filter { found: 3, required: 5 }.code(), 400_003);
        assert_eq!(SyncError::Median.kind(), "SYNC_PRICE_MEDIAN_ERROR");
        assert_eq!(SyncError::Net("timeout".into()).code(), 200_001);
        assert_eq!(
            SyncError::InsufficientBalance { balance: U256::zero(), required: U256::one() }.kind(),
            "INSUFFICIENT_BALANCE"
        );
        assert!(SyncError::Median.is_aggregation_error());
        assert!(!SyncError::Data("bad".into()).is_aggregation_error());
    }

    #[test]
    fn test_tx_succeeded() {
        let mut tx = PriceUpdateTx {
            assets: vec![Address::zero()],
            mantissas: vec![U256::from(100)],
            nonce: U256::zero(),
            signature: Bytes::default(),
            hash: None,
            status: TxStatus::Pending,
            receipt: None,
        };
        assert!(!tx.succeeded());

        tx.status = TxStatus::Confirmed;
        tx.receipt = Some(TxReceiptSummary {
            success: false,
            block_number: 1,
            gas_used: U256::zero(),
        });
        assert!(!tx.succeeded());

        tx.receipt.as_mut().unwrap().success = true;
        assert!(tx.succeeded());
    }
}
