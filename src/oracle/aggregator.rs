use chrono::Utc;
use ethers::types::U256;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::constants::MIN_SOURCES;
use crate::types::{AggregatedPrice, Quote, SyncError, SyncResult};

/// 다중 거래소 가격 집계기
///
/// 유효 시세 개수가 최소 소스 수 이상일 때만 중간값을 계산합니다.
/// 개수 검사 외의 이상치 제거는 하지 않습니다.
#[derive(Debug, Clone)]
pub struct PriceAggregator {
    /// 최소 필요 소스 수
    min_sources: usize,
}

impl Default for PriceAggregator {
    fn default() -> Self {
        Self::new(MIN_SOURCES)
    }
}

impl PriceAggregator {
    pub fn new(min_sources: usize) -> Self {
        Self { min_sources }
    }

    pub fn min_sources(&self) -> usize {
        self.min_sources
    }

    /// 시세 목록을 하나의 중간값으로 집계
    pub fn aggregate(&self, asset: &str, quotes: &[Quote]) -> SyncResult<AggregatedPrice> {
        let prices: Vec<Decimal> = quotes
            .iter()
            .filter(|q| q.valid)
            .map(|q| q.price)
            .collect();

        if prices.len() < self.min_sources {
            warn!(
                "🚫 {} 유효 시세 부족: {}/{}",
                asset,
                prices.len(),
                self.min_sources
            );
            return Err(SyncError::Filter {
                found: prices.len(),
                required: self.min_sources,
            });
        }

        let median = median(&prices).ok_or(SyncError::Median)?;

        info!("📈 {} 중간값: {} ({}개 소스)", asset, median, prices.len());

        Ok(AggregatedPrice {
            asset: asset.to_string(),
            median,
            source_count: prices.len(),
            computed_at: Utc::now(),
        })
    }
}

/// 중간값 계산 (짝수 개면 가운데 두 값의 평균)
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        midpoint(sorted[mid - 1], sorted[mid])
    } else {
        Some(sorted[mid])
    }
}

/// (low + high) / 2, 합이 Decimal 범위를 넘으면 low + (high - low) / 2 로 계산
fn midpoint(low: Decimal, high: Decimal) -> Option<Decimal> {
    let two = Decimal::from(2);
    match low.checked_add(high) {
        Some(sum) => sum.checked_div(two),
        None => high
            .checked_sub(low)
            .and_then(|diff| diff.checked_div(two))
            .and_then(|half| low.checked_add(half)),
    }
}

/// Decimal 가격을 레지스트리 mantissa 로 변환: trunc(value * 10^decimals)
///
/// Decimal 의 (정수부, scale) 표현을 그대로 U256 연산으로 옮기므로 부동소수 오차가 없습니다.
pub fn to_mantissa(value: Decimal, decimals: u32) -> SyncResult<U256> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(SyncError::Data(format!("negative price: {}", value)));
    }

    let raw = value.mantissa().unsigned_abs();
    let scale = value.scale();

    let scaled = U256::from(raw)
        .checked_mul(U256::exp10(decimals as usize))
        .ok_or_else(|| SyncError::Data(format!("mantissa overflow: {} * 10^{}", value, decimals)))?;

    let mantissa = scaled / U256::exp10(scale as usize);
    debug!("{} -> mantissa {} (decimals {})", value, mantissa, decimals);
    Ok(mantissa)
}
