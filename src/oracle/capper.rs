use std::str::FromStr;
use ethers::types::U256;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::constants::SWING_PRECISION;
use crate::types::{AnchorPrice, CappedPrice, SyncError, SyncResult};

/// 앵커 대비 스윙 제한기
///
/// ratio = (aggregate - anchor) / anchor 가 ±max_swing 안이면 그대로 통과시키고,
/// 벗어나면 anchor * trunc((1 ± max_swing) * 10) / 10 으로 클램프합니다.
/// 배수는 f64 곱셈 결과를 절삭하므로 0.1 의 배수가 아닌 스윙, 그리고 0.8/0.9 처럼
/// 부동소수 표현 오차가 있는 스윙은 설정값보다 작게 움직입니다.
/// 임계값 비교는 설정 스윙의 십진 표현으로 정확히 수행합니다.
#[derive(Debug, Clone)]
pub struct AnchorSwingCapper {
    max_swing: Decimal,
    /// 상승 시 배수 (x / SWING_PRECISION)
    up_multiplier: u64,
    /// 하락 시 배수 (x / SWING_PRECISION)
    down_multiplier: u64,
}

impl AnchorSwingCapper {
    pub fn new(max_pending_anchor_swing: f64) -> SyncResult<Self> {
        if !(max_pending_anchor_swing > 0.0 && max_pending_anchor_swing < 1.0) {
            return Err(SyncError::Data(format!(
                "max_pending_anchor_swing must be in (0, 1): {}",
                max_pending_anchor_swing
            )));
        }

        let max_swing = Decimal::from_str(&max_pending_anchor_swing.to_string())
            .map_err(|e| SyncError::Data(format!("invalid swing {}: {}", max_pending_anchor_swing, e)))?;

        // 배수는 부동소수 (1 ± swing) * 10 을 절삭한 값 (0.9 → 하락 배수 0)
        let precision = SWING_PRECISION as f64;
        let up_multiplier = ((1.0 + max_pending_anchor_swing) * precision).trunc() as u64;
        let down_multiplier = ((1.0 - max_pending_anchor_swing) * precision).trunc() as u64;

        let exact_up = (Decimal::ONE + max_swing) * Decimal::from(SWING_PRECISION);
        let exact_down = (Decimal::ONE - max_swing) * Decimal::from(SWING_PRECISION);
        if exact_up != Decimal::from(up_multiplier) || exact_down != Decimal::from(down_multiplier) {
            warn!(
                "⚠️ 스윙 {} 의 클램프 배수가 절삭됨 - 실제 {}/{} 및 {}/{} (설정 {} / {})",
                max_swing,
                up_multiplier,
                SWING_PRECISION,
                down_multiplier,
                SWING_PRECISION,
                exact_up,
                exact_down
            );
        }

        Ok(Self {
            max_swing,
            up_multiplier,
            down_multiplier,
        })
    }

    pub fn max_swing(&self) -> Decimal {
        self.max_swing
    }

    /// 집계 mantissa 에 앵커 기준 스윙 제한 적용
    pub fn cap(&self, anchor: &AnchorPrice, aggregated: U256) -> SyncResult<CappedPrice> {
        if anchor.mantissa.is_zero() {
            warn!("⚠️ {:?} 앵커 없음 - 집계 가격 그대로 사용: {}", anchor.asset, aggregated);
            return Ok(CappedPrice {
                asset: anchor.asset,
                mantissa: aggregated,
                capped: false,
            });
        }

        if !self.exceeds_swing(anchor.mantissa, aggregated)? {
            debug!("✅ {:?} 스윙 범위 내: {} (anchor {})", anchor.asset, aggregated, anchor.mantissa);
            return Ok(CappedPrice {
                asset: anchor.asset,
                mantissa: aggregated,
                capped: false,
            });
        }

        let multiplier = if aggregated > anchor.mantissa {
            self.up_multiplier
        } else {
            self.down_multiplier
        };

        let mantissa = anchor
            .mantissa
            .checked_mul(U256::from(multiplier))
            .ok_or_else(|| SyncError::Data(format!("capped mantissa overflow: {}", anchor.mantissa)))?
            / U256::from(SWING_PRECISION);

        info!(
            "✂️ {:?} 스윙 초과 - {} → {} (anchor {}, x{}/{})",
            anchor.asset, aggregated, mantissa, anchor.mantissa, multiplier, SWING_PRECISION
        );

        Ok(CappedPrice {
            asset: anchor.asset,
            mantissa,
            capped: true,
        })
    }

    /// |aggregated - anchor| / anchor >= max_swing 여부 (정수 교차곱)
    fn exceeds_swing(&self, anchor: U256, aggregated: U256) -> SyncResult<bool> {
        let diff = if aggregated > anchor {
            aggregated - anchor
        } else {
            anchor - aggregated
        };

        let swing_numerator = U256::from(self.max_swing.mantissa().unsigned_abs());
        let swing_denominator = U256::exp10(self.max_swing.scale() as usize);

        let overflow = || SyncError::Data("swing comparison overflow".to_string());
        let lhs = diff.checked_mul(swing_denominator).ok_or_else(overflow)?;
        let rhs = anchor.checked_mul(swing_numerator).ok_or_else(overflow)?;

        Ok(lhs >= rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn anchor(mantissa: u64) -> AnchorPrice {
        AnchorPrice {
            asset: Address::from_low_u64_be(1),
            mantissa: U256::from(mantissa),
            as_of: 100,
        }
    }

    #[test]
    fn test_pass_through_within_swing() {
        let capper = AnchorSwingCapper::new(0.10).unwrap();

        let result = capper.cap(&anchor(100), U256::from(105)).unwrap();
        assert_eq!(result.mantissa, U256::from(105));
        assert!(!result.capped);

        let result = capper.cap(&anchor(100), U256::from(91)).unwrap();
        assert_eq!(result.mantissa, U256::from(91));
        assert!(!result.capped);
    }

    #[test]
    fn test_clamp_up_and_down() {
        let capper = AnchorSwingCapper::new(0.10).unwrap();

        let result = capper.cap(&anchor(100), U256::from(200)).unwrap();
        assert_eq!(result.mantissa, U256::from(110));
        assert!(result.capped);

        let result = capper.cap(&anchor(100), U256::from(50)).unwrap();
        assert_eq!(result.mantissa, U256::from(90));
        assert!(result.capped);
    }

    #[test]
    fn test_boundary_is_clamped() {
        let capper = AnchorSwingCapper::new(0.10).unwrap();

        // 정확히 10% 는 클램프 경로로 들어가지만 값은 동일
        let result = capper.cap(&anchor(100), U256::from(110)).unwrap();
        assert_eq!(result.mantissa, U256::from(110));
        assert!(result.capped);
    }

    #[test]
    fn test_large_mantissa() {
        let capper = AnchorSwingCapper::new(0.10).unwrap();
        let one = U256::exp10(18);
        let anchor = AnchorPrice {
            asset: Address::from_low_u64_be(2),
            mantissa: one * U256::from(3),
            as_of: 1,
        };

        let result = capper.cap(&anchor, one * U256::from(4)).unwrap();
        assert_eq!(result.mantissa, one * U256::from(33) / U256::from(10));
    }

    #[test]
    fn test_zero_anchor_passes_through() {
        let capper = AnchorSwingCapper::new(0.10).unwrap();
        let result = capper.cap(&anchor(0), U256::from(12345)).unwrap();
        assert_eq!(result.mantissa, U256::from(12345));
        assert!(!result.capped);
    }

    #[test]
    fn test_multiplier_truncation() {
        // 1.15 * 10 = 11.5 → 11, 0.85 * 10 = 8.5 → 8
        let capper = AnchorSwingCapper::new(0.15).unwrap();

        let result = capper.cap(&anchor(100), U256::from(200)).unwrap();
        assert_eq!(result.mantissa, U256::from(110));

        let result = capper.cap(&anchor(100), U256::from(10)).unwrap();
        assert_eq!(result.mantissa, U256::from(80));

        // 스윙 판정은 설정값 그대로
        let result = capper.cap(&anchor(100), U256::from(114)).unwrap();
        assert_eq!(result.mantissa, U256::from(114));
        assert!(!result.capped);
    }

    #[test]
    fn test_multiplier_follows_float_truncation() {
        // 1 - 0.9 = 0.09999999999999998 → 배수 0
        let capper = AnchorSwingCapper::new(0.9).unwrap();
        let result = capper.cap(&anchor(100), U256::from(1)).unwrap();
        assert_eq!(result.mantissa, U256::zero());
        assert!(result.capped);

        // 1 - 0.8 = 0.19999999999999996 → 배수 1
        let capper = AnchorSwingCapper::new(0.8).unwrap();
        let result = capper.cap(&anchor(100), U256::from(1)).unwrap();
        assert_eq!(result.mantissa, U256::from(10));
        assert!(result.capped);

        // 0.1 은 11/9 그대로
        let capper = AnchorSwingCapper::new(0.1).unwrap();
        assert_eq!(capper.cap(&anchor(1000), U256::from(1)).unwrap().mantissa, U256::from(900));
        assert_eq!(capper.cap(&anchor(1000), U256::from(5000)).unwrap().mantissa, U256::from(1100));
    }

    #[test]
    fn test_invalid_swing() {
        tokio_test::assert_err!(AnchorSwingCapper::new(0.0));
        tokio_test::assert_err!(AnchorSwingCapper::new(1.0));
        tokio_test::assert_err!(AnchorSwingCapper::new(-0.1));
        tokio_test::assert_err!(AnchorSwingCapper::new(f64::NAN));
        tokio_test::assert_ok!(AnchorSwingCapper::new(0.2));
    }
}
