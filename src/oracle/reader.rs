use std::sync::Arc;
use ethers::types::{Address, U256};
use tracing::debug;

use crate::blockchain::OracleChainReader;
use crate::types::{AnchorPrice, SyncResult};

/// PriceOracle 컨트랙트 읽기 클라이언트
#[derive(Clone)]
pub struct OracleReadClient {
    reader: Arc<dyn OracleChainReader>,
    oracle: Address,
}

/// 앵커 조회 관점의 별칭
pub type AnchorPriceReader = OracleReadClient;

impl OracleReadClient {
    pub fn new(reader: Arc<dyn OracleChainReader>, oracle: Address) -> Self {
        Self { reader, oracle }
    }

    pub fn oracle_address(&self) -> Address {
        self.oracle
    }

    /// 앵커 가격과 조회 시점 블록 높이
    pub async fn get_pending_anchor(&self, asset: Address) -> SyncResult<AnchorPrice> {
        let (mantissa, as_of) = tokio::try_join!(
            self.reader.pending_anchor(self.oracle, asset),
            self.reader.block_number()
        )?;

        debug!("⚓ {:?} anchor = {} @ block {}", asset, mantissa, as_of);
        Ok(AnchorPrice { asset, mantissa, as_of })
    }

    /// 현재 기록된 가격
    pub async fn get_price(&self, asset: Address) -> SyncResult<U256> {
        self.reader.asset_price(self.oracle, asset).await
    }

    pub async fn get_poster(&self) -> SyncResult<Address> {
        self.reader.poster(self.oracle).await
    }

    pub async fn get_anchor_admin(&self) -> SyncResult<Address> {
        self.reader.anchor_admin(self.oracle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockChainClient;
    use crate::types::SyncError;

    #[tokio::test]
    async fn test_reads_anchor_and_block() {
        let chain = Arc::new(MockChainClient::new());
        let asset = Address::from_low_u64_be(9);
        chain.set_anchor(asset, U256::from(95));
        chain.set_asset_price(asset, U256::from(94));
        chain.set_block_number(1_234);

        let client = OracleReadClient::new(chain.clone(), Address::from_low_u64_be(77));

        let anchor = client.get_pending_anchor(asset).await.unwrap();
        assert_eq!(anchor.mantissa, U256::from(95));
        assert_eq!(anchor.as_of, 1_234);
        assert_eq!(client.get_price(asset).await.unwrap(), U256::from(94));
        assert_eq!(client.get_poster().await.unwrap(), chain.poster_address());
    }

    #[tokio::test]
    async fn test_unknown_asset_reads_zero() {
        let chain = Arc::new(MockChainClient::new());
        let client = OracleReadClient::new(chain, Address::zero());

        let anchor = client.get_pending_anchor(Address::from_low_u64_be(5)).await.unwrap();
        assert!(anchor.mantissa.is_zero());
    }

    #[tokio::test]
    async fn test_read_failure_is_net_error() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_fail_reads(true);
        let client = OracleReadClient::new(chain, Address::zero());

        let err = client.get_pending_anchor(Address::from_low_u64_be(5)).await.unwrap_err();
        assert!(matches!(err, SyncError::Net(_)));
    }
}
