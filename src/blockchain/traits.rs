use async_trait::async_trait;
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt, H256, U256};

use crate::types::SyncResult;

/// PriceOracle 읽기 전용 호출
#[async_trait]
pub trait OracleChainReader: Send + Sync {
    /// anchors(asset).priceMantissa
    async fn pending_anchor(&self, oracle: Address, asset: Address) -> SyncResult<U256>;

    /// assetPrices(asset)
    async fn asset_price(&self, oracle: Address, asset: Address) -> SyncResult<U256>;

    /// poster()
    async fn poster(&self, oracle: Address) -> SyncResult<Address>;

    /// anchorAdmin()
    async fn anchor_admin(&self, oracle: Address) -> SyncResult<Address>;

    /// 현재 블록 번호
    async fn block_number(&self) -> SyncResult<u64>;
}

/// 서명 계정 하나에 묶인 트랜잭션 전송 기능
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// 서명자 주소
    fn signer_address(&self) -> Address;

    fn chain_id(&self) -> u64;

    /// pending 기준 트랜잭션 카운트 (nonce)
    async fn transaction_count(&self, account: Address) -> SyncResult<U256>;

    async fn gas_price(&self) -> SyncResult<U256>;

    async fn balance(&self, account: Address) -> SyncResult<U256>;

    /// 트랜잭션 서명 후 RLP 인코딩된 raw 바이트 반환
    async fn sign_transaction(&self, tx: TypedTransaction) -> SyncResult<Bytes>;

    /// 서명된 트랜잭션 브로드캐스트
    async fn send_raw_transaction(&self, raw: Bytes) -> SyncResult<H256>;

    /// 영수증 대기. 멤풀에서 사라진 경우 None
    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> SyncResult<Option<TransactionReceipt>>;
}

/// 읽기 + 쓰기 기능을 모두 가진 체인 클라이언트
pub trait ChainClient: OracleChainReader + TransactionSender {}

impl<T: OracleChainReader + TransactionSender> ChainClient for T {}
