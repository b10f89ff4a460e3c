use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt, H256, U256, U64,
};
use ethers::utils::keccak256;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use super::{get_mock_config, MOCK_ADMIN_ADDRESS, MOCK_POSTER_ADDRESS, MOCK_POSTER_KEY};
use crate::blockchain::{OracleCall, OracleChainReader, TransactionSender};
use crate::types::{SyncError, SyncResult};

/// 인메모리 PriceOracle + 노드
///
/// nonce 는 브로드캐스트가 성공할 때만 증가하며, 현재 nonce 와 다른 트랜잭션은 거부합니다.
pub struct MockChainClient {
    wallet: LocalWallet,
    chain_id: u64,
    state: Mutex<MockChainState>,
}

struct MockChainState {
    anchors: HashMap<Address, U256>,
    prices: HashMap<Address, U256>,
    poster: Address,
    admin: Address,
    block_number: u64,
    nonce: u64,
    nonce_queries: usize,
    balance: U256,
    gas_price: U256,
    receipt_success: bool,
    fail_reads: bool,
    fail_broadcast: bool,
    drop_transactions: bool,
    nonce_delay: Duration,
    receipt_delay: Duration,
    signed: HashMap<Bytes, TypedTransaction>,
    receipts: HashMap<H256, TransactionReceipt>,
    sent: Vec<OracleCall>,
    last_gas_price: Option<U256>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    /// poster 키로 서명하는 mock 체인
    pub fn new() -> Self {
        Self::with_signer(MOCK_POSTER_KEY).expect("mock poster key is valid")
    }

    pub fn with_signer(private_key: &str) -> Result<Self> {
        let mock_config = get_mock_config();
        let wallet: LocalWallet = private_key
            .parse()
            .map_err(|e| anyhow!("Invalid private key: {}", e))?;
        let wallet = wallet.with_chain_id(mock_config.chain_id);

        let poster: Address = MOCK_POSTER_ADDRESS.parse()?;
        let admin: Address = MOCK_ADMIN_ADDRESS.parse()?;

        info!("🎭 MockChainClient initialized (signer {:?})", wallet.address());

        Ok(Self {
            wallet,
            chain_id: mock_config.chain_id,
            state: Mutex::new(MockChainState {
                anchors: HashMap::new(),
                prices: HashMap::new(),
                poster,
                admin,
                block_number: 18_000_000,
                nonce: 0,
                nonce_queries: 0,
                balance: U256::exp10(19),
                gas_price: U256::from(mock_config.gas_price),
                receipt_success: true,
                fail_reads: false,
                fail_broadcast: false,
                drop_transactions: false,
                nonce_delay: Duration::ZERO,
                receipt_delay: Duration::ZERO,
                signed: HashMap::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
                last_gas_price: None,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_anchor(&self, asset: Address, mantissa: U256) {
        self.state().anchors.insert(asset, mantissa);
    }

    pub fn set_asset_price(&self, asset: Address, mantissa: U256) {
        self.state().prices.insert(asset, mantissa);
    }

    pub fn set_poster(&self, poster: Address) {
        self.state().poster = poster;
    }

    pub fn poster_address(&self) -> Address {
        self.state().poster
    }

    pub fn set_block_number(&self, block: u64) {
        self.state().block_number = block;
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.state().nonce = nonce;
    }

    pub fn current_nonce(&self) -> u64 {
        self.state().nonce
    }

    /// transaction_count 호출 횟수
    pub fn nonce_queries(&self) -> usize {
        self.state().nonce_queries
    }

    pub fn set_balance(&self, balance: U256) {
        self.state().balance = balance;
    }

    pub fn set_gas_price(&self, gas_price: U256) {
        self.state().gas_price = gas_price;
    }

    pub fn last_gas_price(&self) -> Option<U256> {
        self.state().last_gas_price
    }

    pub fn set_receipt_success(&self, success: bool) {
        self.state().receipt_success = success;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn set_fail_broadcast(&self, fail: bool) {
        self.state().fail_broadcast = fail;
    }

    /// 브로드캐스트는 성공하지만 영수증이 생기지 않음
    pub fn set_drop_transactions(&self, drop: bool) {
        self.state().drop_transactions = drop;
    }

    pub fn set_nonce_delay(&self, delay: Duration) {
        self.state().nonce_delay = delay;
    }

    pub fn set_receipt_delay(&self, delay: Duration) {
        self.state().receipt_delay = delay;
    }

    /// 브로드캐스트된 오라클 호출 (전송 순서)
    pub fn sent_calls(&self) -> Vec<OracleCall> {
        self.state().sent.clone()
    }

    fn check_reads(&self) -> SyncResult<()> {
        if self.state().fail_reads {
            return Err(SyncError::Net("mock RPC unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OracleChainReader for MockChainClient {
    async fn pending_anchor(&self, _oracle: Address, asset: Address) -> SyncResult<U256> {
        self.check_reads()?;
        Ok(self.state().anchors.get(&asset).cloned().unwrap_or_default())
    }

    async fn asset_price(&self, _oracle: Address, asset: Address) -> SyncResult<U256> {
        self.check_reads()?;
        Ok(self.state().prices.get(&asset).cloned().unwrap_or_default())
    }

    async fn poster(&self, _oracle: Address) -> SyncResult<Address> {
        self.check_reads()?;
        Ok(self.state().poster)
    }

    async fn anchor_admin(&self, _oracle: Address) -> SyncResult<Address> {
        self.check_reads()?;
        Ok(self.state().admin)
    }

    async fn block_number(&self) -> SyncResult<u64> {
        self.check_reads()?;
        Ok(self.state().block_number)
    }
}

#[async_trait]
impl TransactionSender for MockChainClient {
    fn signer_address(&self) -> Address {
        self.wallet.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn transaction_count(&self, _account: Address) -> SyncResult<U256> {
        let delay = {
            let mut state = self.state();
            state.nonce_queries += 1;
            state.nonce_delay
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }

        Ok(U256::from(self.state().nonce))
    }

    async fn gas_price(&self) -> SyncResult<U256> {
        Ok(self.state().gas_price)
    }

    async fn balance(&self, _account: Address) -> SyncResult<U256> {
        Ok(self.state().balance)
    }

    async fn sign_transaction(&self, tx: TypedTransaction) -> SyncResult<Bytes> {
        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| SyncError::Sync(format!("mock signing failed: {}", e)))?;

        let raw = tx.rlp_signed(&signature);
        self.state().signed.insert(raw.clone(), tx);
        Ok(raw)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SyncResult<H256> {
        let mut state = self.state();

        if state.fail_broadcast {
            return Err(SyncError::Net("mock broadcast rejected".to_string()));
        }

        let tx = state
            .signed
            .get(&raw)
            .cloned()
            .ok_or_else(|| SyncError::Data("unknown raw transaction".to_string()))?;

        let nonce = tx.nonce().cloned().unwrap_or_default();
        if nonce != U256::from(state.nonce) {
            return Err(SyncError::Net(format!(
                "nonce too low: got {}, expected {}",
                nonce, state.nonce
            )));
        }

        let data = tx.data().map(|d| d.to_vec()).unwrap_or_default();
        let call = OracleCall::decode(&data)?;

        state.nonce += 1;
        state.block_number += 1;
        state.last_gas_price = tx.gas_price();

        if state.receipt_success {
            match &call {
                OracleCall::SetPrices { .. } => state.prices.extend(call.entries()),
                OracleCall::SetPendingAnchor { asset, mantissa } => {
                    state.anchors.insert(*asset, *mantissa);
                }
            }
        }
        state.sent.push(call);

        let tx_hash = H256::from(keccak256(&raw));
        if !state.drop_transactions {
            let receipt = TransactionReceipt {
                transaction_hash: tx_hash,
                block_number: Some(U64::from(state.block_number)),
                gas_used: Some(U256::from(85_000u64)),
                status: Some(U64::from(state.receipt_success as u64)),
                ..Default::default()
            };
            state.receipts.insert(tx_hash, receipt);
        }

        debug!("🎭 [MOCK] tx {:?} nonce {}", tx_hash, nonce);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        _confirmations: usize,
    ) -> SyncResult<Option<TransactionReceipt>> {
        let delay = self.state().receipt_delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }

        Ok(self.state().receipts.get(&tx_hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::TransactionRequest;

    fn set_prices_tx(nonce: u64) -> TypedTransaction {
        let data = OracleCall::SetPrices {
            assets: vec![Address::from_low_u64_be(1)],
            mantissas: vec![U256::from(100)],
        }
        .encode()
        .unwrap();

        TransactionRequest::new()
            .to(Address::from_low_u64_be(0xfeed))
            .data(data)
            .nonce(nonce)
            .gas(300_000u64)
            .gas_price(1u64)
            .chain_id(1337u64)
            .into()
    }

    #[tokio::test]
    async fn test_rejects_stale_nonce() {
        let chain = MockChainClient::new();

        let raw = chain.sign_transaction(set_prices_tx(0)).await.unwrap();
        chain.send_raw_transaction(raw).await.unwrap();
        assert_eq!(chain.current_nonce(), 1);

        let stale = chain.sign_transaction(set_prices_tx(0)).await.unwrap();
        let err = chain.send_raw_transaction(stale).await.unwrap_err();
        assert!(matches!(err, SyncError::Net(_)));
        assert_eq!(chain.sent_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_successful_set_prices_updates_state() {
        let chain = MockChainClient::new();
        let raw = chain.sign_transaction(set_prices_tx(0)).await.unwrap();
        let hash = chain.send_raw_transaction(raw).await.unwrap();

        let receipt = chain.wait_for_receipt(hash, 1).await.unwrap().unwrap();
        assert_eq!(receipt.status, Some(U64::from(1)));
        assert_eq!(
            chain.asset_price(Address::zero(), Address::from_low_u64_be(1)).await.unwrap(),
            U256::from(100)
        );
    }
}
