use std::sync::Arc;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use ethers::{
    contract::{Contract, ContractError},
    providers::{Provider, Http, Middleware, PendingTransaction, ProviderError},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, TransactionReceipt,
        H256, U256,
    },
    signers::{LocalWallet, Signer},
};
use tracing::{info, debug, warn};

use super::abi::PRICE_ORACLE_ABI;
use super::traits::{OracleChainReader, TransactionSender};
use crate::types::{SyncError, SyncResult};

/// 블록체인 RPC 클라이언트
/// 오라클 상태를 읽고 서명된 가격 업데이트 트랜잭션을 전송하는 모듈
pub struct BlockchainClient {
    /// HTTP Provider
    http_provider: Arc<Provider<Http>>,
    /// 트랜잭션 서명용 Wallet
    wallet: Option<LocalWallet>,
    /// 체인 ID
    chain_id: u64,
}

impl BlockchainClient {
    /// Wallet과 함께 블록체인 클라이언트 생성
    pub async fn new_with_wallet(http_url: &str, private_key: Option<&str>) -> Result<Self> {
        info!("🔌 블록체인 RPC 클라이언트 초기화: {}", http_url);

        let http_provider = Provider::<Http>::try_from(http_url)
            .map_err(|e| anyhow!("Invalid RPC URL {}: {}", http_url, e))?;
        let http_provider = Arc::new(http_provider);

        // 체인 ID 확인
        let chain_id = http_provider.get_chainid().await?.as_u64();
        info!("🔗 체인 ID: {}", chain_id);

        let wallet = if let Some(pk) = private_key {
            let wallet: LocalWallet = pk.parse()
                .map_err(|e| anyhow!("Invalid private key: {}", e))?;
            let wallet = wallet.with_chain_id(chain_id);
            info!("🔑 Wallet 초기화 완료: {:?}", wallet.address());
            Some(wallet)
        } else {
            warn!("⚠️ Private key 없음 - 트랜잭션 서명 불가 (읽기 전용 모드)");
            None
        };

        Ok(Self {
            http_provider,
            wallet,
            chain_id,
        })
    }

    fn oracle_contract(&self, oracle: Address) -> Contract<Provider<Http>> {
        Contract::new(oracle, PRICE_ORACLE_ABI.clone(), self.http_provider.clone())
    }

    fn wallet(&self) -> SyncResult<&LocalWallet> {
        self.wallet
            .as_ref()
            .ok_or_else(|| SyncError::Sync("트랜잭션 서명 불가: Wallet이 설정되지 않음".to_string()))
    }
}

fn provider_error(err: ProviderError) -> SyncError {
    match err {
        ProviderError::SerdeJson(e) => SyncError::Data(e.to_string()),
        ProviderError::HexError(e) => SyncError::Data(e.to_string()),
        other => SyncError::Net(other.to_string()),
    }
}

fn abi_error(err: ethers::abi::AbiError) -> SyncError {
    SyncError::Data(err.to_string())
}

fn contract_error(err: ContractError<Provider<Http>>) -> SyncError {
    match err {
        ContractError::DecodingError(e) => SyncError::Data(e.to_string()),
        ContractError::AbiError(e) => SyncError::Data(e.to_string()),
        ContractError::DetokenizationError(e) => SyncError::Data(e.to_string()),
        other => SyncError::Net(other.to_string()),
    }
}

#[async_trait]
impl OracleChainReader for BlockchainClient {
    async fn pending_anchor(&self, oracle: Address, asset: Address) -> SyncResult<U256> {
        let (period, price_mantissa): (U256, U256) = self
            .oracle_contract(oracle)
            .method("anchors", asset)
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)?;

        debug!("⚓ anchors({:?}) = period {}, mantissa {}", asset, period, price_mantissa);
        Ok(price_mantissa)
    }

    async fn asset_price(&self, oracle: Address, asset: Address) -> SyncResult<U256> {
        self.oracle_contract(oracle)
            .method("assetPrices", asset)
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)
    }

    async fn poster(&self, oracle: Address) -> SyncResult<Address> {
        self.oracle_contract(oracle)
            .method("poster", ())
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)
    }

    async fn anchor_admin(&self, oracle: Address) -> SyncResult<Address> {
        self.oracle_contract(oracle)
            .method("anchorAdmin", ())
            .map_err(abi_error)?
            .call()
            .await
            .map_err(contract_error)
    }

    async fn block_number(&self) -> SyncResult<u64> {
        let block = self.http_provider.get_block_number().await.map_err(provider_error)?;
        Ok(block.as_u64())
    }
}

#[async_trait]
impl TransactionSender for BlockchainClient {
    fn signer_address(&self) -> Address {
        self.wallet.as_ref().map(|w| w.address()).unwrap_or_default()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn transaction_count(&self, account: Address) -> SyncResult<U256> {
        self.http_provider
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(provider_error)
    }

    async fn gas_price(&self) -> SyncResult<U256> {
        self.http_provider.get_gas_price().await.map_err(provider_error)
    }

    async fn balance(&self, account: Address) -> SyncResult<U256> {
        self.http_provider.get_balance(account, None).await.map_err(provider_error)
    }

    async fn sign_transaction(&self, tx: TypedTransaction) -> SyncResult<Bytes> {
        let wallet = self.wallet()?;
        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| SyncError::Sync(format!("트랜잭션 서명 실패: {}", e)))?;

        Ok(tx.rlp_signed(&signature))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SyncResult<H256> {
        let pending = self
            .http_provider
            .send_raw_transaction(raw)
            .await
            .map_err(provider_error)?;

        let tx_hash = pending.tx_hash();
        info!("📤 트랜잭션 브로드캐스트: {:?}", tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> SyncResult<Option<TransactionReceipt>> {
        PendingTransaction::new(tx_hash, self.http_provider.as_ref())
            .confirmations(confirmations)
            .await
            .map_err(provider_error)
    }
}
