use std::sync::Arc;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, TransactionReceipt, TransactionRequest, U256,
};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use super::account_locks::AccountLocks;
use super::reader::OracleReadClient;
use crate::blockchain::{OracleCall, TransactionSender};
use crate::config::{OracleConfig, SyncConfig};
use crate::types::{CappedPrice, PriceUpdateTx, SyncError, SyncResult, TxReceiptSummary, TxStatus};

/// 제출기 동작 파라미터
#[derive(Debug, Clone)]
pub struct SubmitterSettings {
    pub gas_limit: u64,
    pub max_gas_price_gwei: u64,
    pub confirmations: usize,
    pub confirmation_timeout: Duration,
    /// 전송 전 poster()/anchorAdmin() 와 서명자 일치 확인
    pub verify_signer_role: bool,
}

impl SubmitterSettings {
    pub fn from_config(sync: &SyncConfig, oracle: &OracleConfig) -> Self {
        Self {
            gas_limit: sync.gas_limit,
            max_gas_price_gwei: sync.max_gas_price_gwei,
            confirmations: sync.confirmations,
            confirmation_timeout: Duration::from_secs(sync.confirmation_timeout_secs),
            verify_signer_role: oracle.verify_poster,
        }
    }

    fn max_gas_price(&self) -> U256 {
        U256::from(self.max_gas_price_gwei) * U256::exp10(9)
    }
}

/// 쓰기 호출별 권한 계정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteRole {
    Poster,
    Admin,
}

/// 가격 업데이트 트랜잭션 제출기
///
/// 1. 서명자 권한 확인 (poster / anchorAdmin)
/// 2. 계정 잠금 → nonce 조회 → 가스/잔고 확인 → 서명 → 브로드캐스트 → 잠금 해제
/// 3. 확인 대기 (타임아웃 시 Failed, 재전송 없음)
pub struct PriceUpdateSubmitter {
    sender: Arc<dyn TransactionSender>,
    reader: OracleReadClient,
    settings: SubmitterSettings,
    locks: Arc<AccountLocks>,
}

impl PriceUpdateSubmitter {
    pub fn new(
        sender: Arc<dyn TransactionSender>,
        reader: OracleReadClient,
        settings: SubmitterSettings,
        locks: Arc<AccountLocks>,
    ) -> Self {
        Self {
            sender,
            reader,
            settings,
            locks,
        }
    }

    pub fn signer_address(&self) -> Address {
        self.sender.signer_address()
    }

    /// setPrices 배치 제출 (poster 계정)
    pub async fn submit_prices(&self, prices: &[CappedPrice]) -> SyncResult<PriceUpdateTx> {
        if prices.is_empty() {
            return Err(SyncError::Sync("empty price batch".to_string()));
        }

        let call = OracleCall::SetPrices {
            assets: prices.iter().map(|p| p.asset).collect(),
            mantissas: prices.iter().map(|p| p.mantissa).collect(),
        };

        self.submit_call(call, WriteRole::Poster).await
    }

    /// _setPendingAnchor 제출 (anchorAdmin 계정)
    pub async fn set_pending_anchor(&self, asset: Address, mantissa: U256) -> SyncResult<PriceUpdateTx> {
        if mantissa.is_zero() {
            return Err(SyncError::Sync("pending anchor must be non-zero".to_string()));
        }

        let call = OracleCall::SetPendingAnchor { asset, mantissa };
        self.submit_call(call, WriteRole::Admin).await
    }

    async fn submit_call(&self, call: OracleCall, role: WriteRole) -> SyncResult<PriceUpdateTx> {
        let signer = self.sender.signer_address();

        if self.settings.verify_signer_role {
            self.verify_role(role, signer).await?;
        }

        let data = call.encode()?;
        let (assets, mantissas): (Vec<Address>, Vec<U256>) = call.entries().into_iter().unzip();

        // nonce 조회부터 브로드캐스트까지 계정 단위로 직렬화
        let (nonce, raw, tx_hash) = {
            let _guard = self.locks.acquire(signer).await;

            let nonce = self.sender.transaction_count(signer).await?;
            let gas_price = self.effective_gas_price().await?;

            let required = U256::from(self.settings.gas_limit) * gas_price;
            let balance = self.sender.balance(signer).await?;
            if balance < required {
                error!("💸 잔고 부족: {} < {} ({:?})", balance, required, signer);
                return Err(SyncError::InsufficientBalance { balance, required });
            }

            let tx: TypedTransaction = TransactionRequest::new()
                .from(signer)
                .to(self.reader.oracle_address())
                .data(data)
                .nonce(nonce)
                .gas(self.settings.gas_limit)
                .gas_price(gas_price)
                .chain_id(self.sender.chain_id())
                .into();

            let raw = self.sender.sign_transaction(tx).await?;
            let tx_hash = self.sender.send_raw_transaction(raw.clone()).await?;

            (nonce, raw, tx_hash)
        };

        info!(
            "📤 {} 전송: {:?} (nonce {}, {}개 자산)",
            call.function_name(),
            tx_hash,
            nonce,
            assets.len()
        );

        let mut tx = PriceUpdateTx {
            assets,
            mantissas,
            nonce,
            signature: raw,
            hash: Some(tx_hash),
            status: TxStatus::Pending,
            receipt: None,
        };

        let waited = timeout(
            self.settings.confirmation_timeout,
            self.sender.wait_for_receipt(tx_hash, self.settings.confirmations),
        )
        .await;

        match waited {
            Ok(Ok(Some(receipt))) => {
                let summary = summarize_receipt(&receipt);
                if summary.success {
                    info!("✅ {:?} 확인 완료 (block {})", tx_hash, summary.block_number);
                } else {
                    warn!("⚠️ {:?} revert (block {})", tx_hash, summary.block_number);
                }
                tx.status = TxStatus::Confirmed;
                tx.receipt = Some(summary);
            }
            Ok(Ok(None)) => {
                warn!("⚠️ {:?} 멤풀에서 사라짐 - 재전송하지 않음", tx_hash);
                tx.status = TxStatus::Failed;
            }
            Ok(Err(e)) => {
                error!("❌ {:?} 영수증 조회 실패: {}", tx_hash, e);
                return Err(e);
            }
            Err(_) => {
                warn!(
                    "⏰ {:?} 확인 타임아웃 ({}s) - 재전송하지 않음",
                    tx_hash,
                    self.settings.confirmation_timeout.as_secs()
                );
                tx.status = TxStatus::Failed;
            }
        }

        Ok(tx)
    }

    async fn verify_role(&self, role: WriteRole, signer: Address) -> SyncResult<()> {
        let expected = match role {
            WriteRole::Poster => self.reader.get_poster().await?,
            WriteRole::Admin => self.reader.get_anchor_admin().await?,
        };

        if expected != signer {
            error!("🔐 {:?} 권한 불일치: oracle {:?}, signer {:?}", role, expected, signer);
            return Err(SyncError::PosterMismatch { expected, signer });
        }

        Ok(())
    }

    /// min(노드 가스 가격, 설정 상한)
    async fn effective_gas_price(&self) -> SyncResult<U256> {
        let node_price = self.sender.gas_price().await?;
        let cap = self.settings.max_gas_price();

        if node_price > cap {
            warn!("⛽ 가스 가격 상한 적용: {} → {}", node_price, cap);
            return Ok(cap);
        }

        Ok(node_price)
    }
}

fn summarize_receipt(receipt: &TransactionReceipt) -> TxReceiptSummary {
    TxReceiptSummary {
        success: receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false),
        block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
        gas_used: receipt.gas_used.unwrap_or_default(),
    }
}
