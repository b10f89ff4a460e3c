use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::blockchain::{ChainClient, OracleChainReader, TransactionSender};
use crate::config::{AssetConfig, Config};
use crate::exchange::{ExchangeFeed, ExchangeFeedCollector};
use crate::oracle::{
    to_mantissa, AccountLocks, AnchorSwingCapper, OracleReadClient, PriceAggregator,
    PriceUpdateSubmitter, SubmitterSettings,
};
use crate::types::{AggregatedPrice, AnchorPrice, CappedPrice, PriceUpdateTx, SyncError, SyncResult};

/// 자산 하나의 사이클 계산 결과
#[derive(Debug, Clone)]
pub struct AssetPriceReport {
    pub symbol: String,
    pub aggregated: AggregatedPrice,
    /// 레지스트리 스케일로 변환된 중간값
    pub aggregated_mantissa: U256,
    pub anchor: AnchorPrice,
    pub capped: CappedPrice,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub prices: Vec<AssetPriceReport>,
    /// dry-run 이면 None
    pub tx: Option<PriceUpdateTx>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.succeeded()).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub total_cycles: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    /// 마지막 실패의 에러 종류
    pub last_error: Option<String>,
    pub last_tx_hash: Option<H256>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// 온체인 오라클 상태 스냅샷
#[derive(Debug, Clone)]
pub struct OracleStatus {
    pub poster: Address,
    pub anchor_admin: Address,
    pub assets: Vec<AssetOracleState>,
}

#[derive(Debug, Clone)]
pub struct AssetOracleState {
    pub symbol: String,
    pub anchor: AnchorPrice,
    pub price: U256,
}

/// 가격 동기화 오케스트레이터
///
/// 한 사이클: 활성 자산 전체를 동시에 준비(수집+집계 ∥ 앵커 조회 → 스윙 제한)하고
/// 하나의 setPrices 트랜잭션으로 묶어 제출합니다. 어느 자산이든 실패하면 쓰기 전에 사이클 전체를 중단합니다.
pub struct PriceSyncer {
    config: Arc<Config>,
    collector: ExchangeFeedCollector,
    aggregator: PriceAggregator,
    reader: OracleReadClient,
    capper: AnchorSwingCapper,
    submitter: PriceUpdateSubmitter,
    stats: Arc<RwLock<SyncStats>>,
    is_running: Arc<AtomicBool>,
}

impl PriceSyncer {
    pub fn new<C: ChainClient + 'static>(
        config: Arc<Config>,
        feed: Arc<dyn ExchangeFeed>,
        chain: Arc<C>,
        locks: Arc<AccountLocks>,
    ) -> SyncResult<Self> {
        let reader: Arc<dyn OracleChainReader> = chain.clone();
        let sender: Arc<dyn TransactionSender> = chain;
        Self::from_parts(config, feed, reader, sender, locks)
    }

    pub fn from_parts(
        config: Arc<Config>,
        feed: Arc<dyn ExchangeFeed>,
        reader: Arc<dyn OracleChainReader>,
        sender: Arc<dyn TransactionSender>,
        locks: Arc<AccountLocks>,
    ) -> SyncResult<Self> {
        info!("🔧 PriceSyncer 초기화 중...");

        let collector = ExchangeFeedCollector::new(
            feed,
            Duration::from_millis(config.sync.fetch_timeout_ms),
        );
        let aggregator = PriceAggregator::new(config.sync.min_sources);
        let reader = OracleReadClient::new(reader, config.oracle.contract_address);
        let capper = AnchorSwingCapper::new(config.oracle.max_pending_anchor_swing)?;
        let submitter = PriceUpdateSubmitter::new(
            sender,
            reader.clone(),
            SubmitterSettings::from_config(&config.sync, &config.oracle),
            locks,
        );

        info!(
            "✅ PriceSyncer 초기화 완료 (자산 {}개, 최소 소스 {}, 스윙 {})",
            config.get_enabled_assets().len(),
            aggregator.min_sources(),
            capper.max_swing()
        );

        Ok(Self {
            config,
            collector,
            aggregator,
            reader,
            capper,
            submitter,
            stats: Arc::new(RwLock::new(SyncStats::default())),
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub async fn get_stats(&self) -> SyncStats {
        self.stats.read().await.clone()
    }

    /// 주기 실행. 취소는 사이클 사이에서만 확인하므로 진행 중인 제출은 끝까지 수행됨
    pub async fn run(&self, shutdown: CancellationToken) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("⚠️ PriceSyncer가 이미 실행 중입니다");
            return;
        }

        let period = Duration::from_secs(self.config.sync.interval_secs);
        info!("🚀 가격 동기화 루프 시작 (주기 {}s)", period.as_secs());

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // 결과 로깅과 통계는 run_cycle 내부에서 처리
            let _ = self.run_cycle().await;
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("🛑 가격 동기화 루프 종료");
    }

    /// 사이클 1회 실행
    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let start = Instant::now();
        info!("🔄 사이클 시작 [{}]", cycle_id);

        let result = self.execute_cycle(cycle_id).await;

        let mut stats = self.stats.write().await;
        stats.total_cycles += 1;
        stats.last_cycle_at = Some(Utc::now());

        match &result {
            Ok(report) => {
                if let Some(tx) = &report.tx {
                    stats.last_tx_hash = tx.hash;
                }

                if report.succeeded() {
                    stats.successful_cycles += 1;
                    info!(
                        "✅ 사이클 완료 [{}] - {}개 자산, {}ms",
                        cycle_id,
                        report.prices.len(),
                        start.elapsed().as_millis()
                    );
                } else {
                    stats.failed_cycles += 1;
                    stats.last_error = Some("TX_NOT_CONFIRMED".to_string());
                    warn!(
                        "⚠️ 사이클 [{}] 트랜잭션 실패: {:?}",
                        cycle_id,
                        report.tx.as_ref().map(|tx| tx.status)
                    );
                }
            }
            Err(e) => {
                stats.failed_cycles += 1;
                stats.last_error = Some(e.kind().to_string());
                error!("❌ 사이클 실패 [{}] {}({}): {}", cycle_id, e.kind(), e.code(), e);
            }
        }

        result
    }

    async fn execute_cycle(&self, cycle_id: Uuid) -> SyncResult<CycleReport> {
        let started_at = Utc::now();
        let assets = self.config.get_enabled_assets();
        if assets.is_empty() {
            return Err(SyncError::Sync("no enabled assets".to_string()));
        }

        // 하나라도 실패하면 나머지 준비를 중단하고 쓰기 없이 종료
        let prices = try_join_all(assets.into_iter().map(|asset| self.prepare_asset(asset))).await?;

        if self.config.sync.dry_run {
            for report in &prices {
                info!(
                    "🧪 [dry-run] {} → {} (anchor {}, capped: {})",
                    report.symbol, report.capped.mantissa, report.anchor.mantissa, report.capped.capped
                );
            }
            return Ok(CycleReport {
                cycle_id,
                started_at,
                prices,
                tx: None,
            });
        }

        let batch: Vec<CappedPrice> = prices.iter().map(|p| p.capped.clone()).collect();
        let tx = self.submitter.submit_prices(&batch).await?;

        Ok(CycleReport {
            cycle_id,
            started_at,
            prices,
            tx: Some(tx),
        })
    }

    /// 수집+집계와 앵커 조회를 동시에 수행 후 스윙 제한 적용
    async fn prepare_asset(&self, asset: &AssetConfig) -> SyncResult<AssetPriceReport> {
        let (aggregated, anchor) = tokio::join!(
            async {
                let quotes = self.collector.collect(asset).await;
                self.aggregator.aggregate(&asset.symbol, &quotes)
            },
            self.reader.get_pending_anchor(asset.address)
        );

        let aggregated = aggregated?;
        let anchor = anchor?;

        let aggregated_mantissa = to_mantissa(aggregated.median, asset.mantissa_decimals)?;
        let capped = self.capper.cap(&anchor, aggregated_mantissa)?;

        debug!(
            "{}: median {} → mantissa {} → capped {}",
            asset.symbol, aggregated.median, aggregated_mantissa, capped.mantissa
        );

        Ok(AssetPriceReport {
            symbol: asset.symbol.clone(),
            aggregated,
            aggregated_mantissa,
            anchor,
            capped,
        })
    }

    /// 설정된 자산 전체의 온체인 상태 조회
    pub async fn oracle_status(&self) -> SyncResult<OracleStatus> {
        let (poster, anchor_admin) =
            tokio::try_join!(self.reader.get_poster(), self.reader.get_anchor_admin())?;

        let assets = try_join_all(self.config.assets.iter().map(|asset| async move {
            let (anchor, price) = tokio::try_join!(
                self.reader.get_pending_anchor(asset.address),
                self.reader.get_price(asset.address)
            )?;
            Ok::<_, SyncError>(AssetOracleState {
                symbol: asset.symbol.clone(),
                anchor,
                price,
            })
        }))
        .await?;

        Ok(OracleStatus {
            poster,
            anchor_admin,
            assets,
        })
    }
}
