use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use ethers::types::U256;
use rust_decimal::Decimal;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anchor_price_syncer::blockchain::{BlockchainClient, ChainClient, TransactionSender};
use anchor_price_syncer::config::Config;
use anchor_price_syncer::core::PriceSyncer;
use anchor_price_syncer::exchange::{ExchangeFeed, HttpExchangeFeed};
use anchor_price_syncer::mocks::{
    is_mock_mode, MockChainClient, MockExchangeFeed, MOCK_ADMIN_KEY, MOCK_ORACLE_ADDRESS,
};
use anchor_price_syncer::oracle::{
    to_mantissa, AccountLocks, OracleReadClient, PriceUpdateSubmitter, SubmitterSettings,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("anchor-price-syncer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("⚓ 다중 거래소 가격 → 앵커 스윙 제한 → 온체인 오라클 동기화")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로")
                .default_value("config/default.toml")
                .global(true)
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)")
                .default_value("info")
                .global(true)
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("사이클 1회만 실행하고 종료")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("가격 계산만 하고 트랜잭션은 제출하지 않음")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .help("인메모리 mock 거래소/체인 사용 (API_MODE=mock 과 동일)")
                .action(clap::ArgAction::SetTrue)
                .global(true)
        )
        .subcommand(Command::new("status").about("자산별 앵커/현재 가격과 poster 조회"))
        .subcommand(
            Command::new("set-anchor")
                .about("_setPendingAnchor 제출 (anchorAdmin 계정)")
                .arg(
                    Arg::new("asset")
                        .long("asset")
                        .value_name("SYMBOL")
                        .required(true)
                )
                .arg(
                    Arg::new("mantissa")
                        .long("mantissa")
                        .value_name("N")
                        .help("레지스트리 스케일의 정수 가격")
                        .required(true)
                )
        )
        .get_matches();

    dotenvy::dotenv().ok();

    // 로그 레벨 설정
    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    let log_filter = match log_level {
        "trace" | "debug" | "info" | "warn" | "error" => log_level,
        _ => "info",
    };

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mock = matches.get_flag("mock") || is_mock_mode();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config/default.toml");
    let mut config = load_config(config_path, mock).await?;

    config.apply_env_overrides();

    if matches.get_flag("dry-run") {
        warn!("🧪 dry-run 모드 - 트랜잭션을 제출하지 않습니다");
        config.sync.dry_run = true;
    }

    if mock {
        info!("🎭 Mock 모드 활성화");
        if config.oracle.contract_address.is_zero() {
            config.oracle.contract_address = MOCK_ORACLE_ADDRESS.parse()?;
        }
    }

    if let Err(e) = config.validate() {
        error!("❌ 설정 검증 실패: {}", e);
        std::process::exit(1);
    }

    info!("✅ 설정 로드 완료");
    let config = Arc::new(config);

    match matches.subcommand() {
        Some(("status", _)) => {
            if mock {
                let chain = Arc::new(mock_chain(&config)?);
                let feed = Arc::new(mock_feed(&config));
                print_status(config, feed, chain).await
            } else {
                let chain = Arc::new(connect(&config, None).await?);
                let feed = Arc::new(http_feed(&config)?);
                print_status(config, feed, chain).await
            }
        }
        Some(("set-anchor", args)) => set_anchor(config, args, mock).await,
        _ => {
            let once = matches.get_flag("once");
            if mock {
                let chain = Arc::new(mock_chain(&config)?);
                let feed = Arc::new(mock_feed(&config));
                run_syncer(config, feed, chain, once).await
            } else {
                let key = if config.sync.dry_run {
                    None
                } else {
                    config.validate_signer()?;
                    Some(config.signer.poster_private_key.as_str())
                };
                let chain = Arc::new(connect(&config, key).await?);
                let feed = Arc::new(http_feed(&config)?);
                run_syncer(config, feed, chain, once).await
            }
        }
    }
}

async fn load_config(path: &str, mock: bool) -> Result<Config> {
    info!("📋 설정 파일 로드 중: {}", path);

    if !Path::new(path).exists() && mock {
        warn!("⚠️ 설정 파일 없음 - mock 모드 기본 설정 사용");
        return Ok(Config::default());
    }

    Config::load(path)
        .await
        .with_context(|| format!("설정 파일 로드 실패: {}", path))
}

async fn connect(config: &Config, private_key: Option<&str>) -> Result<BlockchainClient> {
    let client = BlockchainClient::new_with_wallet(&config.network.rpc_url, private_key).await?;

    if client.chain_id() != config.network.chain_id {
        warn!(
            "⚠️ 체인 ID 불일치: 설정 {}, 노드 {}",
            config.network.chain_id,
            client.chain_id()
        );
    }

    Ok(client)
}

fn http_feed(config: &Config) -> Result<HttpExchangeFeed> {
    HttpExchangeFeed::new(Duration::from_millis(config.sync.fetch_timeout_ms))
}

fn mock_chain(config: &Config) -> Result<MockChainClient> {
    let chain = MockChainClient::new();
    for asset in &config.assets {
        chain.set_anchor(asset.address, to_mantissa(Decimal::ONE, asset.mantissa_decimals)?);
    }
    Ok(chain)
}

fn mock_feed(config: &Config) -> MockExchangeFeed {
    let feed = MockExchangeFeed::new();
    for asset in &config.assets {
        feed.set_base_price(&asset.symbol, Decimal::ONE);
    }
    feed
}

async fn run_syncer<C: ChainClient + 'static>(
    config: Arc<Config>,
    feed: Arc<dyn ExchangeFeed>,
    chain: Arc<C>,
    once: bool,
) -> Result<()> {
    let syncer = Arc::new(PriceSyncer::new(
        Arc::clone(&config),
        feed,
        chain,
        Arc::new(AccountLocks::new()),
    )?);

    if once {
        let report = syncer.run_cycle().await?;
        for price in &report.prices {
            info!(
                "  {} median {} → {} (anchor {}, capped: {})",
                price.symbol,
                price.aggregated.median,
                price.capped.mantissa,
                price.anchor.mantissa,
                price.capped.capped
            );
        }
        if let Some(tx) = &report.tx {
            info!("  tx {:?} nonce {} - {}", tx.hash, tx.nonce, tx.status);
        }
        return Ok(());
    }

    // 신호 처리 설정
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("🛑 종료 신호 수신됨, 진행 중인 사이클 이후 종료합니다...");
                    shutdown.cancel();
                }
                Err(err) => {
                    error!("❌ 신호 처리 오류: {}", err);
                }
            }
        });
    }

    syncer.run(shutdown).await;

    let stats = syncer.get_stats().await;
    info!("📊 동기화 통계:");
    info!("  🔄 전체 사이클: {}", stats.total_cycles);
    info!("  ✅ 성공: {}", stats.successful_cycles);
    info!("  ❌ 실패: {}", stats.failed_cycles);
    if let Some(kind) = &stats.last_error {
        info!("  ⚠️ 마지막 에러: {}", kind);
    }

    info!("✅ 안전하게 종료되었습니다.");
    Ok(())
}

async fn print_status<C: ChainClient + 'static>(
    config: Arc<Config>,
    feed: Arc<dyn ExchangeFeed>,
    chain: Arc<C>,
) -> Result<()> {
    let syncer = PriceSyncer::new(
        Arc::clone(&config),
        feed,
        chain,
        Arc::new(AccountLocks::new()),
    )?;

    let status = syncer.oracle_status().await?;
    println!("oracle       {:?}", config.oracle.contract_address);
    println!("poster       {:?}", status.poster);
    println!("anchorAdmin  {:?}", status.anchor_admin);
    for asset in status.assets {
        println!(
            "{:<8} anchor {} (block {})  price {}",
            asset.symbol, asset.anchor.mantissa, asset.anchor.as_of, asset.price
        );
    }

    Ok(())
}

async fn set_anchor(config: Arc<Config>, args: &ArgMatches, mock: bool) -> Result<()> {
    let symbol = args
        .get_one::<String>("asset")
        .ok_or_else(|| anyhow!("--asset is required"))?;
    let asset = config
        .get_asset(symbol)
        .ok_or_else(|| anyhow!("unknown asset: {}", symbol))?;
    let mantissa = args
        .get_one::<String>("mantissa")
        .ok_or_else(|| anyhow!("--mantissa is required"))?;
    let mantissa = U256::from_dec_str(mantissa)
        .map_err(|e| anyhow!("invalid mantissa {}: {}", mantissa, e))?;

    let tx = if mock {
        let chain = Arc::new(MockChainClient::with_signer(MOCK_ADMIN_KEY)?);
        admin_submitter(&config, chain)
            .set_pending_anchor(asset.address, mantissa)
            .await?
    } else {
        let key = config.validate_admin_signer()?;
        let chain = Arc::new(connect(&config, Some(key)).await?);
        admin_submitter(&config, chain)
            .set_pending_anchor(asset.address, mantissa)
            .await?
    };

    info!(
        "⚓ {} pending anchor {} → tx {:?} ({})",
        asset.symbol, mantissa, tx.hash, tx.status
    );
    Ok(())
}

fn admin_submitter<C: ChainClient + 'static>(config: &Config, chain: Arc<C>) -> PriceUpdateSubmitter {
    let reader = OracleReadClient::new(chain.clone(), config.oracle.contract_address);
    PriceUpdateSubmitter::new(
        chain,
        reader,
        SubmitterSettings::from_config(&config.sync, &config.oracle),
        Arc::new(AccountLocks::new()),
    )
}
