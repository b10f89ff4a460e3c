use serde::{Deserialize, Serialize};
use std::env;
use anyhow::Result;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::H160;
use tracing::{info, warn};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub ws_url: Option<String>,
    pub block_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// PriceOracle 컨트랙트 주소
    pub contract_address: H160,
    /// setPrices 를 호출할 수 있는 계정
    pub poster_account: H160,
    /// _setPendingAnchor 를 호출할 수 있는 계정
    #[serde(default)]
    pub admin_account: Option<H160>,
    /// 앵커 대비 1 사이클 최대 변동폭 (0.10 = 10%)
    pub max_pending_anchor_swing: f64,
    /// 쓰기 전에 온체인 poster() 와 서명자를 비교할지 여부
    #[serde(default = "default_verify_poster")]
    pub verify_poster: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub min_sources: usize,
    pub fetch_timeout_ms: u64,
    pub confirmation_timeout_secs: u64,
    pub confirmations: usize,
    pub gas_limit: u64,
    pub max_gas_price_gwei: u64,
    /// 가격 계산만 하고 트랜잭션은 보내지 않음
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    // 파일에는 비워두고 환경 변수로 주입
    #[serde(default)]
    pub poster_private_key: String,
    #[serde(default)]
    pub admin_private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// 거래소 이름 (binance, hitbtc, huobi, gateio, bitfinex, bittrex, kucoin)
    pub exchange: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub address: H160,
    pub enabled: bool,
    /// 레지스트리 mantissa 소수 자릿수
    #[serde(default = "default_mantissa_decimals")]
    pub mantissa_decimals: u32,
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub oracle: OracleConfig,
    pub sync: SyncConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    pub monitoring: MonitoringConfig,
    pub assets: Vec<AssetConfig>,
}

fn signer_address(private_key: &str) -> Result<H160> {
    let wallet: LocalWallet = private_key
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid private key: {}", e))?;
    Ok(wallet.address())
}

fn default_verify_poster() -> bool {
    true
}

fn default_mantissa_decimals() -> u32 {
    constants::DEFAULT_MANTISSA_DECIMALS
}

fn endpoints(urls: &[&str]) -> Vec<EndpointConfig> {
    constants::EXCHANGES
        .iter()
        .zip(urls.iter())
        .map(|(exchange, url)| EndpointConfig {
            exchange: exchange.to_string(),
            url: url.to_string(),
        })
        .collect()
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: 1,
                name: "mainnet".to_string(),
                rpc_url: "https://eth-mainnet.alchemyapi.io/v2/YOUR_API_KEY".to_string(),
                ws_url: None,
                block_time: 12,
            },
            oracle: OracleConfig {
                contract_address: H160::zero(),
                poster_account: H160::zero(),
                admin_account: None,
                max_pending_anchor_swing: constants::DEFAULT_MAX_PENDING_ANCHOR_SWING,
                verify_poster: true,
            },
            sync: SyncConfig {
                interval_secs: constants::DEFAULT_SYNC_INTERVAL_SECS,
                min_sources: constants::MIN_SOURCES,
                fetch_timeout_ms: constants::DEFAULT_FETCH_TIMEOUT_MS,
                confirmation_timeout_secs: constants::DEFAULT_CONFIRMATION_TIMEOUT_SECS,
                confirmations: constants::DEFAULT_CONFIRMATIONS,
                gas_limit: constants::DEFAULT_GAS_LIMIT,
                max_gas_price_gwei: constants::MAX_GAS_PRICE_GWEI,
                dry_run: false,
            },
            signer: SignerConfig::default(),
            monitoring: MonitoringConfig {
                log_level: "info".to_string(),
            },
            assets: vec![
                AssetConfig {
                    symbol: "imbtc".to_string(),
                    address: constants::get_asset_address("imbtc").unwrap_or_default(),
                    enabled: true,
                    mantissa_decimals: constants::DEFAULT_MANTISSA_DECIMALS,
                    endpoints: endpoints(&[
                        "https://api.binance.com/api/v3/ticker/price?symbol=ETHBTC",
                        "https://api.hitbtc.com/api/2/public/ticker/ETHBTC?limit=1",
                        "https://api.huobi.pro/market/detail/merged?symbol=ethbtc",
                        "https://data.gateio.life/api2/1/ticker/eth_btc",
                        "https://api-pub.bitfinex.com/v2/tickers/?symbols=tETHBTC",
                        "https://api.bittrex.com/api/v1.1/public/getticker?market=BTC-ETH",
                        "https://api.kucoin.com/api/v1/market/orderbook/level1?symbol=ETH-BTC",
                    ]),
                },
                AssetConfig {
                    symbol: "usdt".to_string(),
                    address: constants::get_asset_address("usdt").unwrap_or_default(),
                    enabled: true,
                    mantissa_decimals: constants::DEFAULT_MANTISSA_DECIMALS,
                    endpoints: endpoints(&[
                        "https://api.binance.com/api/v3/ticker/price?symbol=ETHUSDT",
                        "https://api.hitbtc.com/api/2/public/ticker/ETHUSD?limit=1",
                        "https://api.huobi.pro/market/detail/merged?symbol=ethusdt",
                        "https://data.gateio.life/api2/1/ticker/eth_usdt",
                        "https://api-pub.bitfinex.com/v2/tickers/?symbols=tETHUST",
                        "https://api.bittrex.com/api/v1.1/public/getticker?market=USDT-ETH",
                        "https://api.kucoin.com/api/v1/market/orderbook/level1?symbol=ETH-USDT",
                    ]),
                },
                AssetConfig {
                    symbol: "usdx".to_string(),
                    address: constants::get_asset_address("usdx").unwrap_or_default(),
                    enabled: true,
                    mantissa_decimals: constants::DEFAULT_MANTISSA_DECIMALS,
                    endpoints: endpoints(&[
                        "https://api.binance.com/api/v3/ticker/price?symbol=ETHUSDC",
                        "https://api.hitbtc.com/api/2/public/ticker/ETHUSDC?limit=1",
                        "https://api.huobi.pro/market/detail/merged?symbol=ethhusd",
                        "https://data.gateio.life/api2/1/ticker/eth_usdt",
                        "https://api-pub.bitfinex.com/v2/tickers/?symbols=tETHUSD",
                        "https://api.bittrex.com/api/v1.1/public/getticker?market=USD-ETH",
                        "https://api.kucoin.com/api/v1/market/orderbook/level1?symbol=ETH-USDC",
                    ]),
                },
            ],
        }
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// 환경 변수에서 민감한 정보 및 오버라이드 로드
    pub fn apply_env_overrides(&mut self) {
        if let Ok(private_key) = env::var("POSTER_PRIVATE_KEY") {
            self.signer.poster_private_key = private_key;
            info!("🔑 Poster private key loaded from environment");
        }

        if let Ok(private_key) = env::var("ADMIN_PRIVATE_KEY") {
            self.signer.admin_private_key = Some(private_key);
            info!("🔑 Admin private key loaded from environment");
        }

        if let Ok(rpc_url) = env::var("RPC_URL") {
            self.network.rpc_url = rpc_url;
            info!("🌐 RPC URL loaded from environment");
        }

        if let Ok(oracle) = env::var("ORACLE_ADDRESS") {
            match oracle.parse() {
                Ok(address) => {
                    self.oracle.contract_address = address;
                    info!("📜 Oracle address loaded from environment");
                }
                Err(_) => warn!("⚠️ ORACLE_ADDRESS 파싱 실패: {}", oracle),
            }
        }

        if let Ok(swing) = env::var("MAX_PENDING_ANCHOR_SWING") {
            match swing.parse() {
                Ok(value) => self.oracle.max_pending_anchor_swing = value,
                Err(_) => warn!("⚠️ MAX_PENDING_ANCHOR_SWING 파싱 실패: {}", swing),
            }
        }
    }

    pub fn get_asset(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|asset| asset.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn get_enabled_assets(&self) -> Vec<&AssetConfig> {
        self.assets.iter().filter(|asset| asset.enabled).collect()
    }

    pub fn validate(&self) -> Result<()> {
        // Validate network configuration
        if self.network.rpc_url.is_empty() {
            return Err(anyhow::anyhow!("Network RPC URL cannot be empty"));
        }

        // Validate oracle configuration
        if self.oracle.contract_address.is_zero() {
            return Err(anyhow::anyhow!("Oracle contract address must be configured"));
        }

        let swing = self.oracle.max_pending_anchor_swing;
        if !(swing > 0.0 && swing < 1.0) {
            return Err(anyhow::anyhow!(
                "max_pending_anchor_swing must be in (0, 1), got {}",
                swing
            ));
        }

        // Validate sync thresholds
        if self.sync.min_sources == 0 {
            return Err(anyhow::anyhow!("min_sources must be greater than 0"));
        }

        if self.sync.fetch_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Fetch timeout must be greater than 0"));
        }

        if self.sync.confirmation_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Confirmation timeout must be greater than 0"));
        }

        if self.sync.interval_secs == 0 {
            return Err(anyhow::anyhow!("Sync interval must be greater than 0"));
        }

        // Validate assets
        if self.get_enabled_assets().is_empty() {
            return Err(anyhow::anyhow!("At least one asset must be enabled"));
        }

        for asset in self.get_enabled_assets() {
            if asset.endpoints.is_empty() {
                return Err(anyhow::anyhow!(
                    "Asset {} has no exchange endpoints configured",
                    asset.symbol
                ));
            }
            if asset.endpoints.len() < self.sync.min_sources {
                warn!(
                    "⚠️ {} 엔드포인트 수({})가 최소 소스 수({})보다 적습니다 - 집계가 항상 실패합니다",
                    asset.symbol,
                    asset.endpoints.len(),
                    self.sync.min_sources
                );
            }
        }

        Ok(())
    }

    /// 실제 트랜잭션 전송 전 poster 서명 키 검증
    ///
    /// `oracle.poster_account` 가 설정되어 있으면 키에서 유도한 주소와 일치해야 합니다.
    pub fn validate_signer(&self) -> Result<()> {
        let key = &self.signer.poster_private_key;
        if key.is_empty() || key == "your_private_key_here" {
            return Err(anyhow::anyhow!("Poster private key must be configured"));
        }

        let signer = signer_address(key)?;
        let expected = self.oracle.poster_account;
        if !expected.is_zero() && signer != expected {
            return Err(anyhow::anyhow!(
                "Poster key address {:?} does not match poster_account {:?}",
                signer,
                expected
            ));
        }

        info!("🔑 Poster 서명자 확인: {:?}", signer);
        Ok(())
    }

    /// _setPendingAnchor 전송 전 admin 서명 키 검증, 검증된 키 반환
    pub fn validate_admin_signer(&self) -> Result<&str> {
        let key = self
            .signer
            .admin_private_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("ADMIN_PRIVATE_KEY must be configured"))?;

        let signer = signer_address(key)?;
        if let Some(expected) = self.oracle.admin_account.filter(|a| !a.is_zero()) {
            if signer != expected {
                return Err(anyhow::anyhow!(
                    "Admin key address {:?} does not match admin_account {:?}",
                    signer,
                    expected
                ));
            }
        }

        info!("🔑 Admin 서명자 확인: {:?}", signer);
        Ok(key)
    }

    #[cfg(test)]
    pub fn load_test_config() -> Self {
        let mut config = Self::default();

        config.network.rpc_url = "http://localhost:8545".to_string();
        config.oracle.contract_address = crate::mocks::MOCK_ORACLE_ADDRESS.parse().unwrap();
        config.oracle.poster_account = crate::mocks::MOCK_POSTER_ADDRESS.parse().unwrap();
        config.signer.poster_private_key = crate::mocks::MOCK_POSTER_KEY.to_string();
        config.sync.fetch_timeout_ms = 200;
        config.sync.confirmation_timeout_secs = 2;

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.network.chain_id, 1);
        assert_eq!(config.sync.min_sources, 5);
        assert_eq!(config.oracle.max_pending_anchor_swing, 0.10);

        assert_eq!(config.assets.len(), 3);
        assert!(config.assets.iter().all(|asset| asset.endpoints.len() == 7));
        assert!(config.get_asset("USDT").is_some());
        assert_eq!(config.get_asset("imbtc").unwrap().endpoints[0].exchange, "binance");
        assert_eq!(config.get_asset("imbtc").unwrap().endpoints[6].exchange, "kucoin");
    }

    #[test]
    fn test_config_validation() {
        let config = Config::load_test_config();
        assert!(config.validate().is_ok());

        // Default has no oracle address
        assert!(Config::default().validate().is_err());

        let mut config = Config::load_test_config();
        config.network.rpc_url = "".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::load_test_config();
        config.oracle.max_pending_anchor_swing = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::load_test_config();
        config.oracle.max_pending_anchor_swing = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::load_test_config();
        config.sync.min_sources = 0;
        assert!(config.validate().is_err());

        let mut config = Config::load_test_config();
        config.assets[0].endpoints.clear();
        assert!(config.validate().is_err());

        let mut config = Config::load_test_config();
        for asset in config.assets.iter_mut() {
            asset.enabled = false;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_signer() {
        let mut config = Config::load_test_config();
        assert!(config.validate_signer().is_ok());

        config.signer.poster_private_key = "your_private_key_here".to_string();
        assert!(config.validate_signer().is_err());

        // 키와 poster_account 불일치
        let mut config = Config::load_test_config();
        config.oracle.poster_account = crate::mocks::MOCK_ADMIN_ADDRESS.parse().unwrap();
        assert!(config.validate_signer().is_err());

        // poster_account 미설정이면 키만 검증
        let mut config = Config::load_test_config();
        config.oracle.poster_account = H160::zero();
        assert!(config.validate_signer().is_ok());
    }

    #[test]
    fn test_validate_admin_signer() {
        let mut config = Config::load_test_config();
        assert!(config.validate_admin_signer().is_err());

        config.signer.admin_private_key = Some(crate::mocks::MOCK_ADMIN_KEY.to_string());
        assert_eq!(config.validate_admin_signer().unwrap(), crate::mocks::MOCK_ADMIN_KEY);

        config.oracle.admin_account = Some(crate::mocks::MOCK_ADMIN_ADDRESS.parse().unwrap());
        assert!(config.validate_admin_signer().is_ok());

        config.oracle.admin_account = Some(crate::mocks::MOCK_POSTER_ADDRESS.parse().unwrap());
        assert!(config.validate_admin_signer().is_err());
    }

    #[test]
    fn test_get_enabled_assets() {
        let mut config = Config::default();
        assert_eq!(config.get_enabled_assets().len(), 3);

        config.assets[1].enabled = false;
        let enabled = config.get_enabled_assets();
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|asset| asset.symbol != "usdt"));
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let config = Config::load_test_config();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncer.toml");
        let path = path.to_str().unwrap();

        config.save(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();

        assert_eq!(loaded.network.chain_id, config.network.chain_id);
        assert_eq!(loaded.oracle.contract_address, config.oracle.contract_address);
        assert_eq!(loaded.assets.len(), config.assets.len());
        assert_eq!(loaded.assets[2].endpoints[3].url, config.assets[2].endpoints[3].url);
    }

    #[test]
    fn test_bundled_default_toml() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();

        assert!(config.validate().is_ok());
        assert!(config.signer.poster_private_key.is_empty());
        assert!(config.oracle.verify_poster);

        let defaults = Config::default();
        for (loaded, default) in config.assets.iter().zip(defaults.assets.iter()) {
            assert_eq!(loaded.symbol, default.symbol);
            assert_eq!(loaded.address, default.address);
            assert_eq!(loaded.endpoints.len(), 7);
        }
    }
}
