use ethers::abi::{Abi, Function, Token};
use ethers::types::{Address, Bytes, U256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::types::{SyncError, SyncResult};

/// PriceOracle 인터페이스 (human-readable ABI)
pub const PRICE_ORACLE_SIGNATURES: &[&str] = &[
    "function anchors(address) view returns (uint256 period, uint256 priceMantissa)",
    "function pendingAnchors(address) view returns (uint256)",
    "function assetPrices(address asset) view returns (uint256)",
    "function poster() view returns (address)",
    "function anchorAdmin() view returns (address)",
    "function setPrices(address[] assets, uint256[] requestedPriceMantissas) returns (uint256[])",
    "function _setPendingAnchor(address asset, uint256 newScaledPrice) returns (uint256)",
];

pub static PRICE_ORACLE_ABI: Lazy<Abi> = Lazy::new(|| {
    ethers::abi::parse_abi(PRICE_ORACLE_SIGNATURES).expect("valid PriceOracle ABI")
});

/// 오라클 쓰기 호출
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OracleCall {
    /// setPrices(address[], uint256[]) - poster 계정
    SetPrices { assets: Vec<Address>, mantissas: Vec<U256> },
    /// _setPendingAnchor(address, uint256) - admin 계정
    SetPendingAnchor { asset: Address, mantissa: U256 },
}

impl OracleCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            OracleCall::SetPrices { .. } => "setPrices",
            OracleCall::SetPendingAnchor { .. } => "_setPendingAnchor",
        }
    }

    /// 자산/가격 쌍 (인덱스 순서 유지)
    pub fn entries(&self) -> Vec<(Address, U256)> {
        match self {
            OracleCall::SetPrices { assets, mantissas } => {
                assets.iter().cloned().zip(mantissas.iter().cloned()).collect()
            }
            OracleCall::SetPendingAnchor { asset, mantissa } => vec![(*asset, *mantissa)],
        }
    }

    /// calldata 인코딩
    pub fn encode(&self) -> SyncResult<Bytes> {
        let function = oracle_function(self.function_name())?;

        let tokens = match self {
            OracleCall::SetPrices { assets, mantissas } => {
                if assets.len() != mantissas.len() {
                    return Err(SyncError::Sync(format!(
                        "assets/mantissas length mismatch: {} != {}",
                        assets.len(),
                        mantissas.len()
                    )));
                }
                vec![
                    Token::Array(assets.iter().map(|a| Token::Address(*a)).collect()),
                    Token::Array(mantissas.iter().map(|m| Token::Uint(*m)).collect()),
                ]
            }
            OracleCall::SetPendingAnchor { asset, mantissa } => {
                vec![Token::Address(*asset), Token::Uint(*mantissa)]
            }
        };

        let data = function
            .encode_input(&tokens)
            .map_err(|e| SyncError::Data(format!("{} 인코딩 실패: {}", self.function_name(), e)))?;

        Ok(Bytes::from(data))
    }

    /// calldata 디코딩
    pub fn decode(data: &[u8]) -> SyncResult<Self> {
        if data.len() < 4 {
            return Err(SyncError::Data("calldata too short".to_string()));
        }

        let selector = &data[..4];
        for name in ["setPrices", "_setPendingAnchor"] {
            let function = oracle_function(name)?;
            if function.short_signature() != selector {
                continue;
            }

            let tokens = function
                .decode_input(&data[4..])
                .map_err(|e| SyncError::Data(format!("{} 디코딩 실패: {}", name, e)))?;

            return match (name, tokens.as_slice()) {
                ("setPrices", [Token::Array(assets), Token::Array(mantissas)]) => {
                    Ok(OracleCall::SetPrices {
                        assets: assets.iter().filter_map(|t| t.clone().into_address()).collect(),
                        mantissas: mantissas.iter().filter_map(|t| t.clone().into_uint()).collect(),
                    })
                }
                ("_setPendingAnchor", [Token::Address(asset), Token::Uint(mantissa)]) => {
                    Ok(OracleCall::SetPendingAnchor { asset: *asset, mantissa: *mantissa })
                }
                _ => Err(SyncError::Data(format!("unexpected tokens for {}", name))),
            };
        }

        Err(SyncError::Data(format!("unknown selector 0x{}", hex::encode(selector))))
    }
}

fn oracle_function(name: &str) -> SyncResult<&'static Function> {
    PRICE_ORACLE_ABI
        .function(name)
        .map_err(|e| SyncError::Data(format!("ABI에 {} 함수 없음: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_abi_has_oracle_functions() {
        for name in ["anchors", "assetPrices", "poster", "anchorAdmin", "setPrices", "_setPendingAnchor"] {
            assert!(PRICE_ORACLE_ABI.function(name).is_ok(), "missing {}", name);
        }
    }

    #[test]
    fn test_set_prices_keeps_index_order() {
        let call = OracleCall::SetPrices {
            assets: vec![addr(3), addr(1), addr(2)],
            mantissas: vec![U256::from(300), U256::from(100), U256::from(200)],
        };

        let data = call.encode().unwrap();
        assert_eq!(&data[..4], &PRICE_ORACLE_ABI.function("setPrices").unwrap().short_signature());

        let decoded = OracleCall::decode(&data).unwrap();
        assert_eq!(
            decoded.entries(),
            vec![
                (addr(3), U256::from(300)),
                (addr(1), U256::from(100)),
                (addr(2), U256::from(200)),
            ]
        );
    }

    #[test]
    fn test_set_prices_length_mismatch() {
        let call = OracleCall::SetPrices {
            assets: vec![addr(1), addr(2)],
            mantissas: vec![U256::from(1)],
        };
        assert!(matches!(call.encode(), Err(SyncError::Sync(_))));
    }

    #[test]
    fn test_set_pending_anchor_encoding() {
        let call = OracleCall::SetPendingAnchor { asset: addr(7), mantissa: U256::from(42) };
        let data = call.encode().unwrap();
        assert_eq!(data.len(), 4 + 32 * 2);
        assert_eq!(OracleCall::decode(&data).unwrap(), call);
    }

    #[test]
    fn test_decode_unknown_selector() {
        assert!(OracleCall::decode(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(OracleCall::decode(&[0x01]).is_err());
    }
}
