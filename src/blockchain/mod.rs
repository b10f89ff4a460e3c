pub mod rpc;
pub mod abi;
pub mod traits;

pub use rpc::BlockchainClient;
pub use abi::{OracleCall, PRICE_ORACLE_ABI};
pub use traits::{ChainClient, OracleChainReader, TransactionSender};
