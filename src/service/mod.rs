pub mod blockchain_client;
pub mod custody;
pub mod gas_estimator;
pub mod transaction_builder;
pub mod tx;
pub mod wallets;

pub use blockchain_client::{RpcDispatcher, TokenBalance, TokenBalanceEntry, TransactionReceipt};
pub use custody::CustodyService;
pub use gas_estimator::FeeSuggestion;
pub use tx::SentTransaction;
pub use wallets::{CreatedWallet, ExportedSecret, ImportedWallet, UnsealedAccount, WalletSummary};
