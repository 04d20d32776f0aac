//! Storage modules for Mintgate
//!
//! SQLite-backed ledger holding sale configurations, token metadata, the
//! append-only purchase ledger and contract deployment records.

pub mod ledger_store;

pub use ledger_store::{
    ActiveSale, ContractRecord, ContractStatus, LedgerOptions, LedgerStore, LedgerTxn,
    PurchaseRecord, SaleConfig, SaleDetail, TokenInfo, TxnDecision, truncate_to_millis,
};
