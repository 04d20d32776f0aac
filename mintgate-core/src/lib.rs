//! Mintgate Core - accounting and limit enforcement for time-boxed token sales
//!
//! - Sale registry with window and amount validation
//! - Purchase coordinator enforcing per-address and global caps inside one
//!   serializable SQLite transaction
//! - Append-only purchase ledger; aggregates are always recomputed from it
//! - Read-only query projections and a contract deployment workflow

pub mod chain;
pub mod clock;
pub mod error;
pub mod operations;
pub mod storage;

pub use chain::{
    ChainSubmitter, ChainSubmitterBuilder, DeployReceipt, DryRunChainSubmitter,
    HttpChainSubmitter, ProgramArtifact, compute_hash,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{MintError, Result};
pub use operations::*;
pub use storage::{
    ActiveSale, ContractRecord, ContractStatus, LedgerOptions, LedgerStore, LedgerTxn,
    PurchaseRecord, SaleConfig, SaleDetail, TokenInfo, TxnDecision, truncate_to_millis,
};
