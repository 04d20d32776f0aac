pub mod contract_query;
pub mod deploy_contract;
pub mod get_sale_detail;
pub mod list_active_sales;
pub mod purchase;
pub mod purchase_history;
pub mod register_sale;

pub use contract_query::{ContractQueryOperation, ContractView};
pub use deploy_contract::{DeployContractOperation, DeployContractOperationRequest};
pub use get_sale_detail::{
    GetSaleDetailOperation, GetSaleDetailOperationOutcome, GetSaleDetailOperationRequest,
};
pub use list_active_sales::{ListActiveSalesOperation, ListActiveSalesOperationRequest};
pub use purchase::{
    PurchaseOperation, PurchaseOperationOutcome, PurchaseOperationRequest,
    PurchaseOperationResult,
};
pub use purchase_history::{
    PurchaseHistoryItem, PurchaseHistoryOperation, PurchaseHistoryOperationOutcome,
    PurchaseHistoryOperationRequest,
};
pub use register_sale::{
    DEFAULT_MAX_SALE_DURATION_SECS, RegisterSaleOperation, RegisterSaleOperationOutcome,
    RegisterSaleOperationRequest, SalePolicy,
};

use crate::{MintError, Result};

/// Run store work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|error| MintError::Internal(format!("blocking task failed: {}", error)))?
}
