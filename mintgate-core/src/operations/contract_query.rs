use super::run_blocking;
use crate::{ContractRecord, LedgerStore, MintError, Result, SaleConfig};
use serde::Serialize;
use std::sync::Arc;

/// Contract record with its sale configuration, once one is registered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    #[serde(flatten)]
    pub record: ContractRecord,
    pub sale: Option<SaleConfig>,
}

#[derive(Clone)]
pub struct ContractQueryOperation {
    ledger: Arc<LedgerStore>,
}

impl ContractQueryOperation {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn get_by_address(&self, contract_address: &str) -> Result<Option<ContractView>> {
        let contract_address = contract_address.trim().to_string();
        let ledger = self.ledger.clone();

        run_blocking(move || {
            let Some(record) = ledger.get_contract_by_address(&contract_address)? else {
                return Ok(None);
            };
            let sale = ledger.get_sale(&contract_address)?;
            Ok(Some(ContractView { record, sale }))
        })
        .await
    }

    pub async fn list_by_wallet(&self, wallet_address: &str) -> Result<Vec<ContractRecord>> {
        let wallet_address = wallet_address.trim().to_string();
        if wallet_address.is_empty() {
            return Err(MintError::InvalidRequest(
                "wallet_address is required".to_string(),
            ));
        }

        let ledger = self.ledger.clone();
        run_blocking(move || ledger.list_contracts_by_wallet(&wallet_address)).await
    }
}
