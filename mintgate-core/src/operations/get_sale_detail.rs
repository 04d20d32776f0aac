use super::run_blocking;
use crate::{LedgerStore, Result, SaleDetail};
use std::sync::Arc;

#[derive(Clone)]
pub struct GetSaleDetailOperation {
    ledger: Arc<LedgerStore>,
}

#[derive(Debug, Clone)]
pub struct GetSaleDetailOperationRequest {
    pub contract_address: String,
    /// Empty means "no buyer"; consumption is then reported as zero
    pub buyer_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetSaleDetailOperationOutcome {
    Found(SaleDetail),
    NotFound,
}

impl GetSaleDetailOperation {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn run(
        &self,
        request: GetSaleDetailOperationRequest,
    ) -> Result<GetSaleDetailOperationOutcome> {
        let GetSaleDetailOperationRequest {
            contract_address,
            buyer_address,
        } = request;

        let ledger = self.ledger.clone();
        let detail = run_blocking(move || {
            ledger.sale_detail(contract_address.trim(), buyer_address.trim())
        })
        .await?;

        Ok(match detail {
            Some(detail) => GetSaleDetailOperationOutcome::Found(detail),
            None => GetSaleDetailOperationOutcome::NotFound,
        })
    }
}
