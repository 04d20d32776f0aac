use super::run_blocking;
use crate::{LedgerStore, PurchaseRecord, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_HISTORY_LIMIT: usize = 100;
const MAX_HISTORY_LIMIT: usize = 1_000;

#[derive(Clone)]
pub struct PurchaseHistoryOperation {
    ledger: Arc<LedgerStore>,
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseHistoryOperationRequest {
    pub contract_address: String,
    pub buyer_address: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseHistoryItem {
    #[serde(flatten)]
    pub record: PurchaseRecord,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseHistoryOperationOutcome {
    Found(Vec<PurchaseHistoryItem>),
    SaleNotFound,
}

impl PurchaseHistoryOperation {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn run(
        &self,
        request: PurchaseHistoryOperationRequest,
    ) -> Result<PurchaseHistoryOperationOutcome> {
        let PurchaseHistoryOperationRequest {
            contract_address,
            buyer_address,
            limit,
        } = request;

        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let buyer_address = buyer_address
            .map(|buyer| buyer.trim().to_string())
            .filter(|buyer| !buyer.is_empty());

        let ledger = self.ledger.clone();
        run_blocking(move || {
            if ledger.get_sale(&contract_address)?.is_none() {
                return Ok(PurchaseHistoryOperationOutcome::SaleNotFound);
            }

            let items = ledger
                .list_purchases(&contract_address, buyer_address.as_deref(), limit)?
                .into_iter()
                .map(|record| PurchaseHistoryItem {
                    total_cost: record.total_cost(),
                    record,
                })
                .collect();

            Ok(PurchaseHistoryOperationOutcome::Found(items))
        })
        .await
    }
}
