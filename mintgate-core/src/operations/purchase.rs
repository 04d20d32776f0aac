use super::run_blocking;
use crate::{Clock, LedgerStore, PurchaseRecord, Result, TxnDecision, truncate_to_millis};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use ulid::Ulid;

/// Accepts or rejects purchases against a sale's window and caps.
///
/// Every check that depends on shared state runs inside the same write
/// transaction as the ledger insert, so two racing purchases can never both
/// commit past a cap.
#[derive(Clone)]
pub struct PurchaseOperation {
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct PurchaseOperationRequest {
    pub contract_address: String,
    pub buyer_address: String,
    /// Signed so that non-positive input is rejected here as `Invalid`
    pub amount: i64,
    /// Roll back instead of committing once this instant has passed
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOperationResult {
    /// Buyer's cumulative amount including this purchase
    pub consumed: u64,
    pub total_sold: u64,
    pub record: PurchaseRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOperationOutcome {
    Accepted(PurchaseOperationResult),
    Invalid(String),
    SaleNotFound,
    NotActive {
        now: DateTime<Utc>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    ExceedsPerAddressLimit {
        consumed: u64,
        requested: u64,
        max: u64,
    },
    ExceedsGlobalCap {
        total_sold: u64,
        requested: u64,
        cap: u64,
    },
}

impl PurchaseOperationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PurchaseOperationOutcome::Accepted(_))
    }
}

impl PurchaseOperation {
    pub fn new(ledger: Arc<LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    pub async fn run(&self, request: PurchaseOperationRequest) -> Result<PurchaseOperationOutcome> {
        let operation = self.clone();
        run_blocking(move || operation.purchase(request)).await
    }

    pub fn purchase(&self, request: PurchaseOperationRequest) -> Result<PurchaseOperationOutcome> {
        let PurchaseOperationRequest {
            contract_address,
            buyer_address,
            amount,
            deadline,
        } = request;

        if amount <= 0 {
            return Ok(PurchaseOperationOutcome::Invalid(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        // Addresses are stored trimmed at registration
        let contract_address = contract_address.trim().to_string();
        let buyer_address = buyer_address.trim().to_string();
        if buyer_address.is_empty() {
            return Ok(PurchaseOperationOutcome::Invalid(
                "buyer address cannot be empty".to_string(),
            ));
        }
        let amount = amount as u64;

        let outcome = self.ledger.transact(deadline, |txn| {
            let Some(sale) = txn.get_sale(&contract_address)? else {
                return Ok(TxnDecision::Rollback(PurchaseOperationOutcome::SaleNotFound));
            };

            let now = self.clock.now();
            if !sale.is_active_at(now) {
                return Ok(TxnDecision::Rollback(PurchaseOperationOutcome::NotActive {
                    now,
                    start_time: sale.start_time,
                    end_time: sale.end_time,
                }));
            }

            let consumed = txn.consumed_by(&contract_address, &buyer_address)?;
            let new_consumed = match consumed.checked_add(amount) {
                Some(total) if total <= sale.max_amount_per_address => total,
                _ => {
                    return Ok(TxnDecision::Rollback(
                        PurchaseOperationOutcome::ExceedsPerAddressLimit {
                            consumed,
                            requested: amount,
                            max: sale.max_amount_per_address,
                        },
                    ));
                }
            };

            let sold_before = match sale.global_cap {
                Some(cap) => {
                    let total_sold = txn.total_sold(&contract_address)?;
                    match total_sold.checked_add(amount) {
                        Some(total) if total <= cap => Some(total_sold),
                        _ => {
                            return Ok(TxnDecision::Rollback(
                                PurchaseOperationOutcome::ExceedsGlobalCap {
                                    total_sold,
                                    requested: amount,
                                    cap,
                                },
                            ));
                        }
                    }
                }
                None => None,
            };

            let record = PurchaseRecord {
                id: Ulid::new().to_string(),
                contract_address: contract_address.clone(),
                buyer_address: buyer_address.clone(),
                amount,
                price: sale.price,
                timestamp: truncate_to_millis(now),
            };
            txn.insert_purchase(&record)?;

            let total_sold = match sold_before {
                Some(sold) => sold + amount,
                None => txn.total_sold(&contract_address)?,
            };

            Ok(TxnDecision::Commit(PurchaseOperationOutcome::Accepted(
                PurchaseOperationResult {
                    consumed: new_consumed,
                    total_sold,
                    record,
                },
            )))
        })?;

        match &outcome {
            PurchaseOperationOutcome::Accepted(result) => tracing::info!(
                "Purchase {} accepted: sale={} buyer={} amount={} consumed={} total_sold={}",
                result.record.id,
                contract_address,
                buyer_address,
                amount,
                result.consumed,
                result.total_sold
            ),
            rejected => tracing::debug!(
                "Purchase rejected: sale={} buyer={} amount={} outcome={:?}",
                contract_address,
                buyer_address,
                amount,
                rejected
            ),
        }

        Ok(outcome)
    }
}
