use super::run_blocking;
use crate::{
    Clock, LedgerStore, MintError, Result, SaleConfig, TokenInfo, TxnDecision, truncate_to_millis,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Longest allowed sale window: 7 days
pub const DEFAULT_MAX_SALE_DURATION_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct SalePolicy {
    pub max_sale_duration: Duration,
}

impl Default for SalePolicy {
    fn default() -> Self {
        Self {
            max_sale_duration: Duration::seconds(DEFAULT_MAX_SALE_DURATION_SECS),
        }
    }
}

#[derive(Clone)]
pub struct RegisterSaleOperation {
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    policy: SalePolicy,
}

/// `global_cap` and `mint_percentage` are mutually exclusive; a percentage is
/// converted to an explicit cap against `token.total_supply` at registration.
#[derive(Debug, Clone)]
pub struct RegisterSaleOperationRequest {
    pub contract_address: String,
    pub price: Decimal,
    pub min_amount_per_address: u64,
    pub max_amount_per_address: u64,
    pub global_cap: Option<u64>,
    pub mint_percentage: Option<u8>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub token: TokenInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterSaleOperationOutcome {
    Registered(SaleConfig),
    DuplicateAddress,
    InvalidWindow(String),
    InvalidAmounts(String),
}

impl RegisterSaleOperation {
    pub fn new(ledger: Arc<LedgerStore>, clock: Arc<dyn Clock>, policy: SalePolicy) -> Self {
        Self {
            ledger,
            clock,
            policy,
        }
    }

    pub async fn run(
        &self,
        request: RegisterSaleOperationRequest,
    ) -> Result<RegisterSaleOperationOutcome> {
        let operation = self.clone();
        run_blocking(move || operation.register(request)).await
    }

    pub fn register(
        &self,
        request: RegisterSaleOperationRequest,
    ) -> Result<RegisterSaleOperationOutcome> {
        let RegisterSaleOperationRequest {
            contract_address,
            price,
            min_amount_per_address,
            max_amount_per_address,
            global_cap,
            mint_percentage,
            start_time,
            end_time,
            token,
        } = request;

        let contract_address = contract_address.trim().to_string();
        if contract_address.is_empty() {
            return Err(MintError::InvalidRequest(
                "contract address cannot be empty".to_string(),
            ));
        }
        if token.name.trim().is_empty() || token.symbol.trim().is_empty() {
            return Err(MintError::InvalidRequest(
                "token name and symbol are required".to_string(),
            ));
        }

        let start_time = truncate_to_millis(start_time);
        let end_time = truncate_to_millis(end_time);

        if start_time >= end_time {
            return Ok(RegisterSaleOperationOutcome::InvalidWindow(format!(
                "start_time {} must be before end_time {}",
                start_time.to_rfc3339(),
                end_time.to_rfc3339()
            )));
        }
        if end_time - start_time > self.policy.max_sale_duration {
            return Ok(RegisterSaleOperationOutcome::InvalidWindow(format!(
                "sale window exceeds maximum duration of {} seconds",
                self.policy.max_sale_duration.num_seconds()
            )));
        }

        if let Err(reason) =
            validate_amounts(price, min_amount_per_address, max_amount_per_address)
        {
            return Ok(RegisterSaleOperationOutcome::InvalidAmounts(reason));
        }

        if token.total_supply > i64::MAX as u64 {
            return Ok(RegisterSaleOperationOutcome::InvalidAmounts(format!(
                "total_supply {} is out of range",
                token.total_supply
            )));
        }

        let global_cap = match resolve_global_cap(global_cap, mint_percentage, token.total_supply)
        {
            Ok(cap) => cap,
            Err(reason) => return Ok(RegisterSaleOperationOutcome::InvalidAmounts(reason)),
        };

        let sale = SaleConfig {
            contract_address: contract_address.clone(),
            price,
            min_amount_per_address,
            max_amount_per_address,
            global_cap,
            start_time,
            end_time,
            created_at: truncate_to_millis(self.clock.now()),
        };

        let outcome = self.ledger.transact(None, |txn| {
            if txn.sale_exists(&sale.contract_address)? {
                return Ok(TxnDecision::Rollback(
                    RegisterSaleOperationOutcome::DuplicateAddress,
                ));
            }

            txn.insert_sale(&sale, &token)?;
            Ok(TxnDecision::Commit(RegisterSaleOperationOutcome::Registered(
                sale.clone(),
            )))
        })?;

        match &outcome {
            RegisterSaleOperationOutcome::Registered(sale) => tracing::info!(
                "Registered sale {} price={} max_per_address={} global_cap={:?} window={}..{}",
                sale.contract_address,
                sale.price,
                sale.max_amount_per_address,
                sale.global_cap,
                sale.start_time.to_rfc3339(),
                sale.end_time.to_rfc3339()
            ),
            _ => tracing::warn!("Sale {} already registered", contract_address),
        }

        Ok(outcome)
    }

    pub fn get(&self, contract_address: &str) -> Result<Option<SaleConfig>> {
        self.ledger.get_sale(contract_address)
    }

    /// Sales accepting purchases at `now`, newest registration first
    pub fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<SaleConfig>> {
        self.ledger.list_active_sales(now)
    }
}

fn validate_amounts(
    price: Decimal,
    min_amount_per_address: u64,
    max_amount_per_address: u64,
) -> std::result::Result<(), String> {
    if price <= Decimal::ZERO {
        return Err(format!("price must be positive, got {}", price));
    }
    if min_amount_per_address == 0 {
        return Err("min_amount_per_address must be positive".to_string());
    }
    if min_amount_per_address > max_amount_per_address {
        return Err(format!(
            "min_amount_per_address {} exceeds max_amount_per_address {}",
            min_amount_per_address, max_amount_per_address
        ));
    }
    if max_amount_per_address > i64::MAX as u64 {
        return Err("max_amount_per_address is out of range".to_string());
    }
    Ok(())
}

fn resolve_global_cap(
    global_cap: Option<u64>,
    mint_percentage: Option<u8>,
    total_supply: u64,
) -> std::result::Result<Option<u64>, String> {
    match (global_cap, mint_percentage) {
        (Some(_), Some(_)) => {
            Err("global_cap and mint_percentage are mutually exclusive".to_string())
        }
        (Some(0), None) => Err("global_cap must be positive".to_string()),
        (Some(cap), None) if cap > i64::MAX as u64 => {
            Err("global_cap is out of range".to_string())
        }
        (Some(cap), None) => Ok(Some(cap)),
        (None, Some(percentage)) => {
            if percentage == 0 || percentage > 100 {
                return Err(format!(
                    "mint_percentage must be within 1..=100, got {}",
                    percentage
                ));
            }

            let cap = (total_supply as u128 * percentage as u128 / 100) as u64;
            if cap == 0 {
                return Err(format!(
                    "mint_percentage {} of total_supply {} resolves to zero",
                    percentage, total_supply
                ));
            }
            Ok(Some(cap.min(i64::MAX as u64)))
        }
        (None, None) => Ok(None),
    }
}
