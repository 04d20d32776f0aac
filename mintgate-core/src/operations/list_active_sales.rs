use super::run_blocking;
use crate::{ActiveSale, Clock, LedgerStore, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct ListActiveSalesOperation {
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Default)]
pub struct ListActiveSalesOperationRequest {
    /// Evaluate the window at this instant instead of the clock's now
    pub at: Option<DateTime<Utc>>,
}

impl ListActiveSalesOperation {
    pub fn new(ledger: Arc<LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    pub async fn run(&self, request: ListActiveSalesOperationRequest) -> Result<Vec<ActiveSale>> {
        let now = request.at.unwrap_or_else(|| self.clock.now());
        let ledger = self.ledger.clone();
        run_blocking(move || ledger.list_active_sale_views(now)).await
    }
}
