use super::run_blocking;
use crate::{
    ChainSubmitter, Clock, ContractRecord, ContractStatus, LedgerStore, MintError,
    ProgramArtifact, Result, truncate_to_millis,
};
use std::sync::Arc;
use ulid::Ulid;

/// Deploys the sale program once per request and keeps a record of every
/// attempt, successful or not.
#[derive(Clone)]
pub struct DeployContractOperation {
    ledger: Arc<LedgerStore>,
    submitter: Arc<dyn ChainSubmitter>,
    artifact: Arc<ProgramArtifact>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct DeployContractOperationRequest {
    pub wallet_address: String,
}

impl DeployContractOperation {
    pub fn new(
        ledger: Arc<LedgerStore>,
        submitter: Arc<dyn ChainSubmitter>,
        artifact: Arc<ProgramArtifact>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            submitter,
            artifact,
            clock,
        }
    }

    /// Returns the `success` record, or the submitter's error after marking
    /// the record `failed`.
    pub async fn run(&self, request: DeployContractOperationRequest) -> Result<ContractRecord> {
        let wallet_address = request.wallet_address.trim().to_string();
        if wallet_address.is_empty() {
            return Err(MintError::InvalidRequest(
                "wallet address is required".to_string(),
            ));
        }

        let now = truncate_to_millis(self.clock.now());
        let record = ContractRecord {
            id: Ulid::new().to_string(),
            wallet_address,
            contract_address: None,
            status: ContractStatus::Pending,
            signature: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let id = record.id.clone();
        let ledger = self.ledger.clone();
        run_blocking(move || ledger.insert_contract(&record)).await?;

        tracing::info!(
            "Deploying {} (sha256={}) for contract record {}",
            self.artifact.name,
            self.artifact.sha256,
            id
        );

        match self.submitter.deploy(&self.artifact).await {
            Ok(receipt) => {
                let finished_at = truncate_to_millis(self.clock.now());
                let ledger = self.ledger.clone();
                let deployed = run_blocking(move || {
                    ledger.mark_contract_deployed(
                        &id,
                        &receipt.address,
                        &receipt.signature,
                        finished_at,
                    )
                })
                .await?;

                tracing::info!(
                    "Contract record {} deployed at {}",
                    deployed.id,
                    deployed.contract_address.as_deref().unwrap_or_default()
                );
                Ok(deployed)
            }
            Err(error) => {
                tracing::error!("Deployment for contract record {} failed: {}", id, error);

                let message = error.to_string();
                let finished_at = truncate_to_millis(self.clock.now());
                let ledger = self.ledger.clone();
                let failed_id = id.clone();
                if let Err(mark_error) = run_blocking(move || {
                    ledger.mark_contract_failed(&failed_id, &message, finished_at)
                })
                .await
                {
                    tracing::warn!(
                        "Failed to mark contract record {} as failed: {}",
                        id,
                        mark_error
                    );
                }

                Err(match error {
                    MintError::Chain(_) => error,
                    other => MintError::Chain(other.to_string()),
                })
            }
        }
    }

    /// Asks the chain whether the program recorded at `contract_address`
    /// exists. Records that never reached `success` report `false` without a
    /// chain round trip.
    pub async fn verify(&self, contract_address: &str) -> Result<bool> {
        let contract_address = contract_address.trim().to_string();
        let ledger = self.ledger.clone();
        let lookup = contract_address.clone();
        let record = run_blocking(move || ledger.get_contract_by_address(&lookup))
            .await?
            .ok_or_else(|| MintError::NotFound(format!("contract {}", contract_address)))?;

        if record.status != ContractStatus::Success {
            return Ok(false);
        }

        let deployed = self.submitter.verify(&contract_address).await?;
        tracing::info!(
            "Verified contract {} (record {}): deployed={}",
            contract_address,
            record.id,
            deployed
        );
        Ok(deployed)
    }
}
