use super::{ChainSubmitter, DeployReceipt, ProgramArtifact, compute_hash};
use crate::Result;
use async_trait::async_trait;
use ulid::Ulid;

/// Submitter that never touches a network.
///
/// Produces a unique address per deployment, derived from the artifact hash
/// and a fresh ULID. Meant for local development.
#[derive(Debug, Clone, Default)]
pub struct DryRunChainSubmitter;

impl DryRunChainSubmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChainSubmitter for DryRunChainSubmitter {
    async fn deploy(&self, artifact: &ProgramArtifact) -> Result<DeployReceipt> {
        let nonce = Ulid::new().to_string();
        let address_hash = compute_hash(format!("{}:{}", artifact.sha256, nonce).as_bytes());
        let address = address_hash[..44].to_string();
        let signature = compute_hash(format!("sig:{}", address).as_bytes());

        tracing::info!(
            "Dry-run deployment of {} ({} bytes) -> {}",
            artifact.name,
            artifact.bytes.len(),
            address
        );

        Ok(DeployReceipt { address, signature })
    }

    /// Accepts anything shaped like an address this submitter hands out.
    async fn verify(&self, address: &str) -> Result<bool> {
        Ok(address.len() == 44 && address.chars().all(|c| c.is_ascii_hexdigit()))
    }
}
