//! Chain submission capability
//!
//! The ledger never talks to the chain. A deployment workflow hands a
//! compiled program to a [`ChainSubmitter`] once per contract and records the
//! resulting address.

pub mod dry_run;
pub mod factory;
pub mod http;

pub use dry_run::DryRunChainSubmitter;
pub use factory::ChainSubmitterBuilder;
pub use http::HttpChainSubmitter;

use crate::{MintError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Compiled program to deploy
#[derive(Debug, Clone)]
pub struct ProgramArtifact {
    pub name: String,
    pub bytes: Bytes,
    pub sha256: String,
}

impl ProgramArtifact {
    pub fn from_bytes(name: impl Into<String>, bytes: Bytes) -> Self {
        let sha256 = compute_hash(&bytes);
        Self {
            name: name.into(),
            bytes,
            sha256,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(MintError::Config(format!(
                "program artifact {:?} is empty",
                path
            )));
        }

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "program".to_string());

        Ok(Self::from_bytes(name, Bytes::from(bytes)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    pub address: String,
    pub signature: String,
}

#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    async fn deploy(&self, artifact: &ProgramArtifact) -> Result<DeployReceipt>;

    /// Whether a deployed program account exists at `address`.
    async fn verify(&self, address: &str) -> Result<bool>;
}

/// Hex-encoded SHA-256 of `data`
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
