use super::{ChainSubmitter, DeployReceipt, ProgramArtifact};
use crate::{MintError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hands programs to an external deployer service over HTTP.
///
/// The deployer owns keys, transaction construction and RPC retries; this
/// client only posts the artifact and reads back the deployed address.
pub struct HttpChainSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequestBody<'a> {
    program_name: &'a str,
    program_sha256: &'a str,
    program_base64: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponseBody {
    deployed: bool,
}

#[derive(Debug, Deserialize)]
struct DeployResponseBody {
    address: String,
    signature: String,
}

impl HttpChainSubmitter {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(MintError::Config(
                "chain deployer endpoint cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MintError::Http(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn deploy_url(&self) -> String {
        format!("{}/deploy", self.endpoint)
    }

    pub fn program_url(&self, address: &str) -> String {
        format!("{}/programs/{}", self.endpoint, address)
    }
}

#[async_trait]
impl ChainSubmitter for HttpChainSubmitter {
    async fn deploy(&self, artifact: &ProgramArtifact) -> Result<DeployReceipt> {
        let body = DeployRequestBody {
            program_name: &artifact.name,
            program_sha256: &artifact.sha256,
            program_base64: STANDARD.encode(&artifact.bytes),
        };

        let url = self.deploy_url();
        tracing::debug!("Submitting {} to deployer {}", artifact.name, url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MintError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MintError::Chain(format!(
                "deployer returned {}: {}",
                status,
                text.trim()
            )));
        }

        let receipt: DeployResponseBody = response
            .json()
            .await
            .map_err(|e| MintError::Chain(format!("invalid deployer response: {}", e)))?;

        if receipt.address.trim().is_empty() {
            return Err(MintError::Chain(
                "deployer returned an empty address".to_string(),
            ));
        }

        Ok(DeployReceipt {
            address: receipt.address,
            signature: receipt.signature,
        })
    }

    async fn verify(&self, address: &str) -> Result<bool> {
        let url = self.program_url(address);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MintError::Http(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MintError::Chain(format!(
                "deployer returned {}: {}",
                status,
                text.trim()
            )));
        }

        let body: VerifyResponseBody = response
            .json()
            .await
            .map_err(|e| MintError::Chain(format!("invalid deployer response: {}", e)))?;

        Ok(body.deployed)
    }
}
