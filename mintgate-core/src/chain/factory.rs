use super::{ChainSubmitter, DryRunChainSubmitter, HttpChainSubmitter};
use crate::{MintError, Result};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct ChainSubmitterBuilder {
    backend: Option<String>,
    http_endpoint: Option<String>,
    http_timeout: Option<Duration>,
}

impl ChainSubmitterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn http_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.http_endpoint = Some(endpoint.into());
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(MintError::Config(
                "chain backend cannot be empty".to_string(),
            ));
        }

        Ok(backend)
    }

    pub fn build(&self) -> Result<Arc<dyn ChainSubmitter>> {
        let backend = self.resolve_backend()?;

        match backend.as_str() {
            "http" => {
                let endpoint = self.http_endpoint.as_deref().unwrap_or_default().trim();
                if endpoint.is_empty() {
                    return Err(MintError::Config(
                        "http endpoint is required for http chain backend".to_string(),
                    ));
                }

                let timeout = self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);
                Ok(Arc::new(HttpChainSubmitter::new(endpoint, timeout)?))
            }
            "dry_run" => Ok(Arc::new(DryRunChainSubmitter::new())),
            other => Err(MintError::Config(format!(
                "unsupported chain backend: {}",
                other
            ))),
        }
    }
}
