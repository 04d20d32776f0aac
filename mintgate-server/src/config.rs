use mintgate_core::{LedgerOptions, MintError, Result, SalePolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub sale_policy: SalePolicyConfig,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl LedgerConfig {
    pub fn options(&self) -> LedgerOptions {
        LedgerOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/mintgate.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalePolicyConfig {
    #[serde(default = "default_max_sale_duration_secs")]
    pub max_sale_duration_secs: i64,
}

impl Default for SalePolicyConfig {
    fn default() -> Self {
        Self {
            max_sale_duration_secs: default_max_sale_duration_secs(),
        }
    }
}

impl SalePolicyConfig {
    pub fn policy(&self) -> Result<SalePolicy> {
        if self.max_sale_duration_secs <= 0 {
            return Err(MintError::Config(
                "sale_policy.max_sale_duration_secs must be positive".to_string(),
            ));
        }

        Ok(SalePolicy {
            max_sale_duration: chrono::Duration::seconds(self.max_sale_duration_secs),
        })
    }
}

fn default_max_sale_duration_secs() -> i64 {
    mintgate_core::DEFAULT_MAX_SALE_DURATION_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseConfig {
    /// Per-request deadline for the purchase transaction; 0 disables it
    #[serde(default = "default_purchase_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_purchase_timeout_ms(),
        }
    }
}

impl PurchaseConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }
}

fn default_purchase_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// `dry_run` or `http`
    #[serde(default = "default_chain_backend")]
    pub backend: String,
    #[serde(default)]
    pub http: Option<ChainHttpConfig>,
    /// Compiled sale program; required by the `http` backend
    #[serde(default)]
    pub program_path: Option<PathBuf>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            backend: default_chain_backend(),
            http: None,
            program_path: None,
        }
    }
}

fn default_chain_backend() -> String {
    "dry_run".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainHttpConfig {
    pub endpoint: String,
    #[serde(default = "default_chain_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_chain_timeout_ms() -> u64 {
    60_000
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("MINTGATE").separator("__"))
            .build()
            .map_err(|e| MintError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| MintError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sale_policy.policy()?;

        match self.chain.backend.trim().to_ascii_lowercase().as_str() {
            "dry_run" => {}
            "http" => {
                if self.chain.http.is_none() {
                    return Err(MintError::Config(
                        "chain.http is required for the http backend".to_string(),
                    ));
                }
                if self.chain.program_path.is_none() {
                    return Err(MintError::Config(
                        "chain.program_path is required for the http backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(MintError::Config(format!(
                    "unsupported chain backend: {}",
                    other
                )));
            }
        }

        Ok(())
    }
}
