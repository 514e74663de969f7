use std::net::SocketAddr;
use std::path::PathBuf;

use crate::types::{Network, ValidationMode};

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to (default: 0.0.0.0:4000)
    pub bind_addr: SocketAddr,

    /// Persisted configuration record
    pub config_path: PathBuf,

    /// Known deployment addresses keyed by network, used to seed a fresh record
    pub deployments_path: Option<PathBuf>,

    /// Directory holding `<Name>.abi.json` artifacts
    pub abi_dir: PathBuf,

    /// RPC URL for the local dev node
    pub local_rpc_url: String,

    /// RPC URL for Sepolia; required once the record points at sepolia
    pub sepolia_rpc_url: Option<String>,

    /// Static admin token guarding config writes. `None` leaves writes open.
    pub admin_token: Option<String>,

    /// Allowed CORS origin. `None` allows any origin.
    pub front_origin: Option<String>,

    /// Network used when the record has none or an invalid one
    pub default_network: Network,

    /// How config writes treat invalid addresses
    pub validation_mode: ValidationMode,

    /// Upper bound for a single RPC round-trip in milliseconds (default: 10000)
    pub rpc_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            config_path: PathBuf::from("config.json"),
            deployments_path: Some(PathBuf::from("deployments.json")),
            abi_dir: PathBuf::from("abi"),
            local_rpc_url: "http://127.0.0.1:8545".to_string(),
            sepolia_rpc_url: None,
            admin_token: None,
            front_origin: None,
            default_network: Network::Localhost,
            validation_mode: ValidationMode::Strict,
            rpc_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            bind_addr: match non_empty("BIND_ADDR") {
                Some(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("BIND_ADDR must be a socket address like 0.0.0.0:4000"))?,
                None => defaults.bind_addr,
            },
            config_path: non_empty("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            deployments_path: non_empty("DEPLOYMENTS_PATH")
                .map(PathBuf::from)
                .or(defaults.deployments_path),
            abi_dir: non_empty("ABI_DIR").map(PathBuf::from).unwrap_or(defaults.abi_dir),
            local_rpc_url: non_empty("LOCAL_RPC").unwrap_or(defaults.local_rpc_url),
            sepolia_rpc_url: non_empty("SEPOLIA_RPC"),
            admin_token: non_empty("ADMIN_TOKEN"),
            front_origin: non_empty("FRONT_ORIGIN"),
            default_network: match non_empty("DEFAULT_NETWORK") {
                Some(v) => v.parse()?,
                None => defaults.default_network,
            },
            validation_mode: match non_empty("ADDRESS_VALIDATION") {
                Some(v) => v.parse()?,
                None => defaults.validation_mode,
            },
            rpc_timeout_ms: non_empty("RPC_TIMEOUT_MS")
                .unwrap_or_else(|| defaults.rpc_timeout_ms.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RPC_TIMEOUT_MS must be a valid u64"))?,
        })
    }

    /// RPC endpoint for `network`, if one is configured.
    pub fn rpc_url(&self, network: Network) -> Option<&str> {
        match network {
            Network::Localhost => Some(self.local_rpc_url.as_str()),
            Network::Sepolia => self.sepolia_rpc_url.as_deref(),
        }
    }
}

/// Read an environment variable, treating blank values as unset.
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
