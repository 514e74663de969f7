use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Supported target networks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Localhost,
    Sepolia,
}

impl Network {
    /// EVM chain id the network is expected to report.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Localhost => 31337,
            Network::Sepolia => 11_155_111,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Localhost => "localhost",
            Network::Sepolia => "sepolia",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "localhost" => Ok(Network::Localhost),
            "sepolia" => Ok(Network::Sepolia),
            other => Err(AppError::InvalidNetwork(other.to_string())),
        }
    }
}

/// Logical role of a configured contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractRole {
    Loan,
    VaultManager,
    PriceOracle,
}

impl ContractRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractRole::Loan => "loan",
            ContractRole::VaultManager => "vaultManager",
            ContractRole::PriceOracle => "priceOracle",
        }
    }
}

impl std::fmt::Display for ContractRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How invalid address input is treated.
///
/// `Strict` rejects the whole operation with `InvalidAddress`; `Lenient`
/// drops the offending value and carries on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Strict,
    Lenient,
}

impl FromStr for ValidationMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "lenient" => Ok(ValidationMode::Lenient),
            other => Err(AppError::Config(format!(
                "unknown address validation mode '{}' (expected 'strict' or 'lenient')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationMode::Strict => write!(f, "strict"),
            ValidationMode::Lenient => write!(f, "lenient"),
        }
    }
}
