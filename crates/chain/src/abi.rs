//! ABI artifact lookup.
//!
//! Each contract role has an ordered list of candidate ABIs. Files are looked
//! up as `<dir>/<Name>.abi.json`; the first candidate that exists, parses,
//! and offers the reads the role's [`RoleSchema`] demands wins. Some roles end with a built-in minimal ABI so they keep working
//! without exported artifacts.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::json_abi::{Function, JsonAbi};

use caucion_common::error::AppError;
use caucion_common::types::ContractRole;

use crate::resolver::RoleSchema;

/// Chainlink AggregatorV3 read surface.
pub const AGGREGATOR_V3_ABI: &str = r#"[
  {"type":"function","name":"decimals","inputs":[],"outputs":[{"name":"","type":"uint8","internalType":"uint8"}],"stateMutability":"view"},
  {"type":"function","name":"description","inputs":[],"outputs":[{"name":"","type":"string","internalType":"string"}],"stateMutability":"view"},
  {"type":"function","name":"latestRoundData","inputs":[],"outputs":[
    {"name":"roundId","type":"uint80","internalType":"uint80"},
    {"name":"answer","type":"int256","internalType":"int256"},
    {"name":"startedAt","type":"uint256","internalType":"uint256"},
    {"name":"updatedAt","type":"uint256","internalType":"uint256"},
    {"name":"answeredInRound","type":"uint80","internalType":"uint80"}
  ],"stateMutability":"view"}
]"#;

/// Protocol-wide view of the vault manager.
pub const VAULT_MANAGER_ABI: &str = r#"[
  {"type":"function","name":"getProtocolData","inputs":[],"outputs":[
    {"name":"_totalCollateral","type":"uint256","internalType":"uint256"},
    {"name":"_totalDebt","type":"uint256","internalType":"uint256"},
    {"name":"_vaultCount","type":"uint256","internalType":"uint256"},
    {"name":"wbtcPrice","type":"uint256","internalType":"uint256"}
  ],"stateMutability":"view"}
]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiSource {
    File(PathBuf),
    Builtin(&'static str),
}

/// One entry of a role's fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiCandidate {
    pub name: &'static str,
    pub source: AbiSource,
}

/// An ABI that was found for a role.
#[derive(Debug, Clone)]
pub struct LoadedAbi {
    pub name: &'static str,
    pub abi: Arc<JsonAbi>,
}

/// Locates ABI artifacts in a directory.
#[derive(Debug, Clone)]
pub struct AbiStore {
    dir: PathBuf,
}

impl AbiStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Candidates for `role`, in the order they are tried.
    pub fn candidates(&self, role: ContractRole) -> Vec<AbiCandidate> {
        let file = |name: &'static str| AbiCandidate {
            name,
            source: AbiSource::File(self.dir.join(format!("{}.abi.json", name))),
        };

        match role {
            ContractRole::Loan => vec![file("P2PSecuredLoan"), file("SecuredLoan")],
            ContractRole::VaultManager => vec![
                file("VaultManager"),
                AbiCandidate {
                    name: "VaultManager (built-in)",
                    source: AbiSource::Builtin(VAULT_MANAGER_ABI),
                },
            ],
            ContractRole::PriceOracle => vec![
                file("PriceOracle"),
                file("MockOracle"),
                AbiCandidate {
                    name: "AggregatorV3 (built-in)",
                    source: AbiSource::Builtin(AGGREGATOR_V3_ABI),
                },
            ],
        }
    }

    /// First usable ABI for `role`, or `MissingContract` when none is.
    pub async fn find(&self, role: ContractRole) -> Result<LoadedAbi, AppError> {
        for candidate in self.candidates(role) {
            let text = match &candidate.source {
                AbiSource::Builtin(text) => (*text).to_string(),
                AbiSource::File(path) => match tokio::fs::read_to_string(path).await {
                    Ok(text) => text,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to read ABI artifact");
                        continue;
                    }
                },
            };

            let abi = match parse_artifact(&text) {
                Ok(abi) => abi,
                Err(e) => {
                    tracing::warn!(role = %role, abi = candidate.name, error = %e, "Skipping unusable ABI artifact");
                    continue;
                }
            };

            if let Some(missing) = missing_read(&abi, RoleSchema::for_role(role)) {
                tracing::warn!(
                    role = %role,
                    abi = candidate.name,
                    missing,
                    "Skipping ABI without the role's required reads"
                );
                continue;
            }

            tracing::debug!(role = %role, abi = candidate.name, "Selected ABI");
            return Ok(LoadedAbi {
                name: candidate.name,
                abi: Arc::new(abi),
            });
        }

        Err(AppError::MissingContract(format!(
            "no ABI artifact for {} in {}",
            role,
            self.dir.display()
        )))
    }
}

/// Zero-argument function `name` in `abi`, if any.
pub fn getter<'a>(abi: &'a JsonAbi, name: &str) -> Option<&'a Function> {
    abi.function(name)?.iter().find(|f| f.inputs.is_empty())
}

/// First read from `schema` that `abi` cannot serve.
fn missing_read(abi: &JsonAbi, schema: &RoleSchema) -> Option<&'static str> {
    if let Some(&name) = schema.required.iter().find(|name| getter(abi, name).is_none()) {
        return Some(name);
    }
    match schema.state.first() {
        Some(&first) if !schema.state.iter().any(|name| getter(abi, name).is_some()) => Some(first),
        _ => None,
    }
}

/// Parse either a bare ABI array or a compiler artifact with an `abi` field.
pub fn parse_artifact(text: &str) -> Result<JsonAbi, AppError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| AppError::Abi(format!("invalid JSON: {}", e)))?;

    let abi = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| AppError::Abi("artifact object has no 'abi' field".to_string()))?,
        other => other,
    };

    serde_json::from_value(abi).map_err(|e| AppError::Abi(format!("invalid ABI: {}", e)))
}
