//! JSON-file backed configuration store.
//!
//! The record lives in a single pretty-printed JSON file. Reads never fail:
//! any problem with the file degrades to the default record. Writes merge the
//! caller's update into the current record in memory, validate it, and replace
//! the file as a whole.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::address;
use crate::error::AppError;
use crate::types::{ContractRole, Network, ValidationMode};

/// Persisted configuration record.
///
/// Address fields are `None` or an EIP-55 checksummed string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub network: Network,
    pub loan: Option<String>,
    pub usdt_token: Option<String>,
    pub btc_token: Option<String>,
    pub weth_token: Option<String>,
    pub price_oracle: Option<String>,
    pub vault_manager: Option<String>,
}

impl ConfigRecord {
    /// Empty record on the given network.
    pub fn with_network(network: Network) -> Self {
        Self {
            network,
            loan: None,
            usdt_token: None,
            btc_token: None,
            weth_token: None,
            price_oracle: None,
            vault_manager: None,
        }
    }

    /// Configured address for a contract role.
    pub fn address(&self, role: ContractRole) -> Option<&str> {
        match role {
            ContractRole::Loan => self.loan.as_deref(),
            ContractRole::VaultManager => self.vault_manager.as_deref(),
            ContractRole::PriceOracle => self.price_oracle.as_deref(),
        }
    }

    /// Address fields in key order, for iteration.
    pub fn addresses(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("loan", self.loan.as_deref()),
            ("usdtToken", self.usdt_token.as_deref()),
            ("btcToken", self.btc_token.as_deref()),
            ("wethToken", self.weth_token.as_deref()),
            ("priceOracle", self.price_oracle.as_deref()),
            ("vaultManager", self.vault_manager.as_deref()),
        ]
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "loan" => Some(&mut self.loan),
            "usdtToken" => Some(&mut self.usdt_token),
            "btcToken" => Some(&mut self.btc_token),
            "wethToken" => Some(&mut self.weth_token),
            "priceOracle" => Some(&mut self.price_oracle),
            "vaultManager" => Some(&mut self.vault_manager),
            _ => None,
        }
    }

    /// Overlay the non-null fields of `update`.
    ///
    /// Addresses are validated with `mode`; an invalid network falls back to
    /// `default_network`. On error `self` is left untouched.
    pub fn merge(
        &mut self,
        update: &ConfigUpdate,
        mode: ValidationMode,
        default_network: Network,
    ) -> Result<(), AppError> {
        let mut merged = self.clone();

        for (key, value) in update.addresses() {
            let Some(value) = value else { continue };
            let normalized = address::normalize(Some(value), mode)?;
            if let Some(slot) = merged.slot_mut(key) {
                *slot = normalized;
            }
        }
        merged.merge_network(update.network.as_deref(), default_network);

        *self = merged;
        Ok(())
    }

    /// Lenient overlay for persisted and seeded data: invalid addresses
    /// become `None` instead of failing.
    pub fn merge_lenient(&mut self, update: &ConfigUpdate, default_network: Network) {
        for (key, value) in update.addresses() {
            let Some(value) = value else { continue };
            if let Some(slot) = self.slot_mut(key) {
                *slot = address::normalize_lenient(Some(value));
            }
        }
        self.merge_network(update.network.as_deref(), default_network);
    }

    fn merge_network(&mut self, network: Option<&str>, default_network: Network) {
        if let Some(network) = network {
            self.network = network.parse().unwrap_or_else(|e: AppError| {
                tracing::warn!(error = %e, fallback = %default_network, "Replacing invalid network");
                default_network
            });
        }
    }
}

/// Partial configuration as supplied by a caller or read from disk.
///
/// Absent and `null` fields are both `None` and never clear a stored value.
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub network: Option<String>,
    pub loan: Option<String>,
    pub usdt_token: Option<String>,
    pub btc_token: Option<String>,
    pub weth_token: Option<String>,
    pub price_oracle: Option<String>,
    pub vault_manager: Option<String>,
}

impl ConfigUpdate {
    fn addresses(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("loan", self.loan.as_deref()),
            ("usdtToken", self.usdt_token.as_deref()),
            ("btcToken", self.btc_token.as_deref()),
            ("wethToken", self.weth_token.as_deref()),
            ("priceOracle", self.price_oracle.as_deref()),
            ("vaultManager", self.vault_manager.as_deref()),
        ]
    }
}

/// Map a deployments-file key to a record key.
///
/// Accepts record keys as well as the contract names the deploy scripts write.
fn seed_key(name: &str) -> Option<&'static str> {
    match name {
        "loan" | "P2PSecuredLoan" => Some("loan"),
        "priceOracle" | "MockOracle" | "PriceOracle" => Some("priceOracle"),
        "vaultManager" | "VaultManager" => Some("vaultManager"),
        "usdtToken" | "LoanToken" | "MockUSDT" => Some("usdtToken"),
        "btcToken" | "MockWBTC" | "WBTC" => Some("btcToken"),
        "wethToken" | "MockWETH" | "WETH" => Some("wethToken"),
        _ => None,
    }
}

/// Where the store reads and writes.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub config_path: PathBuf,
    pub deployments_path: Option<PathBuf>,
    pub default_network: Network,
}

/// Process-wide configuration cell backed by a JSON file.
///
/// `load` and `save` are the only mutation paths; both run under the same
/// lock, so writes within a process are serialized.
pub struct ConfigStore {
    options: StoreOptions,
    cell: Mutex<ConfigRecord>,
}

impl ConfigStore {
    pub fn new(options: StoreOptions) -> Self {
        let cell = Mutex::new(ConfigRecord::with_network(options.default_network));
        Self { options, cell }
    }

    /// Read the persisted record, seeding and persisting it on first run.
    ///
    /// Never fails: unreadable or malformed files yield the default record.
    pub async fn load(&self) -> ConfigRecord {
        let mut cell = self.cell.lock().await;
        let record = self.read_or_seed().await;
        *cell = record.clone();
        record
    }

    /// Merge `update` into the current record, validate, persist, and return it.
    pub async fn save(
        &self,
        update: &ConfigUpdate,
        mode: ValidationMode,
    ) -> Result<ConfigRecord, AppError> {
        let mut cell = self.cell.lock().await;
        let mut record = self.read_or_seed().await;
        record.merge(update, mode, self.options.default_network)?;

        self.persist(&record).await?;
        tracing::info!(
            path = %self.options.config_path.display(),
            network = %record.network,
            "Configuration saved"
        );

        *cell = record.clone();
        Ok(record)
    }

    /// Last record observed by `load` or `save`.
    pub async fn current(&self) -> ConfigRecord {
        self.cell.lock().await.clone()
    }

    async fn read_or_seed(&self) -> ConfigRecord {
        let path = &self.options.config_path;
        match tokio::fs::read_to_string(path).await {
            Ok(text) => self.parse_persisted(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let record = self.seeded().await;
                if let Err(e) = self.persist(&record).await {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to persist seeded configuration");
                } else {
                    tracing::info!(path = %path.display(), network = %record.network, "Created configuration file");
                }
                record
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read configuration, using defaults");
                self.defaults()
            }
        }
    }

    fn defaults(&self) -> ConfigRecord {
        ConfigRecord::with_network(self.options.default_network)
    }

    fn parse_persisted(&self, text: &str) -> ConfigRecord {
        let mut record = self.defaults();
        match serde_json::from_str::<ConfigUpdate>(text) {
            Ok(stored) => {
                record.merge_lenient(&stored, self.options.default_network);
                record
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.options.config_path.display(),
                    error = %e,
                    "Malformed configuration file, using defaults"
                );
                record
            }
        }
    }

    /// Defaults overlaid with the deployments file entry for the default network.
    async fn seeded(&self) -> ConfigRecord {
        let mut record = self.defaults();
        let Some(seed_path) = &self.options.deployments_path else {
            return record;
        };

        let text = match tokio::fs::read_to_string(seed_path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %seed_path.display(), error = %e, "No deployments file to seed from");
                return record;
            }
        };

        let deployments: HashMap<String, HashMap<String, serde_json::Value>> =
            match serde_json::from_str(&text) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(path = %seed_path.display(), error = %e, "Malformed deployments file");
                    return record;
                }
            };

        let Some(entries) = deployments.get(record.network.as_str()) else {
            return record;
        };

        for (name, value) in entries {
            let (Some(key), Some(raw)) = (seed_key(name), value.as_str()) else {
                continue;
            };
            if let Some(slot) = record.slot_mut(key) {
                *slot = address::normalize_lenient(Some(raw));
            }
        }

        tracing::info!(
            path = %seed_path.display(),
            network = %record.network,
            "Seeded configuration from deployments file"
        );
        record
    }

    /// Replace the file with `record` via a sibling temp file and rename.
    async fn persist(&self, record: &ConfigRecord) -> Result<(), AppError> {
        let path = &self.options.config_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = serde_json::to_string_pretty(record).map_err(std::io::Error::from)?;
        body.push('\n');

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const ORACLE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const LOAN: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    fn store_in(dir: &Path) -> ConfigStore {
        ConfigStore::new(StoreOptions {
            config_path: dir.join("config.json"),
            deployments_path: Some(dir.join("deployments.json")),
            default_network: Network::Localhost,
        })
    }

    #[tokio::test]
    async fn test_load_without_files_returns_defaults_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let record = store.load().await;
        assert_eq!(record, ConfigRecord::with_network(Network::Localhost));
        assert!(dir.path().join("config.json").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("config.json")).unwrap())
                .unwrap();
        let keys: Vec<&str> = raw.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys.len(), 7);
        assert!(keys.contains(&"priceOracle"));
        assert!(raw["loan"].is_null());
    }

    #[tokio::test]
    async fn test_load_seeds_from_deployments_for_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("deployments.json"),
            serde_json::json!({
                "localhost": {
                    "P2PSecuredLoan": LOAN.to_lowercase(),
                    "MockOracle": ORACLE,
                    "Unrelated": "0x0000000000000000000000000000000000000001"
                },
                "sepolia": { "loan": ORACLE }
            })
            .to_string(),
        )
        .unwrap();

        let store = store_in(dir.path());
        let record = store.load().await;
        assert_eq!(record.loan.as_deref(), Some(LOAN));
        assert_eq!(record.price_oracle.as_deref(), Some(ORACLE));
        assert_eq!(record.vault_manager, None);
    }

    #[tokio::test]
    async fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

        let store = store_in(dir.path());
        assert_eq!(store.load().await, ConfigRecord::with_network(Network::Localhost));
    }

    #[tokio::test]
    async fn test_load_normalizes_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            serde_json::json!({
                "network": "mainnet",
                "loan": "garbage",
                "priceOracle": ORACLE.to_lowercase(),
                "extra": "dropped"
            })
            .to_string(),
        )
        .unwrap();

        let record = store_in(dir.path()).load().await;
        assert_eq!(record.network, Network::Localhost);
        assert_eq!(record.loan, None);
        assert_eq!(record.price_oracle.as_deref(), Some(ORACLE));
    }

    #[tokio::test]
    async fn test_empty_save_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let update = ConfigUpdate {
            network: Some("sepolia".into()),
            loan: Some(LOAN.into()),
            price_oracle: Some(ORACLE.into()),
            ..Default::default()
        };
        let saved = store.save(&update, ValidationMode::Strict).await.unwrap();

        let again = store.save(&ConfigUpdate::default(), ValidationMode::Strict).await.unwrap();
        assert_eq!(again, saved);
        assert_eq!(store.load().await, saved);
    }

    #[tokio::test]
    async fn test_null_never_erases() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(
                &ConfigUpdate { price_oracle: Some(ORACLE.into()), ..Default::default() },
                ValidationMode::Strict,
            )
            .await
            .unwrap();

        let update: ConfigUpdate = serde_json::from_str(r#"{"priceOracle": null}"#).unwrap();
        let record = store.save(&update, ValidationMode::Strict).await.unwrap();
        assert_eq!(record.price_oracle.as_deref(), Some(ORACLE));
    }

    #[tokio::test]
    async fn test_placeholder_clears_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&ConfigUpdate { loan: Some(LOAN.into()), ..Default::default() }, ValidationMode::Strict)
            .await
            .unwrap();

        let record = store
            .save(&ConfigUpdate { loan: Some("0x...".into()), ..Default::default() }, ValidationMode::Strict)
            .await
            .unwrap();
        assert_eq!(record.loan, None);
    }

    #[tokio::test]
    async fn test_strict_save_rejects_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let before = store
            .save(&ConfigUpdate { loan: Some(LOAN.into()), ..Default::default() }, ValidationMode::Strict)
            .await
            .unwrap();

        let result = store
            .save(
                &ConfigUpdate {
                    loan: Some("not-an-address".into()),
                    price_oracle: Some(ORACLE.into()),
                    ..Default::default()
                },
                ValidationMode::Strict,
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidAddress(_))));
        assert_eq!(store.load().await, before);
    }

    #[tokio::test]
    async fn test_lenient_save_drops_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&ConfigUpdate { loan: Some(LOAN.into()), ..Default::default() }, ValidationMode::Strict)
            .await
            .unwrap();

        let record = store
            .save(
                &ConfigUpdate { loan: Some("not-an-address".into()), ..Default::default() },
                ValidationMode::Lenient,
            )
            .await
            .unwrap();
        assert_eq!(record.loan, None);
    }

    #[tokio::test]
    async fn test_invalid_network_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .save(&ConfigUpdate { network: Some("sepolia".into()), ..Default::default() }, ValidationMode::Strict)
            .await
            .unwrap();

        let record = store
            .save(&ConfigUpdate { network: Some("goerli".into()), ..Default::default() }, ValidationMode::Strict)
            .await
            .unwrap();
        assert_eq!(record.network, Network::Localhost);
        assert_eq!(store.current().await, record);
    }

    #[test]
    fn test_merge_lenient_drops_invalid_and_keeps_valid() {
        let mut record = ConfigRecord {
            vault_manager: Some(LOAN.into()),
            ..ConfigRecord::with_network(Network::Localhost)
        };
        let stored = ConfigUpdate {
            network: Some("sepolia".into()),
            loan: Some("0x1234".into()),
            price_oracle: Some(ORACLE.to_lowercase()),
            ..Default::default()
        };

        record.merge_lenient(&stored, Network::Localhost);
        assert_eq!(record.network, Network::Sepolia);
        assert_eq!(record.loan, None);
        assert_eq!(record.price_oracle.as_deref(), Some(ORACLE));
        assert_eq!(record.vault_manager.as_deref(), Some(LOAN));
    }

    #[tokio::test]
    async fn test_persist_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let store = ConfigStore::new(StoreOptions {
            config_path: dir.path().join("blocker").join("config.json"),
            deployments_path: None,
            default_network: Network::Localhost,
        });

        let result = store
            .save(&ConfigUpdate { loan: Some(LOAN.into()), ..Default::default() }, ValidationMode::Strict)
            .await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
