//! Shared application state for the Axum API server.

use std::sync::Arc;

use caucion_chain::abi::AbiStore;
use caucion_chain::proxy::ReadProxy;
use caucion_chain::resolver::ContractResolver;
use caucion_chain::rpc::{HttpReaderFactory, ReaderFactory};
use caucion_common::config::AppConfig;
use caucion_common::store::{ConfigStore, StoreOptions};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ConfigStore>,
    pub abis: Arc<AbiStore>,
    pub readers: Arc<dyn ReaderFactory>,
}

impl AppState {
    pub fn new(config: AppConfig, readers: Arc<dyn ReaderFactory>) -> Self {
        let store = ConfigStore::new(StoreOptions {
            config_path: config.config_path.clone(),
            deployments_path: config.deployments_path.clone(),
            default_network: config.default_network,
        });
        let abis = AbiStore::new(config.abi_dir.clone());

        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            abis: Arc::new(abis),
            readers,
        }
    }

    /// State wired to real JSON-RPC endpoints.
    pub fn from_config(config: AppConfig) -> Self {
        let readers = Arc::new(HttpReaderFactory::from_config(&config));
        Self::new(config, readers)
    }

    /// Read proxy over the current configuration record.
    pub async fn proxy(&self) -> ReadProxy {
        let record = self.store.load().await;
        ReadProxy::new(ContractResolver::new(
            record,
            self.abis.clone(),
            self.readers.clone(),
        ))
    }
}
