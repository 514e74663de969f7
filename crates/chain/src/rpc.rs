//! JSON-RPC read access.
//!
//! [`ChainReader`] is the seam between contract logic and the node: the HTTP
//! implementation talks to a real endpoint through alloy, tests plug in an
//! in-memory reader.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::Function;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;

use caucion_common::config::AppConfig;
use caucion_common::error::AppError;
use caucion_common::types::Network;

/// Read-only view of an EVM node.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Endpoint description used in log lines and error messages.
    fn endpoint(&self) -> &str;

    async fn chain_id(&self) -> Result<u64, AppError>;

    async fn block_number(&self) -> Result<u64, AppError>;

    /// `eth_call` `function` on `to` and decode its outputs.
    async fn call(
        &self,
        to: Address,
        function: &Function,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, AppError>;
}

/// Hands out a reader for the network the configuration points at.
pub trait ReaderFactory: Send + Sync {
    fn reader(&self, network: Network) -> Result<Arc<dyn ChainReader>, AppError>;
}

/// Reader backed by an alloy HTTP provider.
pub struct HttpReader {
    url: String,
    provider: DynProvider,
    timeout: Duration,
}

impl HttpReader {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, AppError> {
        let parsed = url
            .parse()
            .map_err(|e| AppError::RpcUnreachable(format!("invalid RPC URL '{}': {}", url, e)))?;
        let provider = ProviderBuilder::new().connect_http(parsed).erased();

        Ok(Self {
            url: url.to_string(),
            provider,
            timeout,
        })
    }

    /// Run an RPC future under the configured timeout and classify its error.
    async fn bounded<T>(
        &self,
        method: &str,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.classify(method, e)),
            Err(_) => Err(AppError::RpcUnreachable(format!(
                "{} to {} timed out after {}ms",
                method,
                self.url,
                self.timeout.as_millis()
            ))),
        }
    }

    fn classify(&self, method: &str, error: TransportError) -> AppError {
        match error {
            // The node answered; the call itself failed (revert, unknown selector, ...).
            RpcError::ErrorResp(payload) => AppError::ContractCall(format!("{}: {}", method, payload)),
            other => AppError::RpcUnreachable(format!("{} to {}: {}", method, self.url, other)),
        }
    }
}

#[async_trait]
impl ChainReader for HttpReader {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn chain_id(&self) -> Result<u64, AppError> {
        self.bounded("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn block_number(&self) -> Result<u64, AppError> {
        self.bounded("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn call(
        &self,
        to: Address,
        function: &Function,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, AppError> {
        let data = function
            .abi_encode_input(args)
            .map_err(|e| AppError::Abi(format!("encoding {}: {}", function.name, e)))?;
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(data)));

        let method = format!("eth_call {}", function.name);
        let output = self
            .bounded(&method, async { self.provider.call(tx).await })
            .await?;

        function
            .abi_decode_output(&output)
            .map_err(|e| AppError::Abi(format!("decoding {} output: {}", function.name, e)))
    }
}

/// Builds [`HttpReader`]s from the RPC URLs in [`AppConfig`].
pub struct HttpReaderFactory {
    local_url: String,
    sepolia_url: Option<String>,
    timeout: Duration,
}

impl HttpReaderFactory {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            local_url: config.local_rpc_url.clone(),
            sepolia_url: config.sepolia_rpc_url.clone(),
            timeout: Duration::from_millis(config.rpc_timeout_ms),
        }
    }
}

impl ReaderFactory for HttpReaderFactory {
    fn reader(&self, network: Network) -> Result<Arc<dyn ChainReader>, AppError> {
        let url = match network {
            Network::Localhost => self.local_url.as_str(),
            Network::Sepolia => self.sepolia_url.as_deref().ok_or_else(|| {
                AppError::RpcUnreachable("SEPOLIA_RPC is not configured".to_string())
            })?,
        };
        Ok(Arc::new(HttpReader::connect(url, self.timeout)?))
    }
}
