//! In-memory [`ChainReader`] for tests.
//!
//! Responses are keyed by function name; anything not registered reverts.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::Function;
use alloy::primitives::Address;
use async_trait::async_trait;

use caucion_common::error::AppError;
use caucion_common::types::Network;

use crate::rpc::{ChainReader, ReaderFactory};

#[derive(Debug)]
pub struct MockReader {
    responses: HashMap<String, Result<Vec<DynSolValue>, String>>,
    block: Option<u64>,
    chain_id: u64,
}

impl Default for MockReader {
    fn default() -> Self {
        Self {
            responses: HashMap::new(),
            block: Some(1),
            chain_id: Network::Localhost.chain_id(),
        }
    }
}

impl MockReader {
    /// Answer calls to `function` with `values`.
    pub fn with(mut self, function: &str, values: Vec<DynSolValue>) -> Self {
        self.responses.insert(function.to_string(), Ok(values));
        self
    }

    /// Make calls to `function` revert with `reason`.
    pub fn failing(mut self, function: &str, reason: &str) -> Self {
        self.responses.insert(function.to_string(), Err(reason.to_string()));
        self
    }

    pub fn with_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    /// Behave like a node that cannot be reached.
    pub fn unreachable(mut self) -> Self {
        self.block = None;
        self
    }
}

#[async_trait]
impl ChainReader for MockReader {
    fn endpoint(&self) -> &str {
        "mock://chain"
    }

    async fn chain_id(&self) -> Result<u64, AppError> {
        match self.block {
            Some(_) => Ok(self.chain_id),
            None => Err(AppError::RpcUnreachable("mock://chain is down".to_string())),
        }
    }

    async fn block_number(&self) -> Result<u64, AppError> {
        self.block
            .ok_or_else(|| AppError::RpcUnreachable("mock://chain is down".to_string()))
    }

    async fn call(
        &self,
        _to: Address,
        function: &Function,
        _args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, AppError> {
        if self.block.is_none() {
            return Err(AppError::RpcUnreachable("mock://chain is down".to_string()));
        }
        match self.responses.get(&function.name) {
            Some(Ok(values)) => Ok(values.clone()),
            Some(Err(reason)) => Err(AppError::ContractCall(format!("{}: {}", function.name, reason))),
            None => Err(AppError::ContractCall(format!("{}: execution reverted", function.name))),
        }
    }
}

/// Serves the same [`MockReader`] for every network not marked missing.
pub struct MockFactory {
    reader: Arc<MockReader>,
    missing: Vec<Network>,
}

impl MockFactory {
    pub fn new(reader: MockReader) -> Self {
        Self {
            reader: Arc::new(reader),
            missing: Vec::new(),
        }
    }

    /// Treat `network` as having no RPC URL configured.
    pub fn without(mut self, network: Network) -> Self {
        self.missing.push(network);
        self
    }
}

impl ReaderFactory for MockFactory {
    fn reader(&self, network: Network) -> Result<Arc<dyn ChainReader>, AppError> {
        if self.missing.contains(&network) {
            return Err(AppError::RpcUnreachable(format!(
                "no RPC URL configured for {}",
                network
            )));
        }
        Ok(self.reader.clone())
    }
}
