//! Contract resolution.
//!
//! Turns a configured address into a read-only [`ContractHandle`]: address,
//! ABI, and the reader for the configured network. A role that is not
//! configured, or has no usable ABI, resolves to `None`.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::{Function, JsonAbi};
use alloy::primitives::Address;

use caucion_common::address::parse_address;
use caucion_common::error::AppError;
use caucion_common::store::ConfigRecord;
use caucion_common::types::{ContractRole, Network};

use crate::abi::{self, AbiStore};
use crate::rpc::{ChainReader, ReaderFactory};

/// Which reads a contract role is expected to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSchema {
    /// Lifecycle-state getters, first match wins.
    pub state: &'static [&'static str],
    /// Reads the query cannot do without.
    pub required: &'static [&'static str],
    /// Reads that are skipped when the deployed contract lacks them.
    pub optional: &'static [&'static str],
}

pub static LOAN_SCHEMA: RoleSchema = RoleSchema {
    state: &["state", "status", "loanState"],
    required: &[],
    optional: &[
        "loanAmount",
        "interestAmount",
        "collateralAmount",
        "totalFunded",
        "fundingDeadline",
        "dueDate",
    ],
};

pub static VAULT_MANAGER_SCHEMA: RoleSchema = RoleSchema {
    state: &[],
    required: &[],
    optional: &["getProtocolData"],
};

pub static PRICE_ORACLE_SCHEMA: RoleSchema = RoleSchema {
    state: &[],
    required: &["decimals", "latestRoundData", "description"],
    optional: &[],
};

impl RoleSchema {
    pub fn for_role(role: ContractRole) -> &'static RoleSchema {
        match role {
            ContractRole::Loan => &LOAN_SCHEMA,
            ContractRole::VaultManager => &VAULT_MANAGER_SCHEMA,
            ContractRole::PriceOracle => &PRICE_ORACLE_SCHEMA,
        }
    }
}

/// Read-only handle to a deployed contract.
#[derive(Clone)]
pub struct ContractHandle {
    role: ContractRole,
    address: Address,
    abi_name: &'static str,
    abi: Arc<JsonAbi>,
    reader: Arc<dyn ChainReader>,
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("abi", &self.abi_name)
            .field("endpoint", &self.reader.endpoint())
            .finish()
    }
}

impl ContractHandle {
    pub fn new(
        role: ContractRole,
        address: Address,
        abi_name: &'static str,
        abi: Arc<JsonAbi>,
        reader: Arc<dyn ChainReader>,
    ) -> Self {
        Self {
            role,
            address,
            abi_name,
            abi,
            reader,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi_name(&self) -> &'static str {
        self.abi_name
    }

    pub fn schema(&self) -> &'static RoleSchema {
        RoleSchema::for_role(self.role)
    }

    /// True when the ABI exposes a zero-argument `name`.
    pub fn supports(&self, name: &str) -> bool {
        self.getter(name).is_some()
    }

    /// First lifecycle-state getter from the role schema that the ABI exposes.
    pub fn state_function(&self) -> Option<&'static str> {
        self.schema().state.iter().copied().find(|name| self.supports(name))
    }

    /// Call a zero-argument view function; errors propagate.
    pub async fn call(&self, name: &str) -> Result<Vec<DynSolValue>, AppError> {
        let function = self.getter(name).ok_or_else(|| {
            AppError::Abi(format!(
                "{} ABI has no zero-argument function '{}'",
                self.abi_name, name
            ))
        })?;
        self.reader.call(self.address, function, &[]).await
    }

    /// Optional read: `Ok(None)` when the function is absent or the contract
    /// rejects the call. An unusable endpoint is still an error.
    pub async fn read_optional(&self, name: &str) -> Result<Option<Vec<DynSolValue>>, AppError> {
        if !self.supports(name) {
            tracing::debug!(role = %self.role, function = name, "Function not in ABI, skipping");
            return Ok(None);
        }

        match self.call(name).await {
            Ok(values) => Ok(Some(values)),
            Err(e @ AppError::RpcUnreachable(_)) => Err(e),
            Err(e) => {
                tracing::debug!(
                    role = %self.role,
                    address = %self.address,
                    function = name,
                    error = %e,
                    "Optional read failed, skipping"
                );
                Ok(None)
            }
        }
    }

    fn getter(&self, name: &str) -> Option<&Function> {
        abi::getter(&self.abi, name)
    }
}

/// Builds contract handles from a configuration snapshot.
pub struct ContractResolver {
    record: ConfigRecord,
    abis: Arc<AbiStore>,
    readers: Arc<dyn ReaderFactory>,
}

impl ContractResolver {
    pub fn new(record: ConfigRecord, abis: Arc<AbiStore>, readers: Arc<dyn ReaderFactory>) -> Self {
        Self {
            record,
            abis,
            readers,
        }
    }

    pub fn network(&self) -> Network {
        self.record.network
    }

    /// Reader for the configured network.
    pub fn reader(&self) -> Result<Arc<dyn ChainReader>, AppError> {
        self.readers.reader(self.record.network)
    }

    /// Resolve `role` to a handle, or `None` when it is not configured or
    /// has no usable ABI.
    ///
    /// Fails only when the RPC endpoint for the network is unusable.
    pub async fn resolve(&self, role: ContractRole) -> Result<Option<ContractHandle>, AppError> {
        let Some(raw) = self.record.address(role) else {
            tracing::debug!(role = %role, "Contract not configured");
            return Ok(None);
        };

        let Some(address) = parse_address(raw) else {
            tracing::warn!(role = %role, address = %raw, "Configured address is not valid, ignoring");
            return Ok(None);
        };

        let loaded = match self.abis.find(role).await {
            Ok(loaded) => loaded,
            Err(AppError::MissingContract(reason)) => {
                tracing::debug!(role = %role, %reason, "Contract unresolved");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let reader = self.reader()?;
        tracing::debug!(
            role = %role,
            address = %address,
            abi = loaded.name,
            endpoint = reader.endpoint(),
            "Resolved contract"
        );

        Ok(Some(ContractHandle::new(
            role,
            address,
            loaded.name,
            loaded.abi,
            reader,
        )))
    }
}
