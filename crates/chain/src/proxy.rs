//! Read-only queries served by the HTTP API: node health, loan/vault status,
//! and the oracle price.

use std::collections::BTreeMap;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;

use caucion_common::error::AppError;
use caucion_common::types::{ContractRole, Network};

use crate::resolver::{ContractHandle, ContractResolver};

/// Node liveness as seen from the configured network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub network: Network,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of `status()`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StatusReport {
    Loan(LoanStatus),
    Vault(VaultStatus),
    Unconfigured { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatus {
    pub address: String,
    pub abi: String,
    /// Lifecycle state as reported by the contract, relayed verbatim.
    pub state: Option<u64>,
    /// Optional numeric reads that succeeded, as decimal strings.
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub address: String,
    pub abi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolData {
    pub total_collateral: String,
    pub total_debt: String,
    pub vault_count: String,
    pub btc_price: String,
}

/// Latest oracle round, scaled for humans.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceReport {
    pub address: String,
    pub description: String,
    pub decimals: u8,
    /// Raw integer answer, kept as a string to avoid precision loss.
    pub answer: String,
    /// `answer / 10^decimals`.
    pub price: f64,
    pub round_id: u128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

/// Result of `price()`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceOutcome {
    #[serde(rename = "ok")]
    Available(PriceReport),
    NotConfigured { message: String },
}

/// Contract-read proxy over one configuration snapshot.
pub struct ReadProxy {
    resolver: ContractResolver,
}

impl ReadProxy {
    pub fn new(resolver: ContractResolver) -> Self {
        Self { resolver }
    }

    /// `ok` when the node answers `eth_blockNumber`. Never fails.
    pub async fn health(&self) -> HealthReport {
        let network = self.resolver.network();
        let mut report = HealthReport {
            ok: false,
            network,
            chain_id: None,
            block: None,
            error: None,
            timestamp: Utc::now(),
        };

        let reader = match self.resolver.reader() {
            Ok(reader) => reader,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };

        match reader.block_number().await {
            Ok(block) => {
                report.ok = true;
                report.block = Some(block);
            }
            Err(e) => {
                tracing::warn!(endpoint = reader.endpoint(), error = %e, "Health check failed");
                report.error = Some(e.to_string());
                return report;
            }
        }

        match reader.chain_id().await {
            Ok(chain_id) => {
                if chain_id != network.chain_id() {
                    tracing::warn!(
                        network = %network,
                        expected = network.chain_id(),
                        actual = chain_id,
                        "RPC endpoint reports an unexpected chain id"
                    );
                }
                report.chain_id = Some(chain_id);
            }
            Err(e) => tracing::debug!(error = %e, "Chain id unavailable"),
        }

        report
    }

    /// Loan state if a loan is configured, else the vault manager, else an
    /// explicit "unconfigured" report.
    pub async fn status(&self) -> Result<StatusReport, AppError> {
        if let Some(loan) = self.resolver.resolve(ContractRole::Loan).await? {
            return self.loan_status(&loan).await.map(StatusReport::Loan);
        }

        if let Some(vault) = self.resolver.resolve(ContractRole::VaultManager).await? {
            return self.vault_status(&vault).await.map(StatusReport::Vault);
        }

        Ok(StatusReport::Unconfigured {
            message: "no contracts configured".to_string(),
        })
    }

    async fn loan_status(&self, loan: &ContractHandle) -> Result<LoanStatus, AppError> {
        let state = match loan.state_function() {
            Some(name) => {
                let values = loan.call(name).await?;
                let state = values.first().and_then(as_u256).and_then(|v| u64::try_from(v).ok());
                if state.is_none() {
                    return Err(AppError::Abi(format!("{} did not return an integer", name)));
                }
                state
            }
            None => {
                tracing::debug!(address = %loan.address(), "Loan ABI exposes no state getter");
                None
            }
        };

        let mut fields = BTreeMap::new();
        for &name in loan.schema().optional {
            let Some(values) = loan.read_optional(name).await? else {
                continue;
            };
            match values.first().and_then(render_value) {
                Some(rendered) => {
                    fields.insert(name.to_string(), rendered);
                }
                None => tracing::debug!(function = name, "Unrenderable return value, skipping"),
            }
        }

        Ok(LoanStatus {
            address: loan.address().to_checksum(None),
            abi: loan.abi_name().to_string(),
            state,
            fields,
        })
    }

    async fn vault_status(&self, vault: &ContractHandle) -> Result<VaultStatus, AppError> {
        let mut protocol = None;
        for &name in vault.schema().optional {
            let Some(values) = vault.read_optional(name).await? else {
                continue;
            };
            let rendered: Vec<String> = values.iter().filter_map(render_value).collect();
            if let [total_collateral, total_debt, vault_count, btc_price, ..] = rendered.as_slice() {
                protocol = Some(ProtocolData {
                    total_collateral: total_collateral.clone(),
                    total_debt: total_debt.clone(),
                    vault_count: vault_count.clone(),
                    btc_price: btc_price.clone(),
                });
            }
        }

        Ok(VaultStatus {
            address: vault.address().to_checksum(None),
            abi: vault.abi_name().to_string(),
            protocol,
        })
    }

    /// Latest oracle round. Any failed read fails the query with `OracleRead`.
    pub async fn price(&self) -> Result<PriceOutcome, AppError> {
        let Some(oracle) = self.resolver.resolve(ContractRole::PriceOracle).await? else {
            return Ok(PriceOutcome::NotConfigured {
                message: "price oracle not configured".to_string(),
            });
        };

        let decimals = read_oracle(&oracle, "decimals").await?;
        let decimals = decimals
            .first()
            .and_then(as_u256)
            .and_then(|d| u8::try_from(d).ok())
            .ok_or_else(|| AppError::OracleRead("decimals: unexpected return value".to_string()))?;

        let round = read_oracle(&oracle, "latestRoundData").await?;
        let [round_id, answer, started_at, updated_at, answered_in_round] = round.as_slice() else {
            return Err(AppError::OracleRead(format!(
                "latestRoundData: expected 5 values, got {}",
                round.len()
            )));
        };
        let DynSolValue::Int(answer, _) = answer else {
            return Err(AppError::OracleRead("latestRoundData: answer is not a signed integer".to_string()));
        };
        let round_field = |value: &DynSolValue, field: &str| {
            as_u256(value).ok_or_else(|| {
                AppError::OracleRead(format!("latestRoundData: {} is not an unsigned integer", field))
            })
        };
        let round_id = round_field(round_id, "roundId")?;
        let started_at = round_field(started_at, "startedAt")?;
        let updated_at = round_field(updated_at, "updatedAt")?;
        let answered_in_round = round_field(answered_in_round, "answeredInRound")?;

        let description = read_oracle(&oracle, "description").await?;
        let description = match description.first() {
            Some(DynSolValue::String(s)) => s.clone(),
            _ => return Err(AppError::OracleRead("description: expected a string".to_string())),
        };

        let answer = answer.to_string();
        let price = scale(&answer, decimals)?;

        tracing::debug!(oracle = %oracle.address(), %answer, decimals, price, "Oracle price read");

        Ok(PriceOutcome::Available(PriceReport {
            address: oracle.address().to_checksum(None),
            description,
            decimals,
            answer,
            price,
            round_id: round_id.saturating_to::<u128>(),
            started_at: started_at.saturating_to::<u64>(),
            updated_at: updated_at.saturating_to::<u64>(),
            answered_in_round: answered_in_round.saturating_to::<u128>(),
        }))
    }
}

async fn read_oracle(oracle: &ContractHandle, name: &str) -> Result<Vec<DynSolValue>, AppError> {
    oracle.call(name).await.map_err(|e| match e {
        // An unusable endpoint stays a connectivity error.
        AppError::RpcUnreachable(_) => e,
        other => AppError::OracleRead(format!("{}: {}", name, other)),
    })
}

/// `answer / 10^decimals` as a float.
fn scale(answer: &str, decimals: u8) -> Result<f64, AppError> {
    let raw: f64 = answer
        .parse()
        .map_err(|_| AppError::OracleRead(format!("answer '{}' is not numeric", answer)))?;
    Ok(raw / 10f64.powi(i32::from(decimals)))
}

fn as_u256(value: &DynSolValue) -> Option<U256> {
    match value {
        DynSolValue::Uint(v, _) => Some(*v),
        _ => None,
    }
}

/// Render a scalar return value as a string; composite values are skipped.
fn render_value(value: &DynSolValue) -> Option<String> {
    match value {
        DynSolValue::Uint(v, _) => Some(v.to_string()),
        DynSolValue::Int(v, _) => Some(v.to_string()),
        DynSolValue::Bool(v) => Some(v.to_string()),
        DynSolValue::Address(a) => Some(a.to_checksum(None)),
        DynSolValue::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::abi::AbiStore;
    use crate::mock::{MockFactory, MockReader};
    use alloy::primitives::I256;
    use caucion_common::store::ConfigRecord;

    const LOAN: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
    const VAULT: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";
    const ORACLE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    // Loan contract without `dueDate`.
    const LOAN_ABI: &str = r#"[
      {"type":"function","name":"state","inputs":[],"outputs":[{"name":"","type":"uint8"}],"stateMutability":"view"},
      {"type":"function","name":"loanAmount","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
      {"type":"function","name":"interestAmount","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
      {"type":"function","name":"collateralAmount","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
      {"type":"function","name":"totalFunded","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
      {"type":"function","name":"fundingDeadline","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"}
    ]"#;

    fn uint(v: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(v), 256)
    }

    fn proxy(dir: &std::path::Path, record: ConfigRecord, reader: MockReader) -> ReadProxy {
        ReadProxy::new(ContractResolver::new(
            record,
            Arc::new(AbiStore::new(dir)),
            Arc::new(MockFactory::new(reader)),
        ))
    }

    fn empty() -> ConfigRecord {
        ConfigRecord::with_network(Network::Localhost)
    }

    fn oracle_reader(decimals: u64, answer: i64) -> MockReader {
        MockReader::default()
            .with("decimals", vec![DynSolValue::Uint(U256::from(decimals), 8)])
            .with(
                "latestRoundData",
                vec![
                    DynSolValue::Uint(U256::from(7u64), 80),
                    DynSolValue::Int(answer.to_string().parse::<I256>().unwrap(), 256),
                    uint(1_700_000_000),
                    uint(1_700_000_060),
                    DynSolValue::Uint(U256::from(7u64), 80),
                ],
            )
            .with("description", vec![DynSolValue::String("BTC / USD".into())])
    }

    #[tokio::test]
    async fn test_status_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let report = proxy(dir.path(), empty(), MockReader::default()).status().await.unwrap();
        assert!(matches!(report, StatusReport::Unconfigured { .. }));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "unconfigured");
    }

    #[tokio::test]
    async fn test_status_skips_missing_due_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("P2PSecuredLoan.abi.json"), LOAN_ABI).unwrap();
        let reader = MockReader::default()
            .with("state", vec![DynSolValue::Uint(U256::from(3), 8)])
            .with("loanAmount", vec![uint(1000)])
            .with("interestAmount", vec![uint(50)])
            .with("collateralAmount", vec![uint(2000)])
            .with("totalFunded", vec![uint(1000)])
            // Present in the ABI but reverting on-chain.
            .failing("fundingDeadline", "execution reverted");
        let record = ConfigRecord {
            loan: Some(LOAN.into()),
            ..empty()
        };

        let StatusReport::Loan(status) = proxy(dir.path(), record, reader).status().await.unwrap() else {
            panic!("expected loan status");
        };
        assert_eq!(status.state, Some(3));
        assert_eq!(status.address, LOAN);
        assert_eq!(status.fields.get("loanAmount").map(String::as_str), Some("1000"));
        assert_eq!(status.fields.get("totalFunded").map(String::as_str), Some("1000"));
        assert!(!status.fields.contains_key("dueDate"));
        assert!(!status.fields.contains_key("fundingDeadline"));
        assert_eq!(status.fields.len(), 4);
    }

    #[tokio::test]
    async fn test_status_state_read_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("P2PSecuredLoan.abi.json"), LOAN_ABI).unwrap();
        let record = ConfigRecord {
            loan: Some(LOAN.into()),
            ..empty()
        };

        let result = proxy(dir.path(), record, MockReader::default().unreachable())
            .status()
            .await;
        assert!(matches!(result, Err(AppError::RpcUnreachable(_))));
    }

    #[tokio::test]
    async fn test_vault_status_against_down_node_fails() {
        let dir = tempfile::tempdir().unwrap();
        let record = ConfigRecord {
            vault_manager: Some(VAULT.into()),
            ..empty()
        };

        let result = proxy(dir.path(), record, MockReader::default().unreachable())
            .status()
            .await;
        assert!(matches!(result, Err(AppError::RpcUnreachable(_))));
    }

    #[tokio::test]
    async fn test_price_with_mock_oracle_artifact_uses_feed_abi() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("MockOracle.abi.json"),
            r#"[{"type":"function","name":"getPrice","inputs":[{"name":"asset","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"}]"#,
        )
        .unwrap();
        let record = ConfigRecord {
            price_oracle: Some(ORACLE.into()),
            ..empty()
        };

        let PriceOutcome::Available(report) = proxy(dir.path(), record, oracle_reader(8, 300_000_000_000))
            .price()
            .await
            .unwrap()
        else {
            panic!("expected price");
        };
        assert_eq!(report.price, 3000.0);
    }

    #[tokio::test]
    async fn test_status_falls_back_to_vault() {
        let dir = tempfile::tempdir().unwrap();
        let reader = MockReader::default().with(
            "getProtocolData",
            vec![uint(150_000_000), uint(30_000), uint(2), uint(6_000_000_000_000)],
        );
        let record = ConfigRecord {
            // Loan configured but without an ABI: unresolved, so the vault is used.
            loan: Some(LOAN.into()),
            vault_manager: Some(VAULT.into()),
            ..empty()
        };

        let StatusReport::Vault(vault) = proxy(dir.path(), record, reader).status().await.unwrap() else {
            panic!("expected vault status");
        };
        assert_eq!(vault.address, VAULT);
        let protocol = vault.protocol.unwrap();
        assert_eq!(protocol.vault_count, "2");
        assert_eq!(protocol.btc_price, "6000000000000");
    }

    #[tokio::test]
    async fn test_vault_without_protocol_data() {
        let dir = tempfile::tempdir().unwrap();
        let record = ConfigRecord {
            vault_manager: Some(VAULT.into()),
            ..empty()
        };

        let StatusReport::Vault(vault) = proxy(dir.path(), record, MockReader::default())
            .status()
            .await
            .unwrap()
        else {
            panic!("expected vault status");
        };
        assert!(vault.protocol.is_none());
    }

    #[tokio::test]
    async fn test_price_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = proxy(dir.path(), empty(), MockReader::default()).price().await.unwrap();
        assert!(matches!(outcome, PriceOutcome::NotConfigured { .. }));
        assert_eq!(serde_json::to_value(&outcome).unwrap()["status"], "not_configured");
    }

    #[tokio::test]
    async fn test_price_scaled_by_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let record = ConfigRecord {
            price_oracle: Some(ORACLE.into()),
            ..empty()
        };

        let PriceOutcome::Available(report) = proxy(dir.path(), record, oracle_reader(8, 300_000_000_000))
            .price()
            .await
            .unwrap()
        else {
            panic!("expected price");
        };
        assert_eq!(report.price, 3000.0);
        assert_eq!(report.answer, "300000000000");
        assert_eq!(report.decimals, 8);
        assert_eq!(report.round_id, 7);
        assert_eq!(report.updated_at, 1_700_000_060);
        assert_eq!(report.description, "BTC / USD");
    }

    #[tokio::test]
    async fn test_price_read_failure_is_oracle_error() {
        let dir = tempfile::tempdir().unwrap();
        let record = ConfigRecord {
            price_oracle: Some(ORACLE.into()),
            ..empty()
        };
        let reader = oracle_reader(8, 1).failing("description", "execution reverted");

        let result = proxy(dir.path(), record, reader).price().await;
        assert!(matches!(result, Err(AppError::OracleRead(_))));
    }

    #[tokio::test]
    async fn test_health_reports_block() {
        let dir = tempfile::tempdir().unwrap();
        let report = proxy(dir.path(), empty(), MockReader::default().with_block(42))
            .health()
            .await;
        assert!(report.ok);
        assert_eq!(report.block, Some(42));
        assert_eq!(report.chain_id, Some(31337));
    }

    #[tokio::test]
    async fn test_health_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let report = proxy(dir.path(), empty(), MockReader::default().unreachable())
            .health()
            .await;
        assert!(!report.ok);
        assert!(report.block.is_none());
        assert!(report.error.is_some());
    }

    #[test]
    fn test_scale_negative_answer() {
        assert_eq!(scale("-150000000", 8).unwrap(), -1.5);
        assert_eq!(scale("42", 0).unwrap(), 42.0);
    }
}
