//! Configured address overview.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use caucion_common::store::ConfigRecord;
use caucion_common::types::Network;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/addresses", get(list_addresses))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressesResponse {
    pub network: Network,
    pub chain_id: u64,
    pub addresses: BTreeMap<&'static str, Option<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&ConfigRecord> for AddressesResponse {
    fn from(record: &ConfigRecord) -> Self {
        let mut addresses = BTreeMap::new();
        let mut warnings = Vec::new();
        for (key, value) in record.addresses() {
            if value.is_none() {
                warnings.push(format!("{} is not configured", key));
            }
            addresses.insert(key, value.map(str::to_string));
        }

        Self {
            network: record.network,
            chain_id: record.network.chain_id(),
            addresses,
            warnings,
        }
    }
}

/// GET /addresses: configured addresses, with a warning per missing one.
async fn list_addresses(State(state): State<AppState>) -> Json<AddressesResponse> {
    let record = state.store.load().await;
    Json(AddressesResponse::from(&record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_for_missing_addresses() {
        let record = ConfigRecord {
            loan: Some("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359".into()),
            ..ConfigRecord::with_network(Network::Sepolia)
        };
        let response = AddressesResponse::from(&record);
        assert_eq!(response.chain_id, 11_155_111);
        assert_eq!(response.addresses.len(), 6);
        assert_eq!(response.warnings.len(), 5);
        assert!(response.warnings.iter().all(|w| !w.starts_with("loan ")));
    }
}
