use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ChainConfig;

/// One entry from the chain's registered producer list.
///
/// `system` keeps the complete raw chain row; chain-reported fields
/// (votes, keys, rank) are passed through to the store untouched.
#[derive(Debug, Clone)]
pub struct RegisteredProducer {
    pub owner: String,
    pub url: String,
    pub system: Value,
}

impl RegisteredProducer {
    /// Extract identity and registered URL from a raw producer row.
    /// Returns None when the row has no string `owner` to key on.
    pub fn from_row(row: Value) -> Option<Self> {
        let owner = row.get("owner")?.as_str()?.to_string();
        let url = row
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        Some(Self {
            owner,
            url,
            system: row,
        })
    }
}

/// Read-only client for the chain node's HTTP API.
#[derive(Debug, Clone)]
pub struct ChainClient {
    config: ChainConfig,
    http: Client,
}

impl ChainClient {
    pub fn new(config: ChainConfig, http: Client) -> Self {
        Self { config, http }
    }

    /// The active producer list via `get_producers`.
    pub async fn fetch_registered_producers(&self) -> Result<Vec<RegisteredProducer>> {
        let rows = self
            .post_rows(
                "/v1/chain/get_producers",
                json!({
                    "json": true,
                    "limit": self.config.row_limit,
                }),
            )
            .await
            .context("get_producers query failed")?;

        let mut producers = Vec::with_capacity(rows.len());
        for row in rows {
            match RegisteredProducer::from_row(row) {
                Some(producer) => producers.push(producer),
                None => warn!("producer row without owner; skipping"),
            }
        }
        Ok(producers)
    }

    /// On-chain metadata table rows, keyed by owner.
    pub async fn fetch_onchain_metadata(&self) -> Result<HashMap<String, Value>> {
        let rows = self
            .post_rows(
                "/v1/chain/get_table_rows",
                json!({
                    "json": true,
                    "code": self.config.metadata_code,
                    "scope": self.config.metadata_scope,
                    "table": self.config.metadata_table,
                    "limit": self.config.row_limit,
                }),
            )
            .await
            .context("get_table_rows query failed")?;
        Ok(metadata_by_owner(&rows))
    }

    async fn post_rows(&self, path: &str, body: Value) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.config.endpoint, path);
        let response: Value = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let rows = parse_rows(&response)?;
        debug!(%url, rows = rows.len(), "chain query ok");
        Ok(rows)
    }
}

/// Pull the `rows` array out of a chain query response. A response
/// without one is a malformed (or error) payload and fatal for the run.
fn parse_rows(response: &Value) -> Result<Vec<Value>> {
    response
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| anyhow!("chain response has no rows array"))
}

/// Index metadata table rows by owner. Some deployments store the
/// document as a JSON-encoded string; parse those into a document and
/// degrade unparseable payloads to absent.
fn metadata_by_owner(rows: &[Value]) -> HashMap<String, Value> {
    let mut by_owner = HashMap::with_capacity(rows.len());
    for row in rows {
        let Some(owner) = row.get("owner").and_then(Value::as_str) else {
            continue;
        };
        let doc = match row.get("json") {
            Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
            Some(doc) => doc.clone(),
            None => Value::Null,
        };
        by_owner.insert(owner.to_string(), doc);
    }
    by_owner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_row_keeps_full_row_as_system() {
        let row = json!({
            "owner": "alice",
            "url": "https://alice.example",
            "total_votes": "12345.0",
            "is_active": 1,
        });
        let producer = RegisteredProducer::from_row(row.clone()).unwrap();
        assert_eq!(producer.owner, "alice");
        assert_eq!(producer.url, "https://alice.example");
        assert_eq!(producer.system, row);
    }

    #[test]
    fn producer_row_without_owner_is_rejected() {
        assert!(RegisteredProducer::from_row(json!({"url": "x"})).is_none());
        assert!(RegisteredProducer::from_row(json!({"owner": 7})).is_none());
    }

    #[test]
    fn producer_row_url_defaults_to_empty() {
        let producer = RegisteredProducer::from_row(json!({"owner": "bob"})).unwrap();
        assert_eq!(producer.url, "");
    }

    #[test]
    fn parse_rows_requires_rows_array() {
        assert!(parse_rows(&json!({"rows": [{"owner": "a"}]})).is_ok());
        assert!(parse_rows(&json!({"error": "boom"})).is_err());
        assert!(parse_rows(&json!({"rows": "nope"})).is_err());
    }

    #[test]
    fn metadata_rows_index_by_owner() {
        let rows = vec![
            json!({"owner": "alice", "json": {"producer_account_name": "alice"}}),
            json!({"no_owner": true}),
        ];
        let map = metadata_by_owner(&rows);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map["alice"],
            json!({"producer_account_name": "alice"})
        );
    }

    #[test]
    fn metadata_string_payloads_are_parsed() {
        let rows = vec![
            json!({"owner": "alice", "json": "{\"producer_account_name\":\"alice\"}"}),
            json!({"owner": "bob", "json": "not json"}),
        ];
        let map = metadata_by_owner(&rows);
        assert_eq!(map["alice"], json!({"producer_account_name": "alice"}));
        assert_eq!(map["bob"], Value::Null);
    }
}
