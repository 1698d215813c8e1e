use std::collections::HashMap;

use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chain::RegisteredProducer;
use crate::merge::is_empty_document;

/// Self-reported identity field inside a bp.json document.
pub const ACCOUNT_NAME_FIELD: &str = "producer_account_name";

/// Result of one external bp.json fetch. Failures are data, not errors:
/// the merger treats `Failed` exactly like "no document".
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(Value),
    Failed(String),
}

impl FetchOutcome {
    pub fn document(&self) -> Option<&Value> {
        match self {
            FetchOutcome::Fetched(doc) => Some(doc),
            FetchOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }

    /// The carried document when its self-reported account name equals
    /// `owner`. Mismatched documents are discarded, never misassigned.
    pub fn matches_owner(&self, owner: &str) -> Option<&Value> {
        self.document()
            .filter(|doc| doc.get(ACCOUNT_NAME_FIELD).and_then(Value::as_str) == Some(owner))
    }
}

/// Producers that still need an external lookup: on-chain metadata is
/// absent or has zero keys, and the registered URL is non-empty.
pub fn eligible<'a>(
    producers: &'a [RegisteredProducer],
    onchain: &HashMap<String, Value>,
) -> Vec<&'a RegisteredProducer> {
    producers
        .iter()
        .filter(|producer| {
            is_empty_document(onchain.get(&producer.owner)) && !producer.url.is_empty()
        })
        .collect()
}

/// Normalize a registered URL into a bp.json candidate URL.
///
/// Raw URLs get the well-known suffix appended; URLs already ending in
/// `.json` are used as-is after scheme normalization.
pub fn derive_fetch_url(raw: &str) -> String {
    let mut result = if raw.starts_with("http") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    if !raw.ends_with(".json") {
        result = format!("{result}/bp.json");
    }
    result
}

/// Fetch every candidate URL concurrently and wait for all of them to
/// settle. Each fetch resolves to an outcome rather than an error, so
/// one unreachable endpoint never aborts its siblings.
pub async fn fetch_all(http: &Client, urls: &[String]) -> Vec<FetchOutcome> {
    join_all(urls.iter().map(|url| fetch_one(http, url))).await
}

async fn fetch_one(http: &Client, url: &str) -> FetchOutcome {
    match try_fetch(http, url).await {
        Ok(doc) => {
            debug!(%url, "bp.json fetched");
            FetchOutcome::Fetched(doc)
        }
        Err(err) => {
            warn!(%url, error = %err, "bp.json fetch failed");
            FetchOutcome::Failed(err.to_string())
        }
    }
}

async fn try_fetch(http: &Client, url: &str) -> anyhow::Result<Value> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn producer(owner: &str, url: &str) -> RegisteredProducer {
        RegisteredProducer {
            owner: owner.to_string(),
            url: url.to_string(),
            system: json!({ "owner": owner, "url": url }),
        }
    }

    #[test]
    fn bare_host_gets_scheme_and_suffix() {
        assert_eq!(derive_fetch_url("example.com"), "http://example.com/bp.json");
    }

    #[test]
    fn json_url_with_scheme_is_unchanged() {
        assert_eq!(
            derive_fetch_url("https://example.com/meta.json"),
            "https://example.com/meta.json"
        );
    }

    #[test]
    fn json_url_without_scheme_only_gains_scheme() {
        assert_eq!(
            derive_fetch_url("example.com/data.json"),
            "http://example.com/data.json"
        );
    }

    #[test]
    fn non_json_url_with_scheme_gains_suffix() {
        assert_eq!(
            derive_fetch_url("https://example.com"),
            "https://example.com/bp.json"
        );
    }

    #[test]
    fn eligibility_requires_empty_metadata_and_a_url() {
        let producers = vec![
            producer("has-doc", "https://a.example"),
            producer("empty-doc", "https://b.example"),
            producer("no-doc", "https://c.example"),
            producer("no-url", ""),
        ];
        let onchain = HashMap::from([
            ("has-doc".to_string(), json!({"k": "v"})),
            ("empty-doc".to_string(), json!({})),
        ]);
        let pending = eligible(&producers, &onchain);
        let owners: Vec<&str> = pending.iter().map(|p| p.owner.as_str()).collect();
        assert_eq!(owners, vec!["empty-doc", "no-doc"]);
    }

    #[test]
    fn owner_match_requires_exact_account_name() {
        let outcome = FetchOutcome::Fetched(json!({ "producer_account_name": "alice" }));
        assert!(outcome.matches_owner("alice").is_some());
        assert!(outcome.matches_owner("bob").is_none());

        let missing_field = FetchOutcome::Fetched(json!({ "org": {} }));
        assert!(missing_field.matches_owner("alice").is_none());

        let failed = FetchOutcome::Failed("timeout".to_string());
        assert!(failed.matches_owner("alice").is_none());
    }
}
