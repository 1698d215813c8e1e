use std::fmt;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::merge;
use crate::resolver;
use crate::store::Store;

/// Phases of a single sync pass. A chain read failure aborts in
/// `Fetching` before any write; persistence failures are per-producer
/// and never abort the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Fetching,
    Merging,
    Persisting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Fetching => "fetching",
            RunPhase::Merging => "merging",
            RunPhase::Persisting => "persisting",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Structured result of one pass, returned to the caller instead of
/// being observable only through logs.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub producers: usize,
    pub fetch_attempts: usize,
    pub fetch_failures: usize,
    /// Producers whose final metadata ended up as the empty document.
    pub degraded: usize,
    pub saved: usize,
    pub save_failures: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            producers: 0,
            fetch_attempts: 0,
            fetch_failures: 0,
            degraded: 0,
            saved: 0,
            save_failures: 0,
            elapsed_ms: 0,
        }
    }
}

/// Sequences one full pass: chain reads, bp.json fan-out, merge,
/// sequential upserts. With no store attached (dry run) the pass stops
/// after the merge.
pub struct SyncRunner {
    chain: ChainClient,
    store: Option<Store>,
    http: Client,
}

impl SyncRunner {
    pub fn new(chain: ChainClient, store: Option<Store>, http: Client) -> Self {
        Self { chain, store, http }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::begin();

        info!(phase = %RunPhase::Fetching, "sync pass started");
        let (producers, onchain) = tokio::try_join!(
            self.chain.fetch_registered_producers(),
            self.chain.fetch_onchain_metadata(),
        )?;
        summary.producers = producers.len();
        info!(
            producers = producers.len(),
            onchain_docs = onchain.len(),
            "chain state read"
        );

        let pending = resolver::eligible(&producers, &onchain);
        let urls: Vec<String> = pending
            .iter()
            .map(|producer| resolver::derive_fetch_url(&producer.url))
            .collect();
        summary.fetch_attempts = urls.len();
        let outcomes = resolver::fetch_all(&self.http, &urls).await;
        summary.fetch_failures = outcomes.iter().filter(|o| o.is_failed()).count();

        info!(
            phase = %RunPhase::Merging,
            attempts = summary.fetch_attempts,
            failures = summary.fetch_failures,
            "external fetches settled"
        );
        let enriched = merge::merge(producers, &onchain, &outcomes);
        summary.degraded = enriched.iter().filter(|r| !r.has_metadata()).count();

        match &self.store {
            Some(store) => {
                info!(phase = %RunPhase::Persisting, records = enriched.len(), "saving producers");
                // Upserts run one at a time; a failure only skips its record.
                for record in &enriched {
                    info!(owner = %record.owner, "try saving");
                    match store.upsert(record).await {
                        Ok(()) => {
                            info!(owner = %record.owner, "successfully saved");
                            summary.saved += 1;
                        }
                        Err(err) => {
                            warn!(owner = %record.owner, error = %err, "could not save or insert");
                            summary.save_failures += 1;
                        }
                    }
                }
                // TODO: report and retry unfulfilled saves once a retry
                // policy is decided.
            }
            None => {
                info!(records = enriched.len(), "dry run; skipping persistence");
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            phase = %RunPhase::Done,
            saved = summary.saved,
            save_failures = summary.save_failures,
            degraded = summary.degraded,
            elapsed_ms = summary.elapsed_ms,
            "sync pass complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_are_stable() {
        assert_eq!(RunPhase::Fetching.to_string(), "fetching");
        assert_eq!(RunPhase::Merging.to_string(), "merging");
        assert_eq!(RunPhase::Persisting.to_string(), "persisting");
        assert_eq!(RunPhase::Done.to_string(), "done");
    }
}
