use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::chain::RegisteredProducer;
use crate::resolver::FetchOutcome;

/// The unit persisted per producer: the registered chain row plus the
/// winning metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedProducer {
    pub owner: String,
    pub system: Value,
    pub bpjson: Value,
}

impl EnrichedProducer {
    pub fn has_metadata(&self) -> bool {
        !is_empty_document(Some(&self.bpjson))
    }
}

/// A document counts as present only when it is an object with at least
/// one key. Absent, null, non-objects and `{}` all mean "nothing usable".
pub fn is_empty_document(doc: Option<&Value>) -> bool {
    !matches!(doc, Some(Value::Object(map)) if !map.is_empty())
}

/// Combine registered producers, on-chain metadata and settled fetch
/// outcomes into exactly one record per producer, in input order.
///
/// Precedence: non-empty on-chain document, else the first fetched
/// document whose self-reported account name matches the owner, else an
/// empty object. Identity always comes from the registered list.
pub fn merge(
    producers: Vec<RegisteredProducer>,
    onchain: &HashMap<String, Value>,
    fetched: &[FetchOutcome],
) -> Vec<EnrichedProducer> {
    producers
        .into_iter()
        .map(|producer| {
            let chain_doc = onchain
                .get(&producer.owner)
                .filter(|doc| !is_empty_document(Some(doc)));
            let bpjson = match chain_doc {
                Some(doc) => doc.clone(),
                None => fetched
                    .iter()
                    .find_map(|outcome| outcome.matches_owner(&producer.owner))
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            };
            EnrichedProducer {
                owner: producer.owner,
                system: producer.system,
                bpjson,
            }
        })
        .collect()
}
