//! # Document Locator
//!
//! Finds every shard holding a document. The fast path asks only the shard
//! the identifier hashes to; the full scan asks every shard once, which is
//! how stray copies left by an incomplete rebalance are found.

use super::shard_hasher::shard_of;
use super::topology_resolver::ClusterSession;
use crate::domain::{DocumentLocation, GetOutcome, LocatorError, ShardIndex};
use tracing::{debug, trace};

/// Locate `id` in `collection`.
///
/// A shard answering "not found" is simply absent from the result. Any other
/// failure aborts the lookup; nothing is retried.
pub async fn locate(
    session: &ClusterSession,
    id: &str,
    collection: &str,
    search_all_shards: bool,
) -> Result<Vec<DocumentLocation>, LocatorError> {
    let shard_count = session.shard_count();
    let expected = shard_of(id.as_bytes(), shard_count);

    let shards: Vec<ShardIndex> = if search_all_shards {
        shard_count.indices().collect()
    } else {
        vec![expected]
    };

    let mut locations = Vec::new();
    for shard in shards {
        let client = session.client_for(shard)?;
        trace!(id, shard, node = %client.address(), "[vbd] get");
        match client.get(id, collection, shard).await? {
            GetOutcome::Found(document) => {
                locations.push(DocumentLocation::new(id, shard, document));
            }
            GetOutcome::NotFound => {}
        }
    }

    debug!(
        id,
        expected_shard = expected,
        found = locations.len(),
        search_all_shards,
        "[vbd] Located document"
    );
    Ok(locations)
}
