//! Shard selection
//!
//! Turns a query spec into the ordered list of participating shards and
//! marks specs whose statement must run on every replica independently.

use crate::cluster::{ClusterCatalog, ShardPeer};
use crate::query::{Query, QuerySpec};
use std::sync::Arc;

/// Cap on the shard set consulted by LIST SERIES, per tier
pub(crate) const SHARDS_TO_QUERY_FOR_LIST_SERIES: usize = 10;

/// Participating shards for a spec, in catalog order
///
/// LIST SERIES queries the first [`SHARDS_TO_QUERY_FOR_LIST_SERIES`]
/// short-term shards followed by the same number of long-term shards,
/// keeping the catalog's order without re-sorting. Every other statement
/// gets the catalog's time-windowed cover. Deletes and drop-series
/// additionally set the spec's run-against-all-replicas flag.
pub(crate) fn select_shards(
    catalog: &dyn ClusterCatalog,
    spec: &mut QuerySpec,
) -> Vec<Arc<dyn ShardPeer>> {
    if matches!(spec.query(), Query::Delete(_) | Query::DropSeries(_)) {
        spec.run_against_all_servers_in_shard = true;
    }

    if spec.is_list_series() {
        let mut shards = catalog.short_term_shards();
        shards.truncate(SHARDS_TO_QUERY_FOR_LIST_SERIES);
        let mut long_term = catalog.long_term_shards();
        long_term.truncate(SHARDS_TO_QUERY_FOR_LIST_SERIES);
        shards.extend(long_term);
        return shards;
    }

    catalog.shards_for_query(spec)
}
