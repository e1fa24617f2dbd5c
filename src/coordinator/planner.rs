//! Aggregation planning
//!
//! Decides, per query, whether the coordinator inserts a processor between
//! the shard streams and the sink, and which shape it takes.

use crate::query::QuerySpec;

/// Point batch size used by the passthrough engines
pub(crate) const PASSTHROUGH_BATCH_SIZE: usize = 100;

/// The processor a query gets, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessorPlan {
    /// Shards return fully-aggregated series; forward straight to the sink
    None,
    /// Batch and forward without aggregating
    Passthrough { batch_size: usize },
    /// Batch, forward, and stop once the LIMIT is satisfied
    LimitedPassthrough { batch_size: usize, limit: usize },
    /// Raw points must be aggregated at the coordinator
    Engine,
}

/// Pick the processor for a spec
///
/// `aggregate_locally` holds when every selected shard reported it can
/// aggregate this query by itself. A select over raw points always gets
/// the full engine; a locally-aggregated select with a positive LIMIT
/// still gets a limit-aware passthrough so the fan-out can stop early.
pub(crate) fn plan_processor(spec: &QuerySpec, aggregate_locally: bool) -> ProcessorPlan {
    if let Some(select) = spec.select_query() {
        if !aggregate_locally {
            return ProcessorPlan::Engine;
        }
        if select.limit > 0 {
            return ProcessorPlan::LimitedPassthrough {
                batch_size: PASSTHROUGH_BATCH_SIZE,
                limit: select.limit,
            };
        }
        ProcessorPlan::None
    } else if !aggregate_locally {
        ProcessorPlan::Passthrough {
            batch_size: PASSTHROUGH_BATCH_SIZE,
        }
    } else {
        ProcessorPlan::None
    }
}
