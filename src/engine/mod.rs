//! Query processors inserted between the shard streams and the sink
//!
//! A processor consumes series yielded by the fan-out consumer loop and
//! emits responses into its output channel, which a drainer task forwards
//! to the caller's sink. Three shapes exist:
//!
//! - the full aggregation engine, built by an external
//!   [`ProcessorFactory`] when shards return raw points;
//! - [`PassthroughEngine`], which batches series without aggregating;
//! - its limit-aware variant, which additionally stops the fan-out once
//!   the LIMIT has been satisfied.
//!
//! All three honor the same contract: `yield_series` returns `false` when
//! no more data is wanted (a soft cancellation the scheduler reacts to by
//! not starting further shards), and `close` flushes buffered data and
//! finishes the output stream with a terminal END_STREAM response.

mod passthrough;

pub use passthrough::PassthroughEngine;

use crate::error::Result;
use crate::protocol::{Response, Series};
use crate::query::SelectQuery;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Streaming stage between shard responses and the sink
#[async_trait]
pub trait QueryProcessor: Send {
    /// Feed one series through the stage
    ///
    /// Returns `false` when the stage wants no more data; the caller should
    /// stop scheduling new producers but may keep draining in-flight ones.
    async fn yield_series(&mut self, series: Series) -> bool;

    /// Flush buffered data and terminate the output stream
    async fn close(&mut self);
}

/// Factory for the full aggregation engine
///
/// Used when shards cannot aggregate locally and raw points must be
/// aggregated at the coordinator. The engine writes its output (and a
/// final terminal response) into `out`, like any other processor.
pub trait ProcessorFactory: Send + Sync {
    /// Build an aggregation engine for a SELECT query
    fn query_engine(
        &self,
        query: &SelectQuery,
        out: mpsc::Sender<Response>,
    ) -> Result<Box<dyn QueryProcessor>>;
}
