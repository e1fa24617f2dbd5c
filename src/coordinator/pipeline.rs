//! Response pipeline plumbing
//!
//! Owns the channel between one shard and the fan-out consumer, and the
//! drainer task that moves processor output into the caller's sink.

use super::SinkHandle;
use crate::cluster::ShardPeer;
use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::protocol::{Response, ResponseKind};
use crate::query::QuerySpec;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Start one shard query on its own task, returning the receive side of
/// its bounded response channel
///
/// The channel capacity comes from the shard itself
/// ([`ShardPeer::query_buffer_size`]), so a consumer that falls behind
/// throttles the producing shard instead of buffering without bound.
pub(crate) fn open_shard_stream(
    shard: &Arc<dyn ShardPeer>,
    spec: &Arc<QuerySpec>,
    config: &CoordinatorConfig,
) -> mpsc::Receiver<Response> {
    let capacity = shard
        .query_buffer_size(spec, config.point_batch_size)
        .max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let shard = Arc::clone(shard);
    let spec = Arc::clone(spec);
    tokio::spawn(async move {
        shard.query(spec, tx).await;
    });
    rx
}

/// Spawn the task that drains processor output into the sink
///
/// The task forwards non-empty series until it sees a terminal response,
/// then closes the sink and resolves the returned future with the first
/// sink error, if any. Sink errors never stop the drain: in-flight shards
/// keep their bounded buffers moving until their streams end.
pub(crate) fn spawn_sink_drainer(
    spec: Arc<QuerySpec>,
    sink: SinkHandle,
    mut responses: mpsc::Receiver<Response>,
) -> oneshot::Receiver<Option<CoordinatorError>> {
    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut sink_error: Option<CoordinatorError> = None;
        while let Some(response) = responses.recv().await {
            if response.is_terminal() {
                break;
            }
            // Raw data of an EXPLAIN is suppressed; only the plan output
            // reaches the caller.
            if response.kind == ResponseKind::Query && spec.is_explain() {
                continue;
            }
            let Some(series) = response.series else {
                continue;
            };
            if series.points.is_empty() {
                continue;
            }
            if let Err(error) = sink.write(series).await {
                warn!(%error, "sink rejected series; continuing to drain");
                if sink_error.is_none() {
                    sink_error = Some(error);
                }
            }
        }
        sink.close().await;
        let _ = done_tx.send(sink_error);
    });
    done_rx
}
