//! Bounded fan-out of shard queries
//!
//! Runs the shard cover of one statement with a concurrency cap, reading
//! results in catalog order so the sink sees a deterministic sequence
//! regardless of shard completion times.

use super::planner::{self, ProcessorPlan};
use super::{pipeline, selector, Coordinator, SinkHandle};
use crate::cluster::ShardPeer;
use crate::engine::{PassthroughEngine, ProcessorFactory, QueryProcessor};
use crate::error::{CoordinatorError, Result};
use crate::protocol::{Response, ResponseKind};
use crate::query::QuerySpec;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

impl Coordinator {
    /// Run one statement's shard fan-out
    ///
    /// Scheduling rules:
    /// - at most `concurrent_shard_query_limit` shard queries run at once,
    ///   clamped to 1 when any shard streams raw points (sequential
    ///   draining keeps memory bounded);
    /// - shards are consumed in catalog order, not arrival order;
    /// - when a shard's stream ends, the next unstarted shard is launched
    ///   only while the processor still wants data (a `false` yield stops
    ///   new launches; in-flight shards are still drained);
    /// - the first shard error becomes the call's error, later ones are
    ///   logged and discarded.
    pub(crate) async fn run_query_spec(&self, mut spec: QuerySpec, sink: &SinkHandle) -> Result<()> {
        let shards = selector::select_shards(self.catalog.as_ref(), &mut spec);
        let aggregate_locally = shards.iter().all(|s| s.should_aggregate_locally(&spec));
        let plan = planner::plan_processor(&spec, aggregate_locally);
        let spec = Arc::new(spec);

        let mut processor: Option<Box<dyn QueryProcessor>> = None;
        let mut drainer = None;
        if plan != ProcessorPlan::None {
            let (tx, rx) = mpsc::channel(1);
            let built: Box<dyn QueryProcessor> = match plan {
                ProcessorPlan::Passthrough { batch_size } => {
                    Box::new(PassthroughEngine::new(tx, batch_size))
                }
                ProcessorPlan::LimitedPassthrough { batch_size, limit } => {
                    Box::new(PassthroughEngine::with_limit(tx, batch_size, limit))
                }
                ProcessorPlan::Engine => {
                    let select = spec.select_query().ok_or_else(|| {
                        CoordinatorError::invalid_argument(
                            "coordinator aggregation requires a select query",
                        )
                    })?;
                    self.processors.query_engine(select, tx)?
                }
                ProcessorPlan::None => unreachable!("guarded by the plan check above"),
            };
            processor = Some(built);
            drainer = Some(pipeline::spawn_sink_drainer(
                Arc::clone(&spec),
                sink.clone(),
                rx,
            ));
        }

        let mut concurrency = self.config.concurrent_shard_query_limit.max(1);
        if !aggregate_locally {
            debug!("querying shards sequentially");
            concurrency = 1;
        }
        debug!(concurrency, shards = shards.len(), "shard fan-out starting");

        let total = shards.len();
        let mut receivers: Vec<Option<mpsc::Receiver<Response>>> = Vec::with_capacity(total);
        receivers.resize_with(total, || None);
        let started = concurrency.min(total);
        for (index, shard) in shards.iter().take(started).enumerate() {
            receivers[index] = Some(pipeline::open_shard_stream(shard, &spec, &self.config));
        }
        let mut next_index = started;
        let mut should_continue = true;
        let mut first_error: Option<CoordinatorError> = None;

        for index in 0..total {
            let Some(mut responses) = receivers[index].take() else {
                // Scheduling stopped before this shard was started.
                break;
            };
            debug!(shard = shards[index].id(), "reading shard responses");
            while let Some(response) = responses.recv().await {
                if response.is_terminal() {
                    if let Some(message) = response.error_message {
                        if first_error.is_none() {
                            first_error = Some(CoordinatorError::InvalidArgument(message));
                        } else {
                            warn!(
                                shard = shards[index].id(),
                                error = %message,
                                "discarding subsequent shard error"
                            );
                        }
                    }
                    if next_index < total && should_continue {
                        debug!(shard = shards[next_index].id(), "scheduling next shard");
                        receivers[next_index] = Some(pipeline::open_shard_stream(
                            &shards[next_index],
                            &spec,
                            &self.config,
                        ));
                        next_index += 1;
                    }
                    break;
                }

                let kind = response.kind;
                let Some(series) = response.series else {
                    continue;
                };
                if series.points.is_empty() {
                    continue;
                }

                if let Some(processor) = processor.as_mut() {
                    should_continue = processor.yield_series(series).await;
                    continue;
                }

                // No processor: the shard aggregated locally. Forward
                // directly, suppressing raw data of an EXPLAIN.
                if !(kind == ResponseKind::Query && spec.is_explain()) {
                    if let Err(error) = sink.write(series).await {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                }
            }
            debug!(shard = shards[index].id(), "shard drained");
        }

        if let Some(mut processor) = processor {
            processor.close().await;
            if let Some(drainer) = drainer {
                // The drainer closes the sink once it has seen the
                // processor's terminal response.
                if let Ok(sink_error) = drainer.await {
                    if first_error.is_none() {
                        first_error = sink_error;
                    }
                }
            }
        } else {
            sink.close().await;
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
