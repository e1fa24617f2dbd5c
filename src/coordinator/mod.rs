//! The coordinator: accepts parsed queries and data batches, authorizes
//! them, fans work out to shards, and streams results to a caller-supplied
//! sink
//!
//! # Architecture
//!
//! ```text
//! query:  caller ──▶ authz ──▶ shard selection ──▶ aggregation planning
//!                                    │
//!                                    ▼
//!                          bounded fan-out over shards
//!                                    │
//!                                    ▼
//!                    response pipeline ──▶ (processor) ──▶ sink
//!
//! write:  caller ──▶ authz ──▶ write router ──▶ shards
//!                                    │
//!                                    ▼ (async, bounded)
//!                      continuous queries ──▶ write router
//! ```
//!
//! The coordinator owns no shared mutable state on the hot query path;
//! every call's bookkeeping is private to that call, and all cross-task
//! communication happens through bounded channels.

mod admin;
mod authz;
mod continuous;
mod fanout;
mod pipeline;
mod planner;
mod selector;
mod shield;
mod write_router;

use crate::cluster::{ClusterCatalog, ClusterPeer, CredentialHasher, ShardPeer, User};
use crate::config::CoordinatorConfig;
use crate::consensus::Consensus;
use crate::engine::ProcessorFactory;
use crate::error::{CoordinatorError, Result};
use crate::protocol::Series;
use crate::query::{Query, QueryParser, QuerySpec};
use async_trait::async_trait;
use self::continuous::ContinuousQueryRunner;
use self::write_router::WriteRouter;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Caller-supplied sink receiving final query output
#[async_trait]
pub trait SeriesWriter: Send {
    /// Deliver one series to the caller
    async fn write(&mut self, series: Series) -> Result<()>;

    /// Signal that no more series will arrive
    async fn close(&mut self);
}

/// Close-once guard around a [`SeriesWriter`]
///
/// Every exit path of a query (success, first error, contained panic)
/// closes the sink through this handle; only the first close reaches the
/// underlying writer, so the sink observes exactly one `close()` per call.
#[derive(Clone)]
pub struct SinkHandle {
    inner: Arc<Mutex<SinkState>>,
}

struct SinkState {
    writer: Box<dyn SeriesWriter>,
    closed: bool,
}

impl SinkHandle {
    /// Take scoped ownership of a sink
    pub fn new(writer: Box<dyn SeriesWriter>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                writer,
                closed: false,
            })),
        }
    }

    /// Forward a series to the sink; a write after close is dropped
    pub async fn write(&self, series: Series) -> Result<()> {
        let mut state = self.inner.lock().await;
        if state.closed {
            return Ok(());
        }
        state.writer.write(series).await
    }

    /// Close the sink; only the first call reaches the writer
    pub async fn close(&self) {
        let mut state = self.inner.lock().await;
        if !state.closed {
            state.closed = true;
            state.writer.close().await;
        }
    }
}

/// The query/write coordinator for one cluster node
///
/// Holds handles to the external collaborators (catalog, consensus, parser,
/// hasher, processor factory) and the tuning knobs it consumes. All public
/// operations authorize at entry and propagate the first upstream error.
pub struct Coordinator {
    pub(crate) config: CoordinatorConfig,
    pub(crate) catalog: Arc<dyn ClusterCatalog>,
    pub(crate) consensus: Arc<dyn Consensus>,
    pub(crate) parser: Arc<dyn QueryParser>,
    pub(crate) hasher: Arc<dyn CredentialHasher>,
    pub(crate) processors: Arc<dyn ProcessorFactory>,
    pub(crate) router: WriteRouter,
    pub(crate) continuous: ContinuousQueryRunner,
}

/// Builder wiring a [`Coordinator`] to its collaborators
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    catalog: Option<Arc<dyn ClusterCatalog>>,
    consensus: Option<Arc<dyn Consensus>>,
    parser: Option<Arc<dyn QueryParser>>,
    hasher: Option<Arc<dyn CredentialHasher>>,
    processors: Option<Arc<dyn ProcessorFactory>>,
}

impl CoordinatorBuilder {
    /// Start a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coordinator configuration
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the shard catalog
    pub fn with_catalog(mut self, catalog: Arc<dyn ClusterCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the consensus handle
    pub fn with_consensus(mut self, consensus: Arc<dyn Consensus>) -> Self {
        self.consensus = Some(consensus);
        self
    }

    /// Set the query parser
    pub fn with_parser(mut self, parser: Arc<dyn QueryParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Set the password hashing primitive
    pub fn with_hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Set the aggregation-engine factory
    pub fn with_processor_factory(mut self, processors: Arc<dyn ProcessorFactory>) -> Self {
        self.processors = Some(processors);
        self
    }

    /// Build the coordinator; fails when a collaborator is missing
    pub fn build(self) -> Result<Coordinator> {
        let catalog = self
            .catalog
            .ok_or_else(|| CoordinatorError::invalid_argument("a cluster catalog is required"))?;
        let consensus = self
            .consensus
            .ok_or_else(|| CoordinatorError::invalid_argument("a consensus handle is required"))?;
        let parser = self
            .parser
            .ok_or_else(|| CoordinatorError::invalid_argument("a query parser is required"))?;
        let hasher = self
            .hasher
            .ok_or_else(|| CoordinatorError::invalid_argument("a password hasher is required"))?;
        let processors = self.processors.ok_or_else(|| {
            CoordinatorError::invalid_argument("a processor factory is required")
        })?;

        let router = WriteRouter::new(Arc::clone(&catalog));
        let continuous = ContinuousQueryRunner::new(Arc::clone(&catalog), router.clone());
        Ok(Coordinator {
            config: self.config,
            catalog,
            consensus,
            parser,
            hasher,
            processors,
            router,
            continuous,
        })
    }
}

impl Coordinator {
    /// Execute a query string and stream results into `sink`
    ///
    /// The string may contain several statements; delete, drop, and list
    /// statements run in sequence against the same sink, while a select
    /// finishes the call. On every exit path (success, first error, or
    /// contained panic) the sink is closed exactly once.
    pub async fn run_query(
        &self,
        user: &User,
        database: &str,
        query_string: &str,
        sink: Box<dyn SeriesWriter>,
    ) -> Result<()> {
        debug!(database, query = query_string, "running query");
        let sink = SinkHandle::new(sink);
        let result = shield::guarded(
            database,
            query_string,
            self.run_statements(user, database, query_string, &sink),
        )
        .await;
        // No-op when a statement path already closed it.
        sink.close().await;
        result
    }

    async fn run_statements(
        &self,
        user: &User,
        database: &str,
        query_string: &str,
        sink: &SinkHandle,
    ) -> Result<()> {
        let queries = self.parser.parse(query_string)?;
        for query in queries {
            match query {
                Query::Delete(delete) => {
                    authz::check(user, authz::Action::DeleteSeries { db: database })?;
                    let spec = QuerySpec::new(user.clone(), database, Query::Delete(delete));
                    self.run_query_spec(spec, sink).await?;
                }
                Query::DropContinuousQuery(id) => {
                    self.delete_continuous_query(user, database, id).await?;
                }
                Query::ListSeries => {
                    let spec = QuerySpec::new(user.clone(), database, Query::ListSeries);
                    self.run_list_series(spec, sink).await?;
                }
                Query::ListContinuousQueries => {
                    for series in self.list_continuous_queries(user, database).await? {
                        sink.write(series).await?;
                    }
                }
                Query::DropSeries(drop) => {
                    authz::check(
                        user,
                        authz::Action::DropSeries {
                            db: database,
                            series: &drop.table,
                        },
                    )?;
                    let spec = QuerySpec::new(user.clone(), database, Query::DropSeries(drop));
                    self.run_query_spec(spec, sink).await?;
                }
                Query::CreateContinuous(statement) => {
                    return self
                        .create_continuous_query(user, database, &statement)
                        .await;
                }
                Query::Select(select) => {
                    let spec = QuerySpec::new(user.clone(), database, Query::Select(select));
                    return self.run_query_spec(spec, sink).await;
                }
            }
        }
        Ok(())
    }

    /// List series across the capped shard set, deduplicating by name
    ///
    /// Shards are drained one at a time. Stream errors on this path are
    /// logged and never surfaced to the caller.
    async fn run_list_series(&self, mut spec: QuerySpec, sink: &SinkHandle) -> Result<()> {
        let shards = selector::select_shards(self.catalog.as_ref(), &mut spec);
        let spec = Arc::new(spec);
        let mut yielded: HashSet<String> = HashSet::new();

        for shard in shards {
            let mut stream = pipeline::open_shard_stream(&shard, &spec, &self.config);
            while let Some(response) = stream.recv().await {
                if response.is_terminal() {
                    if let Some(message) = response.error_message {
                        debug!(shard = shard.id(), error = %message, "error when querying shard");
                    }
                    break;
                }
                let Some(series) = response.series else { continue };
                if yielded.insert(series.name.clone()) {
                    sink.write(series).await?;
                }
            }
        }
        Ok(())
    }

    /// Accept a data batch: route its points to the owning shards, then
    /// feed matching continuous queries
    ///
    /// Points already accepted by earlier shards are not rolled back when a
    /// later shard write fails; write atomicity is a storage-layer concern.
    pub async fn write_series_data(&self, user: &User, db: &str, series: Series) -> Result<()> {
        authz::check(
            user,
            authz::Action::WriteSeries {
                db,
                series: &series.name,
            },
        )?;
        if series.points.is_empty() {
            return Err(CoordinatorError::invalid_argument(
                "Can't write series with zero points.",
            ));
        }

        let series = self.router.commit_series(db, series).await?;
        self.continuous.process_write(db, &series).await;
        Ok(())
    }

    /// Connect to every peer coordinator whose address is not the local one
    pub async fn connect_to_peers(&self, local_address: &str) -> Result<()> {
        info!("connecting to other nodes in the cluster");
        for peer in self.catalog.peers() {
            if peer.address() == local_address {
                continue;
            }
            if let Err(error) = peer.connect().await {
                warn!(address = peer.address(), %error, "failed to connect to peer");
            }
        }
        Ok(())
    }
}
