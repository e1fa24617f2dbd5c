//! Shared mock collaborators for coordinator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempo_coordinator::cluster::{
    ClusterAdmin, ClusterCatalog, ClusterPeer, DatabaseInfo, DbUser, ShardPeer, ShardTier,
    TimeRange, User,
};
use tempo_coordinator::cluster::CredentialHasher;
use tempo_coordinator::consensus::Consensus;
use tempo_coordinator::engine::{PassthroughEngine, ProcessorFactory, QueryProcessor};
use tempo_coordinator::query::{ContinuousQuery, Query, QueryParser, QuerySpec, SelectQuery};
use tempo_coordinator::{
    Coordinator, CoordinatorBuilder, CoordinatorConfig, CoordinatorError, FieldValue, Point,
    Response, Result, Series, SeriesWriter, WriteRequest,
};
use tokio::sync::mpsc;

// =============================================================================
// Series helpers
// =============================================================================

/// Build a one-field series from `(timestamp, value)` pairs
pub fn series(name: &str, points: &[(i64, f64)]) -> Series {
    let points = points
        .iter()
        .map(|(ts, v)| Point::new(*ts, vec![FieldValue::Float(*v)]))
        .collect();
    Series::new(name, vec!["value".to_string()], points)
}

/// A select spec statement with the given limit (0 = unlimited)
pub fn select_statement(limit: usize) -> Query {
    Query::Select(SelectQuery {
        limit,
        ..Default::default()
    })
}

// =============================================================================
// Concurrency tracking
// =============================================================================

/// Tracks how many shard queries run at once across a mock fleet
#[derive(Default)]
pub struct ConcurrencyGauge {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Mock shard
// =============================================================================

pub struct MockShard {
    pub id: u32,
    pub tier: ShardTier,
    pub range: TimeRange,
    pub aggregate_locally: bool,
    pub responses: Vec<Response>,
    pub delay: Option<Duration>,
    pub drop_delay: Option<Duration>,
    pub write_error: Option<String>,
    pub fail_series: Option<String>,
    pub queries_started: AtomicUsize,
    pub writes: Mutex<Vec<WriteRequest>>,
    pub dropped_databases: Mutex<Vec<String>>,
    pub gauge: Option<Arc<ConcurrencyGauge>>,
}

impl MockShard {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            tier: ShardTier::Short,
            range: TimeRange {
                start: i64::MIN,
                end: i64::MAX,
            },
            aggregate_locally: true,
            responses: vec![Response::end_stream()],
            delay: None,
            drop_delay: None,
            write_error: None,
            fail_series: None,
            queries_started: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            dropped_databases: Mutex::new(Vec::new()),
            gauge: None,
        }
    }

    /// A shard that streams the given series then a clean end-of-stream
    pub fn streaming(id: u32, batches: Vec<Series>) -> Self {
        let mut responses: Vec<Response> = batches.into_iter().map(Response::query).collect();
        responses.push(Response::end_stream());
        Self::new(id).with_responses(responses)
    }

    pub fn with_responses(mut self, responses: Vec<Response>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_tier(mut self, tier: ShardTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_range(mut self, start: i64, end: i64) -> Self {
        self.range = TimeRange { start, end };
        self
    }

    /// Shard streams raw, unaggregated points
    pub fn raw_points(mut self) -> Self {
        self.aggregate_locally = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_drop_delay(mut self, delay: Duration) -> Self {
        self.drop_delay = Some(delay);
        self
    }

    pub fn with_write_error(mut self, message: &str) -> Self {
        self.write_error = Some(message.to_string());
        self
    }

    /// Fail writes only for the named series
    pub fn with_failing_series(mut self, name: &str) -> Self {
        self.fail_series = Some(name.to_string());
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn queries_started(&self) -> usize {
        self.queries_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardPeer for MockShard {
    fn id(&self) -> u32 {
        self.id
    }

    fn tier(&self) -> ShardTier {
        self.tier
    }

    fn time_range(&self) -> TimeRange {
        self.range
    }

    fn replica_ids(&self) -> Vec<u32> {
        vec![1]
    }

    fn should_aggregate_locally(&self, _spec: &QuerySpec) -> bool {
        self.aggregate_locally
    }

    fn query_buffer_size(&self, _spec: &QuerySpec, point_batch_size: usize) -> usize {
        point_batch_size.max(1)
    }

    async fn query(&self, _spec: Arc<QuerySpec>, out: mpsc::Sender<Response>) {
        self.queries_started.fetch_add(1, Ordering::SeqCst);
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for response in &self.responses {
            if out.send(response.clone()).await.is_err() {
                break;
            }
        }
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }
    }

    async fn write(&self, request: WriteRequest) -> Result<()> {
        if let Some(message) = &self.write_error {
            return Err(CoordinatorError::upstream(message.clone()));
        }
        if self.fail_series.as_deref() == Some(request.series.name.as_str()) {
            return Err(CoordinatorError::upstream("series write rejected"));
        }
        self.writes.lock().push(request);
        Ok(())
    }

    async fn drop_database(&self, db: &str, _force: bool) -> Result<()> {
        if let Some(delay) = self.drop_delay {
            tokio::time::sleep(delay).await;
        }
        self.dropped_databases.lock().push(db.to_string());
        Ok(())
    }
}

// =============================================================================
// Mock peer
// =============================================================================

pub struct MockPeer {
    pub address: String,
    pub connects: AtomicUsize,
}

impl MockPeer {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterPeer for MockPeer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Mock catalog
// =============================================================================

#[derive(Default)]
pub struct MockCatalog {
    pub shards: Vec<Arc<MockShard>>,
    pub continuous: Mutex<Vec<ContinuousQuery>>,
    pub databases: Mutex<Vec<DatabaseInfo>>,
    pub db_users: Mutex<HashMap<(String, String), DbUser>>,
    pub cluster_admins: Mutex<HashMap<String, ClusterAdmin>>,
    pub checkpoints: AtomicUsize,
    pub peer_list: Vec<Arc<MockPeer>>,
}

impl MockCatalog {
    pub fn with_shards(shards: Vec<MockShard>) -> Arc<Self> {
        Arc::new(Self {
            shards: shards.into_iter().map(Arc::new).collect(),
            ..Default::default()
        })
    }

    pub fn register_continuous_query(&self, query: ContinuousQuery) {
        self.continuous.lock().push(query);
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.load(Ordering::SeqCst)
    }
}

impl ClusterCatalog for MockCatalog {
    fn shards_for_query(&self, _spec: &QuerySpec) -> Vec<Arc<dyn ShardPeer>> {
        self.shards
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ShardPeer>)
            .collect()
    }

    fn short_term_shards(&self) -> Vec<Arc<dyn ShardPeer>> {
        self.shards
            .iter()
            .filter(|s| s.tier == ShardTier::Short)
            .map(|s| Arc::clone(s) as Arc<dyn ShardPeer>)
            .collect()
    }

    fn long_term_shards(&self) -> Vec<Arc<dyn ShardPeer>> {
        self.shards
            .iter()
            .filter(|s| s.tier == ShardTier::Long)
            .map(|s| Arc::clone(s) as Arc<dyn ShardPeer>)
            .collect()
    }

    fn all_shards(&self) -> Vec<Arc<dyn ShardPeer>> {
        self.shards
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ShardPeer>)
            .collect()
    }

    fn shard_for_write(
        &self,
        _db: &str,
        _series: &str,
        timestamp: i64,
    ) -> Result<Arc<dyn ShardPeer>> {
        self.shards
            .iter()
            .find(|s| s.range.contains(timestamp))
            .map(|s| Arc::clone(s) as Arc<dyn ShardPeer>)
            .ok_or_else(|| {
                CoordinatorError::upstream(format!("no shard covers timestamp {}", timestamp))
            })
    }

    fn parsed_continuous_queries(&self, db: &str) -> Vec<ContinuousQuery> {
        self.continuous
            .lock()
            .iter()
            .filter(|q| q.db == db)
            .cloned()
            .collect()
    }

    fn continuous_queries(&self, db: &str) -> Vec<ContinuousQuery> {
        self.parsed_continuous_queries(db)
    }

    fn databases(&self) -> Vec<DatabaseInfo> {
        self.databases.lock().clone()
    }

    fn db_user(&self, db: &str, name: &str) -> Option<DbUser> {
        self.db_users
            .lock()
            .get(&(db.to_string(), name.to_string()))
            .cloned()
    }

    fn db_users(&self, db: &str) -> Vec<DbUser> {
        self.db_users
            .lock()
            .values()
            .filter(|u| u.db == db)
            .cloned()
            .collect()
    }

    fn cluster_admin(&self, name: &str) -> Option<ClusterAdmin> {
        self.cluster_admins.lock().get(name).cloned()
    }

    fn cluster_admins(&self) -> Vec<String> {
        self.cluster_admins.lock().keys().cloned().collect()
    }

    fn authenticate_db_user(&self, db: &str, name: &str, password: &str) -> Result<User> {
        match self.db_user(db, name) {
            Some(record) if !record.is_deleted && record.hash == format!("hashed:{}", password) => {
                Ok(record.to_user())
            }
            _ => Err(CoordinatorError::authorization("Invalid username/password")),
        }
    }

    fn authenticate_cluster_admin(&self, name: &str, password: &str) -> Result<User> {
        match self.cluster_admin(name) {
            Some(record) if !record.is_deleted && record.hash == format!("hashed:{}", password) => {
                Ok(User::cluster_admin(record.name))
            }
            _ => Err(CoordinatorError::authorization("Invalid username/password")),
        }
    }

    fn create_checkpoint(&self) -> Result<()> {
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn peers(&self) -> Vec<Arc<dyn ClusterPeer>> {
        self.peer_list
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn ClusterPeer>)
            .collect()
    }
}

// =============================================================================
// Mock consensus
// =============================================================================

/// Applies committed mutations straight into the shared mock catalog,
/// standing in for replication
pub struct MockConsensus {
    pub catalog: Arc<MockCatalog>,
    pub log: Mutex<Vec<String>>,
    next_cq_id: AtomicU32,
}

impl MockConsensus {
    pub fn new(catalog: Arc<MockCatalog>) -> Self {
        Self {
            catalog,
            log: Mutex::new(Vec::new()),
            next_cq_id: AtomicU32::new(1),
        }
    }

    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl Consensus for MockConsensus {
    fn name(&self) -> &str {
        "raft-1"
    }

    async fn create_database(&self, db: &str, replication_factor: u8) -> Result<()> {
        let mut databases = self.catalog.databases.lock();
        if databases.iter().any(|d| d.name == db) {
            return Err(CoordinatorError::already_exists(format!(
                "database {} exists",
                db
            )));
        }
        self.log.lock().push(format!("create_database {}", db));
        databases.push(DatabaseInfo {
            name: db.to_string(),
            replication_factor,
        });
        Ok(())
    }

    async fn drop_database(&self, db: &str) -> Result<()> {
        self.log.lock().push(format!("drop_database {}", db));
        self.catalog.databases.lock().retain(|d| d.name != db);
        Ok(())
    }

    async fn save_db_user(&self, user: &DbUser) -> Result<()> {
        self.log.lock().push(format!("save_db_user {}", user.name));
        self.catalog
            .db_users
            .lock()
            .insert((user.db.clone(), user.name.clone()), user.clone());
        Ok(())
    }

    async fn save_cluster_admin(&self, user: &ClusterAdmin) -> Result<()> {
        self.log
            .lock()
            .push(format!("save_cluster_admin {}", user.name));
        self.catalog
            .cluster_admins
            .lock()
            .insert(user.name.clone(), user.clone());
        Ok(())
    }

    async fn change_db_user_password(&self, db: &str, name: &str, hash: &str) -> Result<()> {
        self.log
            .lock()
            .push(format!("change_db_user_password {}", name));
        let mut users = self.catalog.db_users.lock();
        match users.get_mut(&(db.to_string(), name.to_string())) {
            Some(user) => {
                user.hash = hash.to_string();
                Ok(())
            }
            None => Err(CoordinatorError::not_found(format!(
                "Invalid username {}",
                name
            ))),
        }
    }

    async fn create_continuous_query(&self, db: &str, query: &str) -> Result<()> {
        self.log
            .lock()
            .push(format!("create_continuous_query {}", query));
        let id = self.next_cq_id.fetch_add(1, Ordering::SeqCst);
        self.catalog.continuous.lock().push(ContinuousQuery {
            id,
            db: db.to_string(),
            query: query.to_string(),
            from_patterns: vec![],
            into_target: String::new(),
            group_by: vec![],
        });
        Ok(())
    }

    async fn delete_continuous_query(&self, db: &str, id: u32) -> Result<()> {
        self.log
            .lock()
            .push(format!("delete_continuous_query {}", id));
        self.catalog
            .continuous
            .lock()
            .retain(|q| !(q.db == db && q.id == id));
        Ok(())
    }

    async fn force_log_compaction(&self) -> Result<()> {
        self.log.lock().push("force_log_compaction".to_string());
        Ok(())
    }
}

// =============================================================================
// Parser, hasher, processor factory
// =============================================================================

/// Parser that returns the same pre-built statements for any input
pub struct CannedParser {
    pub statements: Vec<Query>,
}

impl QueryParser for CannedParser {
    fn parse(&self, _query: &str) -> Result<Vec<Query>> {
        Ok(self.statements.clone())
    }
}

/// Parser that panics, for crash-shield coverage
pub struct PanickingParser;

impl QueryParser for PanickingParser {
    fn parse(&self, _query: &str) -> Result<Vec<Query>> {
        panic!("parser blew up");
    }
}

/// Transparent hash so tests can assert the plaintext never persists
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        Ok(format!("hashed:{}", plaintext))
    }
}

/// Factory whose "aggregation engine" is a plain passthrough
pub struct PassthroughFactory;

impl ProcessorFactory for PassthroughFactory {
    fn query_engine(
        &self,
        _query: &SelectQuery,
        out: mpsc::Sender<Response>,
    ) -> Result<Box<dyn QueryProcessor>> {
        Ok(Box::new(PassthroughEngine::new(out, 100)))
    }
}

// =============================================================================
// Collecting sink
// =============================================================================

/// Shared view of everything a sink received
#[derive(Clone, Default)]
pub struct SinkProbe {
    pub series: Arc<Mutex<Vec<Series>>>,
    pub closes: Arc<AtomicUsize>,
    pub fail_writes: bool,
}

impl SinkProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn sink(&self) -> Box<dyn SeriesWriter> {
        Box::new(CollectingSink {
            probe: self.clone(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.series.lock().iter().map(|s| s.name.clone()).collect()
    }

    pub fn total_points(&self) -> usize {
        self.series.lock().iter().map(|s| s.points.len()).sum()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct CollectingSink {
    probe: SinkProbe,
}

#[async_trait]
impl SeriesWriter for CollectingSink {
    async fn write(&mut self, series: Series) -> Result<()> {
        if self.probe.fail_writes {
            return Err(CoordinatorError::upstream("sink write failed"));
        }
        self.probe.series.lock().push(series);
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Coordinator wiring
// =============================================================================

pub fn build_coordinator(
    catalog: Arc<MockCatalog>,
    statements: Vec<Query>,
) -> (Coordinator, Arc<MockConsensus>) {
    build_coordinator_with_config(catalog, statements, CoordinatorConfig::default())
}

pub fn build_coordinator_with_config(
    catalog: Arc<MockCatalog>,
    statements: Vec<Query>,
    config: CoordinatorConfig,
) -> (Coordinator, Arc<MockConsensus>) {
    let consensus = Arc::new(MockConsensus::new(Arc::clone(&catalog)));
    let coordinator = CoordinatorBuilder::new()
        .with_config(config)
        .with_catalog(catalog)
        .with_consensus(Arc::clone(&consensus) as Arc<dyn Consensus>)
        .with_parser(Arc::new(CannedParser { statements }))
        .with_hasher(Arc::new(PlainHasher))
        .with_processor_factory(Arc::new(PassthroughFactory))
        .build()
        .expect("coordinator builds");
    (coordinator, consensus)
}
