//! Cluster-facing seams: users, the shard catalog, and peer handles
//!
//! Cluster membership, the shard catalog, and replica placement live
//! outside this crate. The coordinator consumes them through the traits
//! defined here; implementations are expected to be internally synchronized
//! (the catalog is read-mostly).

use crate::error::Result;
use crate::protocol::{Response, WriteRequest};
use crate::query::{ContinuousQuery, QuerySpec};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

// =============================================================================
// Users and permissions
// =============================================================================

/// A series-name matcher scoping a user's write access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matcher {
    /// Whether `pattern` is a regular expression
    pub is_regex: bool,
    /// Literal name or regex source
    pub pattern: String,
}

impl Matcher {
    /// Matcher for an exact series name
    pub fn literal(name: impl Into<String>) -> Self {
        Self {
            is_regex: false,
            pattern: name.into(),
        }
    }

    /// Matcher for a series-name regex
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            is_regex: true,
            pattern: pattern.into(),
        }
    }

    /// Whether the matcher covers a series name
    ///
    /// An invalid regex matches nothing.
    pub fn matches(&self, series: &str) -> bool {
        if self.is_regex {
            Regex::new(&self.pattern)
                .map(|r| r.is_match(series))
                .unwrap_or(false)
        } else {
            self.pattern == series
        }
    }
}

/// The identity a request runs as
///
/// Capability bits are resolved when the user authenticates and stay
/// immutable for the duration of a single request.
#[derive(Debug, Clone)]
pub struct User {
    name: String,
    db: Option<String>,
    is_cluster_admin: bool,
    is_db_admin: bool,
    write_matchers: Vec<Matcher>,
}

impl User {
    /// A cluster administrator
    pub fn cluster_admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db: None,
            is_cluster_admin: true,
            is_db_admin: false,
            write_matchers: Vec::new(),
        }
    }

    /// A database user with the given write scope
    pub fn db_user(
        name: impl Into<String>,
        db: impl Into<String>,
        is_db_admin: bool,
        write_matchers: Vec<Matcher>,
    ) -> Self {
        Self {
            name: name.into(),
            db: Some(db.into()),
            is_cluster_admin: false,
            is_db_admin,
            write_matchers,
        }
    }

    /// The user's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database the user belongs to; `None` for cluster admins
    pub fn db(&self) -> Option<&str> {
        self.db.as_deref()
    }

    /// Whether the user administers the whole cluster
    pub fn is_cluster_admin(&self) -> bool {
        self.is_cluster_admin
    }

    /// Whether the user administers the given database
    pub fn is_db_admin(&self, db: &str) -> bool {
        self.is_cluster_admin || (self.is_db_admin && self.db.as_deref() == Some(db))
    }

    /// Whether the user's write scope covers a series name
    pub fn has_write_access(&self, series: &str) -> bool {
        self.is_cluster_admin || self.write_matchers.iter().any(|m| m.matches(series))
    }
}

/// A database user record as stored in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbUser {
    /// Username
    pub name: String,
    /// Owning database
    pub db: String,
    /// Password hash; plaintext never reaches the catalog or the log
    pub hash: String,
    /// Whether the user administers its database
    pub is_admin: bool,
    /// Soft-delete flag; deleted users persist so that credential caches
    /// invalidate deterministically
    pub is_deleted: bool,
    /// Series the user may write to
    pub write_matchers: Vec<Matcher>,
}

impl DbUser {
    /// The request identity this record resolves to
    pub fn to_user(&self) -> User {
        User::db_user(
            self.name.clone(),
            self.db.clone(),
            self.is_admin,
            self.write_matchers.clone(),
        )
    }
}

/// A cluster administrator record as stored in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAdmin {
    /// Username
    pub name: String,
    /// Password hash
    pub hash: String,
    /// Soft-delete flag
    pub is_deleted: bool,
}

/// Catalog entry describing a database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Database name
    pub name: String,
    /// Replication factor
    pub replication_factor: u8,
}

// =============================================================================
// Shards
// =============================================================================

/// Unique identifier for a shard
pub type ShardId = u32;

/// Shard tiering by age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardTier {
    /// Serves recent data
    Short,
    /// Archival
    Long,
}

/// Time window covered by a shard, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    pub start: i64,
    /// Exclusive end
    pub end: i64,
}

impl TimeRange {
    /// Whether a timestamp falls inside the window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Handle to one shard: a contiguous time range of series hosted on a
/// replica set
///
/// `query` streams responses into the provided channel and finishes with a
/// terminal response ([`Response::is_terminal`]); errors travel in-band in
/// the terminal response's message. The channel is bounded with the
/// capacity this shard reported from [`ShardPeer::query_buffer_size`], so a
/// slow consumer throttles the producing shard.
#[async_trait]
pub trait ShardPeer: Send + Sync {
    /// Shard id
    fn id(&self) -> ShardId;

    /// Shard tier
    fn tier(&self) -> ShardTier;

    /// Time window the shard covers
    fn time_range(&self) -> TimeRange;

    /// Server ids hosting replicas of this shard
    fn replica_ids(&self) -> Vec<u32>;

    /// Whether the shard can fully aggregate this query locally
    fn should_aggregate_locally(&self, spec: &QuerySpec) -> bool;

    /// Response-channel capacity for this query
    fn query_buffer_size(&self, spec: &QuerySpec, point_batch_size: usize) -> usize;

    /// Execute a query, streaming responses into `out` until a terminal
    /// response has been sent
    async fn query(&self, spec: Arc<QuerySpec>, out: mpsc::Sender<Response>);

    /// Write a batch of points
    async fn write(&self, request: WriteRequest) -> Result<()>;

    /// Drop a database's data from this shard
    async fn drop_database(&self, db: &str, force: bool) -> Result<()>;
}

// =============================================================================
// Catalog and peers
// =============================================================================

/// Handle to another coordinator node in the cluster
#[async_trait]
pub trait ClusterPeer: Send + Sync {
    /// The peer's protocol address
    fn address(&self) -> &str;

    /// Open the connection to the peer
    async fn connect(&self) -> Result<()>;
}

/// The shard catalog and identity store
///
/// Read-mostly and internally synchronized; the continuous-query table is
/// reloaded by the implementation after any mutation commits.
pub trait ClusterCatalog: Send + Sync {
    /// Time-windowed shard cover for a query, in catalog order
    fn shards_for_query(&self, spec: &QuerySpec) -> Vec<Arc<dyn ShardPeer>>;

    /// Short-term shards in catalog order
    fn short_term_shards(&self) -> Vec<Arc<dyn ShardPeer>>;

    /// Long-term shards in catalog order
    fn long_term_shards(&self) -> Vec<Arc<dyn ShardPeer>>;

    /// Every shard in the cluster
    fn all_shards(&self) -> Vec<Arc<dyn ShardPeer>>;

    /// The shard that owns writes for `(db, series)` at `timestamp`
    fn shard_for_write(
        &self,
        db: &str,
        series: &str,
        timestamp: i64,
    ) -> Result<Arc<dyn ShardPeer>>;

    /// Parsed continuous queries registered for a database
    fn parsed_continuous_queries(&self, db: &str) -> Vec<ContinuousQuery>;

    /// Raw continuous-query records for listing
    fn continuous_queries(&self, db: &str) -> Vec<ContinuousQuery>;

    /// All databases
    fn databases(&self) -> Vec<DatabaseInfo>;

    /// Look up a database user
    fn db_user(&self, db: &str, name: &str) -> Option<DbUser>;

    /// All users of a database, soft-deleted ones included
    fn db_users(&self, db: &str) -> Vec<DbUser>;

    /// Look up a cluster admin
    fn cluster_admin(&self, name: &str) -> Option<ClusterAdmin>;

    /// Names of all cluster admins
    fn cluster_admins(&self) -> Vec<String>;

    /// Verify a database user's credentials
    fn authenticate_db_user(&self, db: &str, name: &str, password: &str) -> Result<User>;

    /// Verify a cluster admin's credentials
    fn authenticate_cluster_admin(&self, name: &str, password: &str) -> Result<User>;

    /// Take a catalog checkpoint (used before destructive operations)
    fn create_checkpoint(&self) -> Result<()>;

    /// Other coordinator nodes in the cluster
    fn peers(&self) -> Vec<Arc<dyn ClusterPeer>>;
}

/// External password hashing primitive
///
/// Hashing happens before any credential enters the replicated log, so the
/// log never sees a plaintext password.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password
    fn hash(&self, plaintext: &str) -> Result<String>;
}
