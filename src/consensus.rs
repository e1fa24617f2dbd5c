//! Metadata replication seam
//!
//! Every catalog mutation routes through [`Consensus`] so it replicates to
//! the whole cluster before taking effect. The implementation is expected
//! to serialize its own writes; calls may block until the mutation commits
//! or the implementation's own timeout fires.

use crate::cluster::{ClusterAdmin, DbUser};
use crate::error::Result;
use async_trait::async_trait;

/// Replicated-log interface for metadata mutations
#[async_trait]
pub trait Consensus: Send + Sync {
    /// Name of the local consensus server, for logging
    fn name(&self) -> &str;

    /// Create a database
    async fn create_database(&self, db: &str, replication_factor: u8) -> Result<()>;

    /// Drop a database from the catalog
    async fn drop_database(&self, db: &str) -> Result<()>;

    /// Create or update a database user record
    async fn save_db_user(&self, user: &DbUser) -> Result<()>;

    /// Create or update a cluster admin record
    async fn save_cluster_admin(&self, user: &ClusterAdmin) -> Result<()>;

    /// Replace a database user's password hash
    async fn change_db_user_password(&self, db: &str, name: &str, hash: &str) -> Result<()>;

    /// Register a continuous query from its raw statement text
    async fn create_continuous_query(&self, db: &str, query: &str) -> Result<()>;

    /// Remove a continuous query by id
    async fn delete_continuous_query(&self, db: &str, id: u32) -> Result<()>;

    /// Force a compaction of the replicated log
    async fn force_log_compaction(&self) -> Result<()>;
}
