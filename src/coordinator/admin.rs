//! Administrative operations
//!
//! Database, user, and continuous-query CRUD. Every mutation routes
//! through [`Consensus`](crate::consensus::Consensus) so it replicates;
//! the catalog only reflects a mutation once it has committed. Users are
//! soft-deleted: the record persists with its deleted flag set so that
//! credential caches invalidate deterministically.

use super::{authz, Coordinator};
use crate::cluster::{
    ClusterAdmin, ClusterCatalog, CredentialHasher, DatabaseInfo, DbUser, Matcher, ShardPeer, User,
};
use crate::consensus::Consensus;
use crate::error::{CoordinatorError, Result};
use crate::protocol::{FieldValue, Point, Series};
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

lazy_static! {
    /// Usernames and database names must match this
    static ref VALID_NAMES: Regex =
        Regex::new("^[A-Za-z0-9_][A-Za-z0-9._-]*$").unwrap();
}

fn is_valid_name(name: &str) -> bool {
    VALID_NAMES.is_match(name)
}

impl Coordinator {
    // =========================================================================
    // Continuous queries
    // =========================================================================

    /// Register a continuous query from its raw statement text
    pub async fn create_continuous_query(&self, user: &User, db: &str, query: &str) -> Result<()> {
        authz::check(user, authz::Action::ManageContinuousQueries { db })?;
        self.consensus.create_continuous_query(db, query).await
    }

    /// Remove a continuous query by id
    pub async fn delete_continuous_query(&self, user: &User, db: &str, id: u32) -> Result<()> {
        authz::check(user, authz::Action::ManageContinuousQueries { db })?;
        self.consensus.delete_continuous_query(db, id).await
    }

    /// Materialize the registered continuous queries as one synthetic
    /// series with `id` and `query` fields
    pub async fn list_continuous_queries(&self, user: &User, db: &str) -> Result<Vec<Series>> {
        authz::check(user, authz::Action::ManageContinuousQueries { db })?;

        let timestamp = chrono::Utc::now().timestamp();
        let points = self
            .catalog
            .continuous_queries(db)
            .into_iter()
            .map(|query| Point {
                timestamp: Some(timestamp),
                sequence_number: Some(1),
                values: vec![
                    FieldValue::Int(i64::from(query.id)),
                    FieldValue::String(query.query),
                ],
            })
            .collect();

        Ok(vec![Series::new(
            "continuous queries",
            vec!["id".to_string(), "query".to_string()],
            points,
        )])
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// Create a database
    pub async fn create_database(
        &self,
        user: &User,
        db: &str,
        replication_factor: u8,
    ) -> Result<()> {
        authz::check(user, authz::Action::CreateDatabase)?;
        if !is_valid_name(db) {
            return Err(CoordinatorError::invalid_argument(format!(
                "{} isn't a valid db name",
                db
            )));
        }
        self.consensus.create_database(db, replication_factor).await
    }

    /// All databases in the catalog
    pub async fn list_databases(&self, user: &User) -> Result<Vec<DatabaseInfo>> {
        authz::check(user, authz::Action::ListDatabases)?;
        Ok(self.catalog.databases())
    }

    /// Drop a database everywhere
    ///
    /// Takes a catalog checkpoint, commits the drop through consensus, then
    /// fans `drop_database` out to every shard in parallel and joins. The
    /// call returns only after the last shard has finished; individual
    /// shard failures are logged.
    pub async fn drop_database(&self, user: &User, db: &str) -> Result<()> {
        authz::check(user, authz::Action::DropDatabase)?;

        self.catalog.create_checkpoint()?;
        self.consensus.drop_database(db).await?;

        let drops = self.catalog.all_shards().into_iter().map(|shard| {
            let db = db.to_string();
            async move {
                if let Err(error) = shard.drop_database(&db, true).await {
                    warn!(shard = shard.id(), %error, "shard failed to drop database");
                }
            }
        });
        join_all(drops).await;
        Ok(())
    }

    // =========================================================================
    // Cluster admins
    // =========================================================================

    /// Names of all cluster admins
    pub async fn list_cluster_admins(&self, user: &User) -> Result<Vec<String>> {
        authz::check(user, authz::Action::ManageClusterAdmins)?;
        Ok(self.catalog.cluster_admins())
    }

    /// Create a cluster admin
    pub async fn create_cluster_admin(
        &self,
        user: &User,
        name: &str,
        password: &str,
    ) -> Result<()> {
        authz::check(user, authz::Action::ManageClusterAdmins)?;
        if !is_valid_name(name) {
            return Err(CoordinatorError::invalid_argument(format!(
                "{} isn't a valid username",
                name
            )));
        }

        let hash = self.hasher.hash(password)?;
        if self.catalog.cluster_admin(name).is_some() {
            return Err(CoordinatorError::already_exists(format!(
                "User {} already exists",
                name
            )));
        }

        self.consensus
            .save_cluster_admin(&ClusterAdmin {
                name: name.to_string(),
                hash,
                is_deleted: false,
            })
            .await
    }

    /// Soft-delete a cluster admin
    pub async fn delete_cluster_admin(&self, user: &User, name: &str) -> Result<()> {
        authz::check(user, authz::Action::ManageClusterAdmins)?;
        let mut admin = self.catalog.cluster_admin(name).ok_or_else(|| {
            CoordinatorError::not_found(format!("User {} doesn't exist", name))
        })?;
        admin.is_deleted = true;
        self.consensus.save_cluster_admin(&admin).await
    }

    /// Change a cluster admin's password
    pub async fn change_cluster_admin_password(
        &self,
        user: &User,
        name: &str,
        password: &str,
    ) -> Result<()> {
        authz::check(
            user,
            authz::Action::ChangePassword {
                db: None,
                username: name,
            },
        )?;
        let mut admin = self.catalog.cluster_admin(name).ok_or_else(|| {
            CoordinatorError::not_found(format!("Invalid user name {}", name))
        })?;
        admin.hash = self.hasher.hash(password)?;
        self.consensus.save_cluster_admin(&admin).await
    }

    // =========================================================================
    // Database users
    // =========================================================================

    /// Create a database user with an initially-unrestricted write scope
    pub async fn create_db_user(
        &self,
        user: &User,
        db: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        authz::check(user, authz::Action::ManageDbUsers { db })?;
        if username.is_empty() {
            return Err(CoordinatorError::invalid_argument("Username cannot be empty"));
        }
        if !is_valid_name(username) {
            return Err(CoordinatorError::invalid_argument(format!(
                "{} isn't a valid username",
                username
            )));
        }

        let hash = self.hasher.hash(password)?;
        // The database may already exist; the create's outcome is
        // intentionally discarded.
        let _ = self.create_database(user, db, 1).await;

        if self.catalog.db_user(db, username).is_some() {
            return Err(CoordinatorError::already_exists(format!(
                "User {} already exists",
                username
            )));
        }

        debug!(
            consensus = self.consensus.name(),
            db, username, "creating database user"
        );
        self.consensus
            .save_db_user(&DbUser {
                name: username.to_string(),
                db: db.to_string(),
                hash,
                is_admin: false,
                is_deleted: false,
                write_matchers: vec![Matcher::regex(".*")],
            })
            .await
    }

    /// Soft-delete a database user
    pub async fn delete_db_user(&self, user: &User, db: &str, username: &str) -> Result<()> {
        authz::check(user, authz::Action::ManageDbUsers { db })?;
        let mut record = self.catalog.db_user(db, username).ok_or_else(|| {
            CoordinatorError::not_found(format!("User {} doesn't exist", username))
        })?;
        record.is_deleted = true;
        self.consensus.save_db_user(&record).await
    }

    /// All users of a database, soft-deleted ones included
    pub async fn list_db_users(&self, user: &User, db: &str) -> Result<Vec<DbUser>> {
        authz::check(user, authz::Action::ManageDbUsers { db })?;
        Ok(self.catalog.db_users(db))
    }

    /// Look up one database user
    pub async fn get_db_user(&self, user: &User, db: &str, username: &str) -> Result<DbUser> {
        authz::check(user, authz::Action::ManageDbUsers { db })?;
        self.catalog.db_user(db, username).ok_or_else(|| {
            CoordinatorError::not_found(format!("Invalid username {}", username))
        })
    }

    /// Grant or revoke a user's database-admin bit
    pub async fn set_db_admin(
        &self,
        user: &User,
        db: &str,
        username: &str,
        is_admin: bool,
    ) -> Result<()> {
        authz::check(user, authz::Action::ManageDbUsers { db })?;
        let mut record = self.catalog.db_user(db, username).ok_or_else(|| {
            CoordinatorError::not_found(format!("Invalid username {}", username))
        })?;
        record.is_admin = is_admin;
        self.consensus.save_db_user(&record).await
    }

    /// Change a database user's password
    ///
    /// The plaintext is hashed before it reaches the replicated log.
    pub async fn change_db_user_password(
        &self,
        user: &User,
        db: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        authz::check(
            user,
            authz::Action::ChangePassword {
                db: Some(db),
                username,
            },
        )?;
        let hash = self.hasher.hash(password)?;
        self.consensus
            .change_db_user_password(db, username, &hash)
            .await
    }

    // =========================================================================
    // Authentication and maintenance
    // =========================================================================

    /// Verify a database user's credentials
    pub async fn authenticate_db_user(
        &self,
        db: &str,
        username: &str,
        password: &str,
    ) -> Result<User> {
        debug!(
            consensus = self.consensus.name(),
            db, username, "authenticating database user"
        );
        let user = self.catalog.authenticate_db_user(db, username, password)?;
        debug!(
            consensus = self.consensus.name(),
            username, "user authenticated successfully"
        );
        Ok(user)
    }

    /// Verify a cluster admin's credentials
    pub async fn authenticate_cluster_admin(&self, username: &str, password: &str) -> Result<User> {
        self.catalog.authenticate_cluster_admin(username, password)
    }

    /// Force a compaction of the replicated log
    pub async fn force_compaction(&self, user: &User) -> Result<()> {
        authz::check(user, authz::Action::ForceCompaction)?;
        self.consensus.force_log_compaction().await
    }
}
