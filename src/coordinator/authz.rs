//! Authorization gate
//!
//! A single predicate matrix consulted at the entry of every public
//! operation, before any side effect. Denials carry a human message and
//! deliberately say nothing about whether the target object exists.

use crate::cluster::User;
use crate::error::{CoordinatorError, Result};

/// An operation being authorized
#[derive(Debug, Clone, Copy)]
pub(crate) enum Action<'a> {
    /// Write points to a series
    WriteSeries { db: &'a str, series: &'a str },
    /// DELETE FROM a database's series
    DeleteSeries { db: &'a str },
    /// DROP SERIES
    DropSeries { db: &'a str, series: &'a str },
    /// Create, delete, or list continuous queries
    ManageContinuousQueries { db: &'a str },
    /// Create a database
    CreateDatabase,
    /// Drop a database
    DropDatabase,
    /// List all databases
    ListDatabases,
    /// Create, delete, or list cluster admins
    ManageClusterAdmins,
    /// Create, delete, list, or promote a database's users
    ManageDbUsers { db: &'a str },
    /// Change a user's password; one's own is always allowed
    ChangePassword {
        db: Option<&'a str>,
        username: &'a str,
    },
    /// Force a replicated-log compaction
    ForceCompaction,
}

/// Decide whether `user` may perform `action`
pub(crate) fn check(user: &User, action: Action<'_>) -> Result<()> {
    if user.is_cluster_admin() {
        return Ok(());
    }

    let allowed = match action {
        Action::WriteSeries { db, series } => user.is_db_admin(db) || user.has_write_access(series),
        Action::DeleteSeries { db } => user.is_db_admin(db),
        Action::DropSeries { db, series } => user.is_db_admin(db) || user.has_write_access(series),
        Action::ManageContinuousQueries { db } => user.is_db_admin(db),
        Action::ManageDbUsers { db } => user.is_db_admin(db),
        Action::ChangePassword { db, username } => {
            let own = user.db() == db && user.name() == username;
            own || db.map(|db| user.is_db_admin(db)).unwrap_or(false)
        }
        // Cluster-scoped operations were handled by the short-circuit above
        Action::CreateDatabase
        | Action::DropDatabase
        | Action::ListDatabases
        | Action::ManageClusterAdmins
        | Action::ForceCompaction => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(CoordinatorError::authorization(denial_message(&action)))
    }
}

fn denial_message(action: &Action<'_>) -> String {
    match action {
        Action::WriteSeries { db, .. } | Action::DeleteSeries { db } => {
            format!("Insufficient permissions to write to {}", db)
        }
        Action::DropSeries { .. } => "Insufficient permissions to drop series".to_string(),
        Action::ManageContinuousQueries { .. } => {
            "Insufficient permissions to manage continuous queries".to_string()
        }
        Action::CreateDatabase => "Insufficient permissions to create database".to_string(),
        Action::DropDatabase => "Insufficient permissions to drop database".to_string(),
        Action::ListDatabases => "Insufficient permissions to list databases".to_string(),
        Action::ForceCompaction => {
            "Insufficient permissions to force a log compaction".to_string()
        }
        Action::ManageClusterAdmins
        | Action::ManageDbUsers { .. }
        | Action::ChangePassword { .. } => "Insufficient permissions".to_string(),
    }
}
