//! Parsed query tree and per-statement query specification
//!
//! Parsing itself happens outside this crate; the [`QueryParser`] seam
//! delivers an already-typed [`Query`] per statement. A [`QuerySpec`] binds
//! one statement to the requesting user and database for the duration of
//! that statement's execution.

use crate::cluster::User;
use crate::error::Result;
use regex::Regex;

/// A table reference in a FROM clause: a literal name or a compiled regex
#[derive(Debug, Clone)]
pub enum TablePattern {
    /// Exact series name
    Name(String),
    /// Compiled regular expression matched against series names
    Regex(Regex),
}

impl TablePattern {
    /// Whether the pattern matches a series name
    pub fn matches(&self, series: &str) -> bool {
        match self {
            TablePattern::Name(name) => name == series,
            TablePattern::Regex(regex) => regex.is_match(series),
        }
    }
}

/// A parsed SELECT statement, as far as the coordinator cares
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// FROM clause entries
    pub tables: Vec<TablePattern>,
    /// LIMIT clause; 0 means unlimited
    pub limit: usize,
    /// Whether the statement was prefixed with EXPLAIN
    pub explain: bool,
}

/// A parsed DELETE statement
#[derive(Debug, Clone, Default)]
pub struct DeleteQuery {
    /// FROM clause entries
    pub tables: Vec<TablePattern>,
}

/// A parsed DROP SERIES statement
#[derive(Debug, Clone)]
pub struct DropSeriesQuery {
    /// The series being dropped
    pub table: String,
}

/// One parsed top-level statement
#[derive(Debug, Clone)]
pub enum Query {
    /// SELECT (and EXPLAIN SELECT)
    Select(SelectQuery),
    /// DELETE FROM
    Delete(DeleteQuery),
    /// DROP SERIES
    DropSeries(DropSeriesQuery),
    /// DROP CONTINUOUS QUERY by id
    DropContinuousQuery(u32),
    /// LIST SERIES
    ListSeries,
    /// LIST CONTINUOUS QUERIES
    ListContinuousQueries,
    /// SELECT ... INTO: registers a continuous query; carries the raw
    /// statement text so it can be replicated verbatim
    CreateContinuous(String),
}

impl Query {
    /// The SELECT payload, if this is a select
    pub fn select(&self) -> Option<&SelectQuery> {
        match self {
            Query::Select(select) => Some(select),
            _ => None,
        }
    }
}

/// A registered continuous query, parsed
#[derive(Debug, Clone)]
pub struct ContinuousQuery {
    /// Catalog-assigned id
    pub id: u32,
    /// Owning database
    pub db: String,
    /// Raw query text as registered
    pub query: String,
    /// FROM clause entries matched against incoming series names
    pub from_patterns: Vec<TablePattern>,
    /// INTO target, possibly containing `:series_name` and `[field]`
    /// placeholders
    pub into_target: String,
    /// GROUP BY columns; non-empty means the query is windowed and is
    /// evaluated elsewhere, not by the coordinator
    pub group_by: Vec<String>,
}

/// One statement bound to its requesting user and database
///
/// Created per top-level statement, immutable once handed to the fan-out,
/// and dropped when the statement completes or fails.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    user: User,
    database: String,
    query: Query,
    /// When set, every replica of a participating shard executes the query
    /// independently (deletes and drops)
    pub run_against_all_servers_in_shard: bool,
}

impl QuerySpec {
    /// Bind a statement to a user and database
    pub fn new(user: User, database: impl Into<String>, query: Query) -> Self {
        Self {
            user,
            database: database.into(),
            query,
            run_against_all_servers_in_shard: false,
        }
    }

    /// The requesting user
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The target database
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The bound statement
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The SELECT payload, if the bound statement is a select
    pub fn select_query(&self) -> Option<&SelectQuery> {
        self.query.select()
    }

    /// Whether the bound statement is LIST SERIES
    pub fn is_list_series(&self) -> bool {
        matches!(self.query, Query::ListSeries)
    }

    /// Whether the bound statement requested an explain
    pub fn is_explain(&self) -> bool {
        self.select_query().map(|s| s.explain).unwrap_or(false)
    }
}

/// External parser seam: turns a query string into typed statements
pub trait QueryParser: Send + Sync {
    /// Parse a query string into its top-level statements
    fn parse(&self, query: &str) -> Result<Vec<Query>>;
}
