//! Tempo coordinator - query/write coordination for a clustered
//! time-series database
//!
//! This crate is the single point in each node that accepts a parsed user
//! query or incoming data batch, authorizes it, decides which shards must
//! participate, fans the work out with backpressure, and streams results
//! back to a caller-supplied sink. On the write path it routes points to
//! the correct shard by series and timestamp and feeds matching continuous
//! queries.
//!
//! Parsing, cluster membership, consensus replication, and per-shard
//! storage live elsewhere; the coordinator consumes them through the trait
//! seams in [`query`], [`cluster`], [`consensus`], and [`engine`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod config;
pub mod consensus;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod query;

// Re-export main types
pub use config::{Config, CoordinatorConfig};
pub use coordinator::{Coordinator, CoordinatorBuilder, SeriesWriter, SinkHandle};
pub use error::{CoordinatorError, Result};
pub use protocol::{FieldValue, Point, Response, ResponseKind, Series, WriteRequest};
