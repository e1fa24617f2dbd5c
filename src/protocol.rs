//! Wire-level data model shared with the cluster protocol
//!
//! The coordinator treats series as mostly opaque units: it reads and
//! writes point-level timestamps, partitions points by timestamp, and looks
//! up fields by name for continuous-query target interpolation. Every other
//! field is forwarded untouched, so the types here carry all wire fields
//! (name, fields, timestamps, sequence numbers, values) verbatim.

use serde::{Deserialize, Serialize};

/// A single field value carried by a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 64-bit float value
    Float(f64),
    /// 64-bit signed integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
    /// Absent value
    Null,
}

impl FieldValue {
    /// Render the value as a string, as used for target-name interpolation
    pub fn render(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Int(v) => format!("{}", v),
            FieldValue::Bool(v) => format!("{}", v),
            FieldValue::String(v) => v.clone(),
            FieldValue::Null => String::new(),
        }
    }
}

/// A single time-series measurement
///
/// Timestamps are microseconds since the epoch. A point arriving without a
/// timestamp is stamped with the coordinator's current time before routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Timestamp in microseconds, if assigned
    pub timestamp: Option<i64>,
    /// Sequence number, if assigned
    pub sequence_number: Option<u64>,
    /// Field values, positionally matching the owning series' field names
    pub values: Vec<FieldValue>,
}

impl Point {
    /// Create a point with a timestamp and values
    pub fn new(timestamp: i64, values: Vec<FieldValue>) -> Self {
        Self {
            timestamp: Some(timestamp),
            sequence_number: None,
            values,
        }
    }

    /// Render the value at `index` as a string; empty when out of range
    pub fn value_as_string(&self, index: Option<usize>) -> String {
        index
            .and_then(|i| self.values.get(i))
            .map(FieldValue::render)
            .unwrap_or_default()
    }
}

/// A named series of points with a field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Series name
    pub name: String,
    /// Ordered field names
    pub fields: Vec<String>,
    /// Data points
    pub points: Vec<Point>,
}

impl Series {
    /// Create a series from a name, field schema, and points
    pub fn new(name: impl Into<String>, fields: Vec<String>, points: Vec<Point>) -> Self {
        Self {
            name: name.into(),
            fields,
            points,
        }
    }

    /// Position of a field by name
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Sort points by timestamp, newest first (stable)
    pub fn sort_points_time_descending(&mut self) {
        self.points
            .sort_by_key(|p| std::cmp::Reverse(p.timestamp.unwrap_or(i64::MIN)));
    }

    /// A copy of this series carrying only the points in `range`
    pub fn with_point_range(&self, range: std::ops::Range<usize>) -> Series {
        Series {
            name: self.name.clone(),
            fields: self.fields.clone(),
            points: self.points[range].to_vec(),
        }
    }
}

/// Response kinds streamed back from a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// A data-carrying response
    Query,
    /// Execution-plan output for an EXPLAIN query
    ExplainQuery,
    /// Terminal marker: the shard finished streaming
    EndStream,
    /// Terminal marker: the shard denied access
    AccessDenied,
    /// Keep-alive marker, carries no data
    Heartbeat,
}

/// A single response on a shard's stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Response kind
    pub kind: ResponseKind,
    /// Series payload, if any
    pub series: Option<Series>,
    /// Error message; only meaningful on terminal responses
    pub error_message: Option<String>,
}

impl Response {
    /// A data response carrying one series
    pub fn query(series: Series) -> Self {
        Self {
            kind: ResponseKind::Query,
            series: Some(series),
            error_message: None,
        }
    }

    /// An explain-output response carrying one series
    pub fn explain(series: Series) -> Self {
        Self {
            kind: ResponseKind::ExplainQuery,
            series: Some(series),
            error_message: None,
        }
    }

    /// A clean end-of-stream marker
    pub fn end_stream() -> Self {
        Self {
            kind: ResponseKind::EndStream,
            series: None,
            error_message: None,
        }
    }

    /// An end-of-stream marker carrying an error message
    pub fn end_stream_error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::EndStream,
            series: None,
            error_message: Some(message.into()),
        }
    }

    /// An access-denied terminal marker
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::AccessDenied,
            series: None,
            error_message: Some(message.into()),
        }
    }

    /// Whether this response ends the shard's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ResponseKind::EndStream | ResponseKind::AccessDenied)
    }
}

/// Request kinds sent to a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Query execution request
    Query,
    /// Point write request
    Write,
    /// Database drop request
    DropDatabase,
}

/// A write request handed to a shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Request kind; always [`RequestKind::Write`]
    pub kind: RequestKind,
    /// Target database
    pub database: String,
    /// Points to write, pre-sorted newest first
    pub series: Series,
}

impl WriteRequest {
    /// Wrap a series slice destined for one shard
    pub fn new(database: impl Into<String>, series: Series) -> Self {
        Self {
            kind: RequestKind::Write,
            database: database.into(),
            series,
        }
    }
}

/// Current time in microseconds since the epoch
pub(crate) fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
