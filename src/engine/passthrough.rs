//! Passthrough processors: batching forwarders without aggregation

use super::QueryProcessor;
use crate::protocol::{Response, Series};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Forwards series in batches without aggregating
///
/// Series sharing a name are coalesced until the pending batch reaches
/// `batch_size` points, then flushed as a single response. With a limit,
/// the engine truncates the final batch and reports `false` from
/// `yield_series` once the limit is exhausted.
pub struct PassthroughEngine {
    out: mpsc::Sender<Response>,
    batch_size: usize,
    /// Points still wanted; `usize::MAX` when unlimited
    remaining: usize,
    pending: Option<Series>,
}

impl PassthroughEngine {
    /// An unlimited passthrough
    pub fn new(out: mpsc::Sender<Response>, batch_size: usize) -> Self {
        Self {
            out,
            batch_size,
            remaining: usize::MAX,
            pending: None,
        }
    }

    /// A passthrough that stops after `limit` points
    pub fn with_limit(out: mpsc::Sender<Response>, batch_size: usize, limit: usize) -> Self {
        Self {
            out,
            batch_size,
            remaining: limit,
            pending: None,
        }
    }

    /// Send the pending batch, if any; `false` when the consumer is gone
    async fn flush(&mut self) -> bool {
        match self.pending.take() {
            Some(series) => self.out.send(Response::query(series)).await.is_ok(),
            None => true,
        }
    }
}

#[async_trait]
impl QueryProcessor for PassthroughEngine {
    async fn yield_series(&mut self, mut series: Series) -> bool {
        if self.remaining == 0 {
            return false;
        }
        if series.points.len() > self.remaining {
            series.points.truncate(self.remaining);
        }
        self.remaining = self.remaining.saturating_sub(series.points.len());

        let delivered = match self.pending.as_mut() {
            Some(pending) if pending.name == series.name => {
                pending.points.extend(series.points);
                true
            }
            _ => {
                // Different series: the old batch goes out first
                let flushed = self.flush().await;
                self.pending = Some(series);
                flushed
            }
        };
        if !delivered {
            return false;
        }

        let batch_full = self
            .pending
            .as_ref()
            .map(|p| p.points.len() >= self.batch_size)
            .unwrap_or(false);
        if batch_full && !self.flush().await {
            return false;
        }

        self.remaining > 0
    }

    async fn close(&mut self) {
        self.flush().await;
        let _ = self.out.send(Response::end_stream()).await;
    }
}
