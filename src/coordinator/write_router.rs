//! Timestamp-partitioned write routing
//!
//! Points in one write call are sorted newest-first, swept for contiguous
//! runs owned by the same shard, and flushed one request per run. Points
//! sharing a timestamp always land in the same request.

use crate::cluster::{ClusterCatalog, ShardPeer};
use crate::error::Result;
use crate::protocol::{now_micros, Series, WriteRequest};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Routes one series' points to their owning shards
#[derive(Clone)]
pub(crate) struct WriteRouter {
    catalog: Arc<dyn ClusterCatalog>,
}

impl WriteRouter {
    pub(crate) fn new(catalog: Arc<dyn ClusterCatalog>) -> Self {
        Self { catalog }
    }

    /// Commit a series: fill missing timestamps, sort newest-first, and
    /// flush contiguous same-shard runs
    ///
    /// Returns the normalized series for downstream processing. Any shard
    /// write failure aborts the call with the first error; earlier flushes
    /// are not rolled back.
    pub(crate) async fn commit_series(&self, db: &str, mut series: Series) -> Result<Series> {
        let now = now_micros();
        for point in &mut series.points {
            if point.timestamp.is_none() {
                point.timestamp = Some(now);
            }
        }
        series.sort_points_time_descending();

        let mut current: Option<Arc<dyn ShardPeer>> = None;
        let mut run_start = 0usize;
        let mut last_time: Option<i64> = None;

        for index in 0..series.points.len() {
            let timestamp = series.points[index].timestamp.unwrap_or(now);
            if last_time == Some(timestamp) {
                continue;
            }
            // First point of a new distinct timestamp: look up its shard.
            let shard = self.catalog.shard_for_write(db, &series.name, timestamp)?;
            match current.take() {
                None => current = Some(shard),
                Some(open) => {
                    if open.id() != shard.id() {
                        self.flush(db, &series, run_start..index, open.as_ref())
                            .await?;
                        run_start = index;
                        current = Some(shard);
                    } else {
                        current = Some(open);
                    }
                }
            }
            last_time = Some(timestamp);
        }

        if run_start < series.points.len() {
            let shard = match current {
                Some(shard) => shard,
                None => {
                    let timestamp = series.points[run_start].timestamp.unwrap_or(now);
                    self.catalog.shard_for_write(db, &series.name, timestamp)?
                }
            };
            self.flush(db, &series, run_start..series.points.len(), shard.as_ref())
                .await?;
        }

        Ok(series)
    }

    async fn flush(
        &self,
        db: &str,
        series: &Series,
        range: Range<usize>,
        shard: &dyn ShardPeer,
    ) -> Result<()> {
        debug!(
            shard = shard.id(),
            series = %series.name,
            points = range.len(),
            "flushing write run"
        );
        let request = WriteRequest::new(db, series.with_point_range(range));
        shard.write(request).await
    }
}
