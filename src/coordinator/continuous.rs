//! Continuous-query materialization
//!
//! After a successful write, incoming series are matched against the FROM
//! clauses of the database's registered continuous queries. Matches are
//! re-emitted as transformed writes through the write router. Windowed
//! queries (those with a GROUP BY) are evaluated elsewhere and skipped
//! here. A continuous query must never block the primary write: per-point
//! commit failures are logged and dropped.

use super::write_router::WriteRouter;
use crate::cluster::ClusterCatalog;
use crate::protocol::Series;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::sync::Arc;
use tracing::error;

lazy_static! {
    /// Matches `[field]` placeholders in continuous-query targets
    static ref FIELD_PLACEHOLDER: Regex = Regex::new(r"\[.*?\]").unwrap();
}

pub(crate) struct ContinuousQueryRunner {
    catalog: Arc<dyn ClusterCatalog>,
    router: WriteRouter,
}

impl ContinuousQueryRunner {
    pub(crate) fn new(catalog: Arc<dyn ClusterCatalog>, router: WriteRouter) -> Self {
        Self { catalog, router }
    }

    /// Feed one committed write through the database's continuous queries
    pub(crate) async fn process_write(&self, db: &str, series: &Series) {
        for query in self.catalog.parsed_continuous_queries(db) {
            if !query.group_by.is_empty() {
                continue;
            }
            for pattern in &query.from_patterns {
                if pattern.matches(&series.name) {
                    self.interpolate_and_commit(db, series, &query.into_target)
                        .await;
                }
            }
        }
    }

    /// Substitute target placeholders and commit the transformed series
    ///
    /// `:series_name` is replaced by the source series name. When the
    /// target carries `[field]` placeholders, each point becomes an
    /// individually-named series; otherwise one series carries all points.
    pub(crate) async fn interpolate_and_commit(&self, db: &str, series: &Series, target: &str) {
        let target_name = target.replace(":series_name", &series.name);

        if FIELD_PLACEHOLDER.is_match(&target_name) {
            for point in &series.points {
                let interpolated =
                    FIELD_PLACEHOLDER.replace_all(&target_name, |caps: &Captures<'_>| {
                        let placeholder = &caps[0];
                        let field = &placeholder[1..placeholder.len() - 1];
                        point.value_as_string(series.field_index(field))
                    });
                let cleaned = remap_target_characters(&interpolated);

                let transformed =
                    Series::new(cleaned, series.fields.clone(), vec![point.clone()]);
                if let Err(error) = self.router.commit_series(db, transformed).await {
                    error!(%error, "couldn't write data for continuous query");
                }
            }
        } else {
            let transformed = Series::new(
                target_name,
                series.fields.clone(),
                series.points.clone(),
            );
            if let Err(error) = self.router.commit_series(db, transformed).await {
                error!(%error, "couldn't write data for continuous query");
            }
        }
    }
}

/// Remap interpolated target names onto the valid series-name alphabet
///
/// Alphanumerics, `_`, `-`, and `.` pass; spaces become `_`, slashes
/// become `.`, anything else is dropped.
fn remap_target_characters(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' | '.' => Some(c),
            ' ' => Some('_'),
            '/' => Some('.'),
            _ => None,
        })
        .collect()
}
