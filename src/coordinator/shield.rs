//! Crash shield
//!
//! Contains unexpected failures inside one query execution: the panic
//! payload and a capped stack snapshot are logged together with the
//! database and query text, and the caller sees a uniform internal error.
//! Errors returned through normal paths pass through untouched.

use crate::error::{CoordinatorError, Result};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Cap on the logged stack snapshot, in bytes
const BACKTRACE_SNAPSHOT_LIMIT: usize = 1024;

/// Run one query execution under the shield
pub(crate) async fn guarded<F>(database: &str, query: &str, operation: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let snapshot = truncated_backtrace();
            error!(
                database,
                query,
                panic = %panic_message(payload.as_ref()),
                backtrace = %snapshot,
                "unexpected failure during query execution"
            );
            Err(CoordinatorError::Internal)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn truncated_backtrace() -> String {
    let rendered = Backtrace::force_capture().to_string();
    let mut end = BACKTRACE_SNAPSHOT_LIMIT.min(rendered.len());
    while end > 0 && !rendered.is_char_boundary(end) {
        end -= 1;
    }
    rendered[..end].to_string()
}
