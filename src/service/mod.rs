//! Business logic layer

pub mod app;
pub mod cleanup;
pub mod domain;

pub use app::AppService;
pub use cleanup::{CleanupCoordinator, CleanupReport};
pub use domain::DomainService;

use crate::error::{AppError, Result};
use std::future::Future;
use tracing::warn;

/// Default number of attempts for optimistic read-modify-write loops
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Run `op` until it stops failing with a version conflict, at most
/// `attempts` times. Each attempt must re-read what it modifies.
pub async fn retry_on_conflict<T, F, Fut>(
    attempts: u32,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Err(e) if e.is_retryable() => {
                metrics::counter!("routing_store_conflicts_total", "operation" => operation)
                    .increment(1);
                warn!(operation, attempt, "Store conflict: {}", e);
            }
            other => return other,
        }
    }
    Err(AppError::Unavailable(format!(
        "{} still conflicting after {} attempts",
        operation, attempts
    )))
}
