use lingua_core::CoreError;
use std::future::Future;

/// Runs `op` until it succeeds, fails with something other than a version
/// conflict, or `max_attempts` is used up. `op` must reload the record it
/// updates on every call.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_conflict() && attempt < max_attempts => {
                tracing::warn!(attempt, error = %e, "concurrent update, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}
