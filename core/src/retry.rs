//! Bounded retry with backoff for a single batch transaction (spec §4.10,
//! §5, §7.5: "scrubber/builder add an outer bounded retry with backoff
//! (`maxRetries`, `retryDelayMillis`)"). The KV store already retries a
//! conflicting commit internally per spec §6/§7.5 ("transient KV errors...
//! caught in scoped transaction helper and retried by the KV store"); this
//! is the *outer* bound for when a backend (like `SledKv`) exhausts its own
//! retries and still returns `KvError::Conflict`.

use std::future::Future;
use std::time::Duration;

use crate::error::MaintainError;

/// Retries `attempt` up to `max_retries` additional times (so `max_retries
/// == 0` runs it exactly once) whenever it fails with a transient
/// `KvError::Conflict`, sleeping `retry_delay` between attempts. Any other
/// error, or a conflict once retries are exhausted, is returned immediately.
pub async fn with_retry<F, Fut, T>(max_retries: usize, retry_delay: Duration, mut attempt: F) -> Result<T, MaintainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MaintainError>>,
{
    let mut tried = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(MaintainError::Kv(keyspace_kv::KvError::Conflict)) if tried < max_retries => {
                tried += 1;
                tracing::debug!(attempt = tried, max_retries, "batch conflicted with a concurrent writer, retrying");
                if !retry_delay.is_zero() {
                    tokio::time::sleep(retry_delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_without_retry_when_the_first_attempt_works() {
        let calls = Cell::new(0);
        let result: Result<i32, MaintainError> = with_retry(3, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_a_conflict_until_it_succeeds() {
        let calls = Cell::new(0);
        let result: Result<i32, MaintainError> = with_retry(5, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            async move {
                if calls.get() < 3 {
                    Err(MaintainError::Kv(keyspace_kv::KvError::Conflict))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_exhausted() {
        let calls = Cell::new(0);
        let result: Result<i32, MaintainError> = with_retry(2, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            async { Err(MaintainError::Kv(keyspace_kv::KvError::Conflict)) }
        })
        .await;
        assert!(matches!(result, Err(MaintainError::Kv(keyspace_kv::KvError::Conflict))));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_conflict_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<i32, MaintainError> = with_retry(5, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            async { Err(MaintainError::Kv(keyspace_kv::KvError::Backend("boom".into()))) }
        })
        .await;
        assert!(matches!(result, Err(MaintainError::Kv(keyspace_kv::KvError::Backend(_)))));
        assert_eq!(calls.get(), 1);
    }
}
