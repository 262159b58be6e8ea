//! Fire-and-forget background tasks.
//!
//! Side work such as cache write-through runs detached from the caller:
//! launched, never awaited, failures logged and dropped.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn a task whose outcome must never reach the caller.
///
/// Errors are logged under the given label and swallowed. The returned
/// handle lets tests await completion; production call sites drop it.
pub fn spawn_best_effort<F, E>(label: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + 'static,
{
    tokio::spawn(async move {
        match future.await {
            Ok(()) => debug!(task = label, "best-effort task finished"),
            Err(error) => warn!(task = label, %error, "best-effort task failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_best_effort_runs_to_completion() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let handle = spawn_best_effort("test-ok", async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        let handle = spawn_best_effort("test-err", async move {
            Err::<(), String>("boom".to_string())
        });

        // The task itself completes normally; the error is logged away.
        assert!(handle.await.is_ok());
    }
}
