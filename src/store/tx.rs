//! Transaction executor
//!
//! [`Store::exec_tx`] runs a unit of work inside one PostgreSQL transaction.
//! The unit receives a transaction-scoped connection that cannot outlive the
//! call; the only exits are commit (unit returned `Ok`) and rollback
//! (unit returned `Err`, or the [`TxContext`] was cancelled or expired).
//!
//! When the context interrupts a unit mid-statement, the executor asks the
//! server to abort that statement (`pg_cancel_backend`) before rolling back.
//! If the rollback itself fails the connection is closed instead of being
//! returned to the pool, which aborts the transaction server-side. With a
//! deadline set, each statement is also bounded by `statement_timeout`.

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgConnection, Postgres};
use std::future::{Future, pending};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until, timeout};

use super::Store;
use super::error::StoreError;

/// Upper bound on the out-of-band cancel request
const CANCEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Cancellation and deadline carried into a transaction
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every clone of the [`TxContext`] it was created with
#[derive(Debug)]
pub struct CancelHandle {
    signal: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }
}

impl TxContext {
    /// No cancellation, no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (signal, receiver) = watch::channel(false);
        self.cancel = Some(receiver);
        (self, CancelHandle { signal })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` without one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fail fast if the context is already done
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the context is cancelled or past its deadline, with the
    /// matching error. Never resolves for [`TxContext::background`].
    pub async fn done(&self) -> StoreError {
        tokio::select! {
            biased;
            _ = wait_cancelled(self.cancel.clone()) => StoreError::Cancelled,
            _ = wait_deadline(self.deadline) => StoreError::DeadlineExceeded,
        }
    }

    /// Drive `fut` until it completes or the context is done, whichever is first
    pub async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            res = fut => res,
            err = self.done() => Err(err),
        }
    }
}

async fn wait_cancelled(receiver: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = receiver {
        let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if fired {
            return;
        }
    }
    // No handle, or the handle was dropped without cancelling
    pending::<()>().await
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending::<()>().await,
    }
}

/// How the unit of work ended
enum Completion<T> {
    /// The unit returned on its own
    Finished(Result<T, StoreError>),
    /// The context fired first; the unit's future was dropped
    Interrupted(StoreError),
}

impl Store {
    /// Run `unit_of_work` inside a transaction.
    ///
    /// Commits and returns the unit's value on `Ok`. Otherwise rolls back and
    /// returns the unit's error, or [`StoreError::Rollback`] carrying both
    /// errors if the rollback itself fails. A unit interrupted by `ctx`
    /// always reports [`StoreError::Cancelled`] or
    /// [`StoreError::DeadlineExceeded`]. Never retries.
    pub async fn exec_tx<T, F>(&self, ctx: &TxContext, unit_of_work: F) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, StoreError>>,
    {
        ctx.check()?;

        let mut conn = ctx
            .run(async { self.pool.acquire().await.map_err(StoreError::from) })
            .await?;

        let mut tx = Connection::begin(&mut *conn).await?;
        let backend_pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *tx)
            .await?;
        if let Some(remaining) = ctx.remaining() {
            set_statement_timeout(&mut *tx, remaining).await?;
        }

        let completion = tokio::select! {
            biased;
            res = unit_of_work(&mut *tx) => Completion::Finished(res),
            err = ctx.done() => Completion::Interrupted(err),
        };

        let (err, interrupted) = match completion {
            Completion::Finished(Ok(value)) => {
                return match tx.commit().await {
                    Ok(()) => Ok(value),
                    Err(e) => Err(StoreError::from_commit(e)),
                };
            }
            Completion::Finished(Err(err)) => (err, false),
            Completion::Interrupted(err) => (err, true),
        };

        if interrupted {
            // The dropped unit may still have a statement running, e.g. waiting on a row lock
            self.cancel_backend(backend_pid).await;
        }

        tracing::debug!(code = err.code(), interrupted, "Rolling back transaction");
        match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => {
                close_connection(conn).await;
                if interrupted {
                    // Rollback drained the reply of the aborted statement
                    tracing::debug!(error = %rollback, "Rollback after interruption failed, connection closed");
                    Err(err)
                } else {
                    tracing::error!(error = %rollback, "Rollback failed, connection closed");
                    Err(StoreError::Rollback {
                        source: Box::new(err),
                        rollback,
                    })
                }
            }
        }
    }

    /// Ask the server to abort whatever statement backend `pid` is running.
    /// Best effort; a backend idle in its transaction ignores the request.
    async fn cancel_backend(&self, pid: i32) {
        let request = sqlx::query_scalar::<_, bool>("SELECT pg_cancel_backend($1)")
            .bind(pid)
            .fetch_one(&self.pool);

        match timeout(CANCEL_REQUEST_TIMEOUT, request).await {
            Ok(Ok(signalled)) => tracing::debug!(pid, signalled, "Cancel request sent"),
            Ok(Err(e)) => tracing::warn!(pid, error = %e, "Cancel request failed"),
            Err(_) => tracing::warn!(pid, "Cancel request timed out"),
        }
    }
}

/// Drop the session instead of pooling it. The server aborts any transaction
/// still open on it.
async fn close_connection(conn: PoolConnection<Postgres>) {
    if let Err(e) = conn.detach().close().await {
        tracing::warn!(error = %e, "Failed to close connection");
    }
}

/// `SET LOCAL` only lasts until the transaction ends
async fn set_statement_timeout(conn: &mut PgConnection, remaining: Duration) -> Result<(), StoreError> {
    // 0 disables the timeout in PostgreSQL
    let millis = remaining.as_millis().max(1);
    sqlx::query(&format!("SET LOCAL statement_timeout = {}", millis))
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_interrupts() {
        let ctx = TxContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
        let res = ctx.run(async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_work() {
        let (ctx, handle) = TxContext::background().with_cancel();
        let worker = ctx.clone();
        let task = tokio::spawn(async move {
            worker
                .run(async {
                    pending::<()>().await;
                    Ok::<(), StoreError>(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let res = task.await.unwrap();
        assert!(matches!(res, Err(StoreError::Cancelled)));
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_work() {
        let ctx = TxContext::background().with_timeout(Duration::from_millis(30));
        let res = ctx
            .run(async {
                pending::<()>().await;
                Ok::<(), StoreError>(())
            })
            .await;
        assert!(matches!(res, Err(StoreError::DeadlineExceeded)));
        assert!(matches!(ctx.check(), Err(StoreError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = TxContext::background().with_cancel();
        drop(handle);
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, StoreError>("done")
            })
            .await;
        assert_eq!(res.unwrap(), "done");
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_done_reports_which_limit_fired() {
        let (ctx, handle) = TxContext::background()
            .with_timeout(Duration::from_secs(60))
            .with_cancel();
        handle.cancel();
        assert!(matches!(ctx.done().await, StoreError::Cancelled));

        let ctx = TxContext::background().with_timeout(Duration::from_millis(10));
        assert!(matches!(ctx.done().await, StoreError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_background_is_never_done() {
        let ctx = TxContext::background();
        let waited = tokio::time::timeout(Duration::from_millis(50), ctx.done()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = TxContext::background()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_unit_error_passes_through_run() {
        let ctx = TxContext::background().with_timeout(Duration::from_secs(5));
        let res: Result<(), StoreError> = ctx.run(async { Err(StoreError::AccountNotFound(9)) }).await;
        assert!(matches!(res, Err(StoreError::AccountNotFound(9))));
    }
}
