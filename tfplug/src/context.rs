//! Cancellation and deadlines for provider operations
//!
//! Every trait method takes a Context as its first argument. Long-running
//! operations (polling, retries) check it between steps so a timeout or a
//! StopProvider call ends them promptly.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_deadline(None)
    }

    fn with_deadline(deadline: Option<Instant>) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline,
                done: done_rx,
                done_tx,
            }),
        }
    }

    /// Derives a child context that is cancelled together with this one and
    /// shares its deadline
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Derives a child context that is cancelled after `timeout`, when the
    /// parent is cancelled, or at the parent's deadline, whichever is first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut deadline = Instant::now() + timeout;
        if let Some(parent) = self.inner.deadline {
            deadline = deadline.min(parent);
        }
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let child = Self::with_deadline(deadline);
        if self.is_cancelled() {
            child.cancel();
            return child;
        }

        let done_tx = child.inner.done_tx.clone();
        let mut parent_done = self.inner.done.clone();
        tokio::spawn(async move {
            let expired = async {
                match deadline {
                    Some(deadline) => time::sleep_until(deadline.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };
            // A dropped parent can no longer be cancelled
            let parent_cancelled = async {
                if parent_done.wait_for(|done| *done).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                _ = expired => {}
                _ = parent_cancelled => {}
                _ = done_tx.closed() => return,
            }
            let _ = done_tx.send(true);
        });

        child
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; None when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut done = self.inner.done.clone();
        let _ = done.wait_for(|done| *done).await;
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));

        assert!(!ctx.is_cancelled());
        sleep(Duration::from_millis(100)).await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn child_inherits_parent_cancellation() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should be cancelled with its parent");
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn plain_child_follows_parent() {
        let parent = Context::new();
        let child = parent.child();
        assert!(child.deadline().is_none());
        assert!(!child.is_cancelled());

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should be cancelled with its parent");
    }

    #[tokio::test]
    async fn child_deadline_never_exceeds_parent() {
        let parent = Context::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(3600));

        assert_eq!(child.deadline(), parent.deadline());
        assert!(child.remaining().unwrap() <= Duration::from_secs(1));
    }

    #[test]
    fn debug_shows_deadline_and_cancellation() {
        let ctx = Context::new();
        assert_eq!(
            format!("{:?}", ctx),
            "Context { deadline: None, cancelled: false }"
        );
        ctx.cancel();
        assert!(format!("{:?}", ctx).contains("cancelled: true"));
    }

    #[test]
    fn children_of_cancelled_context_start_cancelled() {
        let parent = Context::new();
        parent.cancel();
        let first = parent.child();
        let second = parent.with_timeout(Duration::from_secs(60));

        tokio_test::block_on(async {
            futures::future::join(first.cancelled(), second.cancelled()).await;
        });
        assert!(first.is_cancelled() && second.is_cancelled());
    }

    #[tokio::test]
    async fn context_without_deadline_has_no_remaining() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }
}
