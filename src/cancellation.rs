//! Cancellation and deadline signal threaded through every resolution.
//!
//! The dispatcher derives one child token per request from the application
//! token, so shutting the application down cancels every in-flight request,
//! and a dropped connection cancels only its own.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::select_all;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::error::{DiError, DiResult};

/// A token that signals cancellation to builders and handlers.
///
/// # Examples
///
/// ```
/// use scopeline::CancellationToken;
///
/// let app = CancellationToken::new();
/// let request = app.child_token();
///
/// app.cancel();
/// assert!(request.is_cancelled());
/// assert!(request.check().is_err());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Creates a token that reports itself cancelled once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(None, Some(deadline))
    }

    /// Creates a token that cancels after `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a child token that will be cancelled when either this token
    /// or the child itself is cancelled.
    pub fn child_token(&self) -> Self {
        Self::build(Some(self.clone()), None)
    }

    fn build(parent: Option<CancellationToken>, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Cancels the token, signaling that associated operations should stop.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Returns true if cancellation has been requested or a deadline passed.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if matches!(self.inner.deadline, Some(d) if Instant::now() >= d) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Fails with [`DiError::Cancelled`] if the token is cancelled.
    pub fn check(&self) -> DiResult<()> {
        if self.is_cancelled() {
            Err(DiError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Earliest deadline along the parent chain.
    pub fn deadline(&self) -> Option<Instant> {
        self.chain().filter_map(|t| t.inner.deadline).min()
    }

    /// Returns a future that completes when cancellation is requested.
    pub async fn cancelled(&self) {
        loop {
            let mut waiters: Vec<Pin<Box<Notified<'_>>>> = self
                .chain()
                .map(|t| Box::pin(t.inner.notify.notified()))
                .collect();
            for waiter in waiters.iter_mut() {
                waiter.as_mut().enable();
            }

            if self.is_cancelled() {
                return;
            }

            match self.deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = select_all(waiters) => {}
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => {
                    select_all(waiters).await;
                }
            }
        }
    }

    /// Cancels the token when the returned guard is dropped.
    pub fn drop_guard(self) -> CancelOnDrop {
        CancelOnDrop { token: Some(self) }
    }

    fn chain(&self) -> impl Iterator<Item = &CancellationToken> {
        std::iter::successors(Some(self), |t| t.inner.parent.as_ref())
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline())
            .finish()
    }
}

/// Guard returned by [`CancellationToken::drop_guard`].
pub struct CancelOnDrop {
    token: Option<CancellationToken>,
}

impl CancelOnDrop {
    /// Releases the token without cancelling it.
    pub fn disarm(mut self) -> CancellationToken {
        self.token.take().unwrap_or_default()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
