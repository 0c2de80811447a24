use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Why a [`CancelToken`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` was called on the token or one of its clones.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

/// Cancellation signal shared between the caller and a running command.
///
/// Clones observe the same state, so a token handed to an executor can be
/// cancelled from another thread or task. A token may also carry a deadline,
/// after which it reports [`CancelReason::DeadlineExceeded`] without anyone
/// calling `cancel()`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[allow(dead_code)] // Checked by the test executor; the OS executor awaits `cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// `None` while the token is live. An explicit cancel wins over an expired
    /// deadline.
    pub fn reason(&self) -> Option<CancelReason> {
        if self.inner.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves once the token fires. Must be awaited inside a tokio runtime
    /// with the time driver enabled when a deadline is set.
    pub async fn cancelled(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.inner.cancelled() => CancelReason::Cancelled,
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        CancelReason::DeadlineExceeded
                    }
                }
            }
            None => {
                self.inner.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

/// Resolves with the reason of whichever token fires first; never resolves
/// for an empty slice.
pub(super) async fn first_cancelled(tokens: &[CancelToken]) -> CancelReason {
    match tokens {
        [] => std::future::pending().await,
        [only] => only.cancelled().await,
        [first, rest @ ..] => {
            tokio::select! {
                biased;
                reason = first.cancelled() => reason,
                reason = Box::pin(first_cancelled(rest)) => reason,
            }
        }
    }
}
