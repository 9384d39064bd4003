use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why an operation stopped before completing.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Aborted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out")]
    TimedOut,
}

/// Caller supplied limits for a long-running operation.
///
/// Both limits are cooperative. An operation checks them at every await
/// point it passes through [`AbortOptions::run`] and between pulls of a
/// lazy stream.
#[derive(Clone, Debug, Default)]
pub struct AbortOptions {
    /// Upper bound on a single call.
    pub timeout: Option<Duration>,
    /// Cancelled by the caller to stop the operation.
    pub signal: Option<CancellationToken>,
}

impl AbortOptions {
    /// No timeout and no signal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Fail fast if the signal has already fired.
    pub fn check(&self) -> Result<(), Aborted> {
        match &self.signal {
            Some(token) if token.is_cancelled() => Err(Aborted::Cancelled),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the signal fires or the timeout
    /// elapses first. The future is dropped on abort.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<Aborted>,
    {
        self.check()?;
        let signal = self.signal.clone();
        let guarded = async move {
            match signal {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(E::from(Aborted::Cancelled)),
                    out = fut => out,
                },
                None => fut.await,
            }
        };
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or_else(|_| Err(E::from(Aborted::TimedOut))),
            None => guarded.await,
        }
    }
}
