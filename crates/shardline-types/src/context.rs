use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ContextError;

/// Cancellation and deadline scope for a single store call.
///
/// Contexts form a tree: [`RequestContext::child`] derives a context that is
/// cancelled together with its parent but can also be cancelled on its own.
/// The gateway derives one child per HTTP request from the server-wide root,
/// so shutting the server down aborts every in-flight backend call.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A root context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A root context driven by an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Tighten the deadline to at most `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel this context and all contexts derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.token.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes or the context ends.
    ///
    /// When the context ends first, `fut` is dropped, which aborts any I/O it
    /// had in flight.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ContextError::Cancelled),
            _ = deadline => Err(ContextError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
