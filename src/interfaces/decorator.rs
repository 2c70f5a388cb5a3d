//! Decorator interface and the pipeline continuation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::request::Request;

/// Continuation to the remainder of a pipeline.
///
/// Runs either the next decorator or the final handler. `run` consumes the
/// continuation, so it can be invoked at most once. Dropping it without
/// running short-circuits everything inside it.
pub struct Next<R> {
    inner: Box<dyn FnOnce() -> BoxFuture<'static, Result<R>> + Send>,
}

impl<R: Send + 'static> Next<R> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            inner: Box::new(move || -> BoxFuture<'static, Result<R>> { Box::pin(f()) }),
        }
    }

    /// Continuation that resolves immediately to `result`.
    pub fn ready(result: Result<R>) -> Self {
        Self::new(move || async move { result })
    }

    /// Invoke the rest of the pipeline.
    pub async fn run(self) -> Result<R> {
        (self.inner)().await
    }
}

impl<R> fmt::Debug for Next<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Cross-cutting wrapper around a request handler.
///
/// Decorators registered for a request type run in registration order,
/// outermost first. A decorator decides whether to call `next`; returning
/// without calling it short-circuits the inner decorators and the handler.
///
/// # Example
///
/// ```ignore
/// struct Timing;
///
/// #[async_trait]
/// impl Decorator<CreateOrder> for Timing {
///     async fn handle(
///         &self,
///         _request: Arc<CreateOrder>,
///         _cancel: &CancellationToken,
///         next: Next<OrderId>,
///     ) -> Result<OrderId> {
///         let start = Instant::now();
///         let result = next.run().await;
///         debug!(elapsed = ?start.elapsed(), "create order");
///         result
///     }
/// }
/// ```
#[async_trait]
pub trait Decorator<Q: Request>: Send + Sync {
    async fn handle(
        &self,
        request: Arc<Q>,
        cancel: &CancellationToken,
        next: Next<Q::Response>,
    ) -> Result<Q::Response>;
}
