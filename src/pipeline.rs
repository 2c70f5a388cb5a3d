//! Decorator pipeline composition.
//!
//! Decorators `[d1, d2, ..., dn]` and handler `h` compose into
//! `d1(d2(...dn(h)))`: the first registered decorator is outermost and sees
//! the request first and the result last. Each layer runs only when the layer
//! outside it calls its [`Next`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::adapter::{DecoratorAdapter, HandlerAdapter};
use crate::interfaces::{Next, ServiceInstance};
use crate::request::ErasedRequest;

/// Continuation that invokes the handler.
pub fn handler_call<R: Send + 'static>(
    adapter: HandlerAdapter<R>,
    handler: ServiceInstance,
    request: ErasedRequest,
    cancel: CancellationToken,
) -> Next<R> {
    Next::new(move || adapter(handler, request, cancel))
}

/// Wrap `innermost` with `decorators`, outermost first.
///
/// With no decorators the result is `innermost` itself. The returned
/// continuation runs nothing until invoked.
pub fn build_pipeline<R: Send + 'static>(
    innermost: Next<R>,
    decorators: Vec<ServiceInstance>,
    adapter: DecoratorAdapter<R>,
    request: ErasedRequest,
    cancel: CancellationToken,
) -> Next<R> {
    decorators
        .into_iter()
        .rev()
        .fold(innermost, |next, decorator| {
            let adapter = Arc::clone(&adapter);
            let request = Arc::clone(&request);
            let cancel = cancel.clone();
            Next::new(move || adapter(decorator, request, cancel, next))
        })
}
