//! Service resolution boundary.
//!
//! The mediator never constructs handlers or decorators. It asks a
//! [`ServiceResolver`] for instances and treats them as opaque values that
//! the matching invocation adapter knows how to call.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::interfaces::{Decorator, NotificationHandler, RequestHandler};
use crate::request::{HandlerKey, Notification, Request, TypeKey};

/// Errors raised by a resolver while looking up instances.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to construct '{service}': {message}")]
    Construction { service: String, message: String },

    #[error("Resolver unavailable: {0}")]
    Unavailable(String),

    #[error("Resolver panicked: {0}")]
    Panicked(String),
}

/// Type-erased handler, decorator or notification handler instance.
///
/// Wraps the trait object (`Arc<dyn RequestHandler<Q>>` and friends) behind
/// `dyn Any` so one resolver can hand out instances for any message type.
#[derive(Clone)]
pub struct ServiceInstance {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ServiceInstance {
    /// Wrap a request handler.
    pub fn handler<Q, H>(handler: Arc<H>) -> Self
    where
        Q: Request,
        H: RequestHandler<Q> + 'static,
    {
        let object: Arc<dyn RequestHandler<Q>> = handler;
        Self {
            inner: Arc::new(object),
            type_name: std::any::type_name::<H>(),
        }
    }

    /// Wrap a decorator.
    pub fn decorator<Q, D>(decorator: Arc<D>) -> Self
    where
        Q: Request,
        D: Decorator<Q> + 'static,
    {
        let object: Arc<dyn Decorator<Q>> = decorator;
        Self {
            inner: Arc::new(object),
            type_name: std::any::type_name::<D>(),
        }
    }

    /// Wrap a notification handler.
    pub fn notification_handler<N, H>(handler: Arc<H>) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        let object: Arc<dyn NotificationHandler<N>> = handler;
        Self {
            inner: Arc::new(object),
            type_name: std::any::type_name::<H>(),
        }
    }

    /// Wrap an arbitrary value.
    ///
    /// For resolvers bridging foreign containers. The value must be the
    /// trait object an adapter expects (e.g. `Arc<dyn RequestHandler<Q>>`),
    /// otherwise invocation fails with a processing error.
    pub fn from_any(value: Arc<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self {
            inner: value,
            type_name,
        }
    }

    /// Name of the concrete implementation type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recover a typed clone of the wrapped value.
    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.inner.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Supplies handler, decorator and notification handler instances.
///
/// Implementations own instance lifetimes (shared singletons, fresh
/// instance per call, scoped containers). The mediator only borrows what it
/// is given for the duration of one call.
pub trait ServiceResolver: Send + Sync {
    /// The single handler for a request/response pair, if registered.
    fn resolve_handler(&self, key: &HandlerKey) -> Result<Option<ServiceInstance>, ResolveError>;

    /// Decorators for a request/response pair, outermost first.
    fn resolve_decorators(&self, key: &HandlerKey) -> Result<Vec<ServiceInstance>, ResolveError>;

    /// Every handler registered for a notification type.
    fn resolve_notification_handlers(
        &self,
        notification: &TypeKey,
    ) -> Result<Vec<ServiceInstance>, ResolveError>;
}
