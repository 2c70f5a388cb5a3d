//! Request and notification contracts.
//!
//! A [`Request`] declares exactly one response type and is served by exactly
//! one handler. A [`Notification`] is served by zero or more handlers.
//! Whether a request is a "command" or a "query" is a naming convention only.
//!
//! Callers that know only the response type hold requests as
//! `Arc<dyn AnyRequest<R>>`; the concrete type is discovered at dispatch
//! time through [`AnyRequest::request_type`].

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::adapter::{self, DecoratorAdapter, HandlerAdapter, NotificationAdapter};

/// A value dispatched to exactly one handler.
pub trait Request: Send + Sync + 'static {
    /// The value a successful handler produces.
    type Response: Send + 'static;
}

/// A value fanned out to every registered handler.
pub trait Notification: Send + Sync + 'static {}

/// Type-erased request value as seen by invocation adapters.
pub type ErasedRequest = Arc<dyn Any + Send + Sync>;

/// Type-erased notification value as seen by invocation adapters.
pub type ErasedNotification = Arc<dyn Any + Send + Sync>;

/// Stable, comparable identity of a Rust type.
///
/// Equality and hashing use only the [`TypeId`]; the name is carried for
/// log messages and error text.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name (generic arguments kept).
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// (request type, response type) pair.
///
/// Used both to resolve handlers/decorators and to key cached adapters.
/// Notifications use the unit type as their response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub request: TypeKey,
    pub response: TypeKey,
}

impl HandlerKey {
    pub fn new(request: TypeKey, response: TypeKey) -> Self {
        Self { request, response }
    }

    /// Key for a statically known request type.
    pub fn of<Q: Request>() -> Self {
        Self::new(TypeKey::of::<Q>(), TypeKey::of::<Q::Response>())
    }

    /// Key for a statically known notification type.
    pub fn notification<N: Notification>() -> Self {
        Self::new(TypeKey::of::<N>(), TypeKey::of::<()>())
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.request.name(), self.response.name())
    }
}

/// Object-safe view of a request whose response type is `R`.
///
/// Implemented for every [`Request`]; callers never implement it by hand.
pub trait AnyRequest<R>: Send + Sync {
    /// Identity of the concrete request type.
    fn request_type(&self) -> TypeKey;

    /// The request value with its concrete type erased.
    fn into_erased(self: Arc<Self>) -> ErasedRequest;

    /// Build the invocation adapter for this request's handler.
    fn handler_adapter(&self) -> HandlerAdapter<R>;

    /// Build the invocation adapter for this request's decorators.
    fn decorator_adapter(&self) -> DecoratorAdapter<R>;
}

impl<Q: Request> AnyRequest<Q::Response> for Q {
    fn request_type(&self) -> TypeKey {
        TypeKey::of::<Q>()
    }

    fn into_erased(self: Arc<Self>) -> ErasedRequest {
        self
    }

    fn handler_adapter(&self) -> HandlerAdapter<Q::Response> {
        adapter::handler_adapter::<Q>()
    }

    fn decorator_adapter(&self) -> DecoratorAdapter<Q::Response> {
        adapter::decorator_adapter::<Q>()
    }
}

/// Object-safe view of a notification.
pub trait AnyNotification: Send + Sync {
    fn notification_type(&self) -> TypeKey;

    fn into_erased(self: Arc<Self>) -> ErasedNotification;

    /// Build the invocation adapter for this notification's handlers.
    fn notification_adapter(&self) -> NotificationAdapter;
}

impl<N: Notification> AnyNotification for N {
    fn notification_type(&self) -> TypeKey {
        TypeKey::of::<N>()
    }

    fn into_erased(self: Arc<Self>) -> ErasedNotification {
        self
    }

    fn notification_adapter(&self) -> NotificationAdapter {
        adapter::notification_adapter::<N>()
    }
}
