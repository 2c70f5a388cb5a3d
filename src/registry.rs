//! In-memory service registry.
//!
//! The default [`ServiceResolver`]. Registrations are made through
//! [`ServiceRegistryBuilder`] and are immutable once built, so the registry
//! can be shared across tasks without locking.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::warn;

use crate::error::PanicFault;
use crate::interfaces::{
    Decorator, NotificationHandler, RequestHandler, ResolveError, ServiceInstance, ServiceResolver,
};
use crate::request::{HandlerKey, Notification, Request, TypeKey};

type Factory = Arc<dyn Fn() -> ServiceInstance + Send + Sync>;

/// Instance lifetime of a registration.
#[derive(Clone)]
enum Registration {
    /// One shared instance for every resolution.
    Singleton(ServiceInstance),
    /// Fresh instance per resolution.
    Transient {
        service: &'static str,
        factory: Factory,
    },
}

impl Registration {
    fn transient<T: 'static>(factory: Factory) -> Self {
        Registration::Transient {
            service: std::any::type_name::<T>(),
            factory,
        }
    }

    /// A panicking factory is reported as a construction failure.
    fn instance(&self) -> Result<ServiceInstance, ResolveError> {
        match self {
            Registration::Singleton(instance) => Ok(instance.clone()),
            Registration::Transient { service, factory } => {
                std::panic::catch_unwind(AssertUnwindSafe(|| factory())).map_err(|payload| {
                    ResolveError::Construction {
                        service: service.to_string(),
                        message: PanicFault::from_payload(payload.as_ref()).to_string(),
                    }
                })
            }
        }
    }
}

/// Registered handlers, decorators and notification handlers.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    handlers: HashMap<HandlerKey, Registration>,
    decorators: HashMap<HandlerKey, Vec<Registration>>,
    notification_handlers: HashMap<TypeKey, Vec<Registration>>,
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Check if a handler is registered for a request type.
    pub fn has_handler<Q: Request>(&self) -> bool {
        self.handlers.contains_key(&HandlerKey::of::<Q>())
    }

    /// Number of request types with a handler.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn decorator_count<Q: Request>(&self) -> usize {
        self.decorators
            .get(&HandlerKey::of::<Q>())
            .map_or(0, Vec::len)
    }

    pub fn notification_handler_count<N: Notification>(&self) -> usize {
        self.notification_handlers
            .get(&TypeKey::of::<N>())
            .map_or(0, Vec::len)
    }
}

impl ServiceResolver for ServiceRegistry {
    fn resolve_handler(&self, key: &HandlerKey) -> Result<Option<ServiceInstance>, ResolveError> {
        self.handlers
            .get(key)
            .map(Registration::instance)
            .transpose()
    }

    fn resolve_decorators(&self, key: &HandlerKey) -> Result<Vec<ServiceInstance>, ResolveError> {
        self.decorators
            .get(key)
            .map(|regs| regs.iter().map(Registration::instance).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// A handler that fails to construct is skipped; the others still resolve.
    fn resolve_notification_handlers(
        &self,
        notification: &TypeKey,
    ) -> Result<Vec<ServiceInstance>, ResolveError> {
        let Some(regs) = self.notification_handlers.get(notification) else {
            return Ok(Vec::new());
        };
        Ok(regs
            .iter()
            .filter_map(|reg| match reg.instance() {
                Ok(instance) => Some(instance),
                Err(e) => {
                    warn!(
                        notification.type = %notification,
                        error = %e,
                        "Skipping notification handler that failed to construct"
                    );
                    None
                }
            })
            .collect())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("handlers", &self.handlers.len())
            .field("decorated_requests", &self.decorators.len())
            .field("notification_types", &self.notification_handlers.len())
            .finish()
    }
}

/// Builder for [`ServiceRegistry`].
///
/// # Example
///
/// ```ignore
/// let registry = ServiceRegistry::builder()
///     .handler::<CreateOrder, _>(CreateOrderHandler::new(store.clone()))
///     .decorator::<CreateOrder, _>(LoggingDecorator::new())
///     .decorator::<CreateOrder, _>(ValidationDecorator::new())
///     .notification_handler::<OrderCreated, _>(SendReceipt)
///     .build();
/// ```
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    registry: ServiceRegistry,
}

impl ServiceRegistryBuilder {
    /// Register the handler for `Q`, shared across calls.
    ///
    /// A later registration for the same request type replaces this one.
    pub fn handler<Q, H>(self, handler: H) -> Self
    where
        Q: Request,
        H: RequestHandler<Q> + 'static,
    {
        let instance = ServiceInstance::handler::<Q, H>(Arc::new(handler));
        self.insert_handler(HandlerKey::of::<Q>(), Registration::Singleton(instance))
    }

    /// Register a factory producing a fresh handler for `Q` per call.
    pub fn handler_factory<Q, H, F>(self, factory: F) -> Self
    where
        Q: Request,
        H: RequestHandler<Q> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory =
            Arc::new(move || ServiceInstance::handler::<Q, H>(Arc::new(factory())));
        self.insert_handler(HandlerKey::of::<Q>(), Registration::transient::<H>(factory))
    }

    /// Append a decorator for `Q`. Earlier registrations wrap later ones.
    pub fn decorator<Q, D>(mut self, decorator: D) -> Self
    where
        Q: Request,
        D: Decorator<Q> + 'static,
    {
        let instance = ServiceInstance::decorator::<Q, D>(Arc::new(decorator));
        self.registry
            .decorators
            .entry(HandlerKey::of::<Q>())
            .or_default()
            .push(Registration::Singleton(instance));
        self
    }

    /// Append a decorator factory for `Q`, invoked once per call.
    pub fn decorator_factory<Q, D, F>(mut self, factory: F) -> Self
    where
        Q: Request,
        D: Decorator<Q> + 'static,
        F: Fn() -> D + Send + Sync + 'static,
    {
        let factory: Factory =
            Arc::new(move || ServiceInstance::decorator::<Q, D>(Arc::new(factory())));
        self.registry
            .decorators
            .entry(HandlerKey::of::<Q>())
            .or_default()
            .push(Registration::transient::<D>(factory));
        self
    }

    /// Add a handler for notification `N`.
    pub fn notification_handler<N, H>(mut self, handler: H) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        let instance = ServiceInstance::notification_handler::<N, H>(Arc::new(handler));
        self.registry
            .notification_handlers
            .entry(TypeKey::of::<N>())
            .or_default()
            .push(Registration::Singleton(instance));
        self
    }

    /// Add a notification handler factory for `N`, invoked once per publish.
    pub fn notification_handler_factory<N, H, F>(mut self, factory: F) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || {
            ServiceInstance::notification_handler::<N, H>(Arc::new(factory()))
        });
        self.registry
            .notification_handlers
            .entry(TypeKey::of::<N>())
            .or_default()
            .push(Registration::transient::<H>(factory));
        self
    }

    pub fn build(self) -> ServiceRegistry {
        self.registry
    }

    fn insert_handler(mut self, key: HandlerKey, registration: Registration) -> Self {
        if self.registry.handlers.insert(key, registration).is_some() {
            warn!(
                request.type = %key.request,
                "Handler already registered, replacing previous registration"
            );
        }
        self
    }
}
