//! Invocation adapters and their process-wide cache.
//!
//! The mediator sees handlers only as [`ServiceInstance`]s and requests only
//! as [`ErasedRequest`]s. An adapter is a small closure, monomorphized for
//! one concrete request type, that recovers the typed handler and request
//! and calls the entry point. Adapters are synthesized on first use of a
//! (request type, response type) pair and reused afterwards.
//!
//! The cache is append-only. Its size is bounded by the number of distinct
//! message types an application dispatches, not by traffic.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::interfaces::{Decorator, Next, NotificationHandler, RequestHandler, ServiceInstance};
use crate::request::{ErasedNotification, ErasedRequest, HandlerKey, Notification, Request};

/// Invokes a request handler.
pub type HandlerAdapter<R> = Arc<
    dyn Fn(ServiceInstance, ErasedRequest, CancellationToken) -> BoxFuture<'static, Result<R>>
        + Send
        + Sync,
>;

/// Invokes a decorator with its continuation.
pub type DecoratorAdapter<R> = Arc<
    dyn Fn(ServiceInstance, ErasedRequest, CancellationToken, Next<R>) -> BoxFuture<'static, Result<R>>
        + Send
        + Sync,
>;

/// Invokes a notification handler.
pub type NotificationAdapter = Arc<
    dyn Fn(ServiceInstance, ErasedNotification, CancellationToken) -> BoxFuture<'static, Result<()>>
        + Send
        + Sync,
>;

/// An instance or message did not have the shape the adapter expects.
#[derive(Debug, Clone, thiserror::Error)]
#[error("expected {expected}, resolver supplied {actual}")]
pub struct AdapterMismatch {
    pub expected: &'static str,
    pub actual: &'static str,
}

fn recover<T, M>(instance: &ServiceInstance, message: Arc<dyn Any + Send + Sync>) -> Result<(T, Arc<M>)>
where
    T: Any + Clone,
    M: Any + Send + Sync,
{
    let target = instance.downcast::<T>().ok_or_else(|| {
        Error::processing(
            std::any::type_name::<M>(),
            AdapterMismatch {
                expected: std::any::type_name::<T>(),
                actual: instance.type_name(),
            },
        )
    })?;
    let message = message.downcast::<M>().map_err(|_| {
        Error::processing(
            std::any::type_name::<M>(),
            AdapterMismatch {
                expected: std::any::type_name::<M>(),
                actual: "a different message type",
            },
        )
    })?;
    Ok((target, message))
}

/// Synthesize the handler adapter for `Q`.
pub fn handler_adapter<Q: Request>() -> HandlerAdapter<Q::Response> {
    Arc::new(
        |instance: ServiceInstance,
         request: ErasedRequest,
         cancel: CancellationToken|
         -> BoxFuture<'static, Result<Q::Response>> {
            Box::pin(async move {
                let (handler, request) =
                    recover::<Arc<dyn RequestHandler<Q>>, Q>(&instance, request)?;
                handler.handle(request, &cancel).await
            })
        },
    )
}

/// Synthesize the decorator adapter for `Q`.
pub fn decorator_adapter<Q: Request>() -> DecoratorAdapter<Q::Response> {
    Arc::new(
        |instance: ServiceInstance,
         request: ErasedRequest,
         cancel: CancellationToken,
         next: Next<Q::Response>|
         -> BoxFuture<'static, Result<Q::Response>> {
            Box::pin(async move {
                let (decorator, request) =
                    recover::<Arc<dyn Decorator<Q>>, Q>(&instance, request)?;
                decorator.handle(request, &cancel, next).await
            })
        },
    )
}

/// Synthesize the notification handler adapter for `N`.
pub fn notification_adapter<N: Notification>() -> NotificationAdapter {
    Arc::new(
        |instance: ServiceInstance,
         notification: ErasedNotification,
         cancel: CancellationToken|
         -> BoxFuture<'static, Result<()>> {
            Box::pin(async move {
                let (handler, notification) =
                    recover::<Arc<dyn NotificationHandler<N>>, N>(&instance, notification)?;
                handler.handle(notification, &cancel).await
            })
        },
    )
}

type CachedAdapter = Arc<dyn Any + Send + Sync>;

/// Point-in-time counters for an [`AdapterCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterCacheStats {
    pub handler_entries: usize,
    pub decorator_entries: usize,
    pub notification_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent, append-only map from message type pair to invocation adapter.
///
/// Insertion is get-or-add: concurrent first-time callers may each build a
/// candidate, exactly one is stored and every caller receives the stored one.
#[derive(Default)]
pub struct AdapterCache {
    handlers: DashMap<HandlerKey, CachedAdapter>,
    decorators: DashMap<HandlerKey, CachedAdapter>,
    notifications: DashMap<HandlerKey, CachedAdapter>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AdapterCache {
    /// Create an empty, isolated cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache, created on first use and never evicted.
    pub fn global() -> Arc<AdapterCache> {
        static GLOBAL: OnceLock<Arc<AdapterCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(AdapterCache::new())))
    }

    /// Cached handler adapter for `key`, synthesizing it with `build` on first use.
    pub fn handler_adapter<R: Send + 'static>(
        &self,
        key: HandlerKey,
        build: impl FnOnce() -> HandlerAdapter<R>,
    ) -> HandlerAdapter<R> {
        self.get_or_add(&self.handlers, key, build)
    }

    /// Cached decorator adapter for `key`, synthesizing it with `build` on first use.
    pub fn decorator_adapter<R: Send + 'static>(
        &self,
        key: HandlerKey,
        build: impl FnOnce() -> DecoratorAdapter<R>,
    ) -> DecoratorAdapter<R> {
        self.get_or_add(&self.decorators, key, build)
    }

    /// Cached notification adapter for `key`, synthesizing it with `build` on first use.
    pub fn notification_adapter(
        &self,
        key: HandlerKey,
        build: impl FnOnce() -> NotificationAdapter,
    ) -> NotificationAdapter {
        self.get_or_add(&self.notifications, key, build)
    }

    pub fn stats(&self) -> AdapterCacheStats {
        AdapterCacheStats {
            handler_entries: self.handlers.len(),
            decorator_entries: self.decorators.len(),
            notification_entries: self.notifications.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Total cached adapters of every shape.
    pub fn len(&self) -> usize {
        self.handlers.len() + self.decorators.len() + self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_add<A>(
        &self,
        map: &DashMap<HandlerKey, CachedAdapter>,
        key: HandlerKey,
        build: impl FnOnce() -> A,
    ) -> A
    where
        A: Any + Clone + Send + Sync,
    {
        let existing = map
            .get(&key)
            .and_then(|entry| entry.value().downcast_ref::<A>().cloned());
        if let Some(adapter) = existing {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return adapter;
        }

        // Racing creators may all build; only the first insert is kept.
        let candidate = build();
        let stored = match map.entry(key) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                entry.get().downcast_ref::<A>().cloned()
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Synthesized invocation adapter");
                entry
                    .insert(Arc::new(candidate.clone()))
                    .value()
                    .downcast_ref::<A>()
                    .cloned()
            }
        };

        stored.unwrap_or(candidate)
    }
}

impl std::fmt::Debug for AdapterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterCache")
            .field("stats", &self.stats())
            .finish()
    }
}
