//! The mediator: request dispatch and notification fan-out.
//!
//! `process` routes one request to its single handler through any registered
//! decorators and always returns a [`Result`]: routing misses, cancellation
//! and panics are converted to errors here and never escape to the caller.
//!
//! `publish` runs every handler for a notification concurrently, logs each
//! outcome, and returns once all of them have finished. A failing or
//! panicking handler never affects its siblings or the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::{AdapterCache, NotificationAdapter};
use crate::config::{ConfigError, FanOutStrategy, MediatorConfig};
use crate::error::{Error, PanicFault, Result};
use crate::interfaces::{ResolveError, ServiceInstance, ServiceResolver};
use crate::pipeline;
use crate::request::{
    AnyNotification, AnyRequest, ErasedNotification, HandlerKey, Notification, Request, TypeKey,
};

/// Outcome counts of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// Handlers resolved for the notification.
    pub handlers: usize,
    pub succeeded: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl PublishSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Routes requests and notifications to handlers supplied by a [`ServiceResolver`].
///
/// Cheap to clone; clones share the resolver and adapter cache.
///
/// # Example
///
/// ```ignore
/// let registry = ServiceRegistry::builder()
///     .handler::<GetOrder, _>(GetOrderHandler::new(store))
///     .build();
/// let mediator = Mediator::new(Arc::new(registry));
///
/// let order = mediator.send(GetOrder { id }).await?;
/// ```
#[derive(Clone)]
pub struct Mediator {
    resolver: Arc<dyn ServiceResolver>,
    adapters: Arc<AdapterCache>,
    config: MediatorConfig,
}

impl Mediator {
    /// Create a mediator over `resolver` using the process-wide adapter cache.
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self {
            resolver,
            adapters: AdapterCache::global(),
            config: MediatorConfig::default(),
        }
    }

    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::default()
    }

    /// The adapter cache this mediator dispatches through.
    pub fn adapter_cache(&self) -> &Arc<AdapterCache> {
        &self.adapters
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// Send a request to its handler.
    pub async fn send<Q: Request>(&self, request: Q) -> Result<Q::Response> {
        self.send_with_cancel(request, CancellationToken::new()).await
    }

    /// Send a request with a cancellation signal shared by every pipeline stage.
    pub async fn send_with_cancel<Q: Request>(
        &self,
        request: Q,
        cancel: CancellationToken,
    ) -> Result<Q::Response> {
        let request: Arc<dyn AnyRequest<Q::Response>> = Arc::new(request);
        self.process(request, cancel).await
    }

    /// Dispatch a request known only by its response type.
    #[tracing::instrument(
        name = "mediator.process",
        skip_all,
        fields(request.type = %request.request_type().short_name(), request.id = %Uuid::new_v4())
    )]
    pub async fn process<R: Send + 'static>(
        &self,
        request: Arc<dyn AnyRequest<R>>,
        cancel: CancellationToken,
    ) -> Result<R> {
        let start = Instant::now();
        debug!("Processing request");

        let result = self.process_inner(request, cancel).await;

        info!(
            success = result.is_ok(),
            duration.ms = start.elapsed().as_millis() as u64,
            "Request processing complete"
        );
        result
    }

    async fn process_inner<R: Send + 'static>(
        &self,
        request: Arc<dyn AnyRequest<R>>,
        cancel: CancellationToken,
    ) -> Result<R> {
        let request_type = request.request_type();

        if cancel.is_cancelled() {
            debug!("Request cancelled before dispatch");
            return Err(Error::cancelled(request_type.name()));
        }

        let key = HandlerKey::new(request_type, TypeKey::of::<R>());

        let handler = match resolve_guarded(|| self.resolver.resolve_handler(&key)) {
            Ok(Some(handler)) => handler,
            Ok(None) => {
                warn!(response.type = %key.response, "No handler registered");
                return Err(Error::handler_not_found(request_type.name()));
            }
            Err(e) => {
                error!(error = %e, "Handler resolution failed");
                return Err(Error::processing(request_type.name(), e));
            }
        };

        let decorators = match resolve_guarded(|| self.resolver.resolve_decorators(&key)) {
            Ok(decorators) => decorators,
            Err(e) => {
                warn!(error = %e, "Decorator resolution failed, proceeding without decorators");
                Vec::new()
            }
        };

        debug!(
            handler.type = handler.type_name(),
            decorator.count = decorators.len(),
            "Resolved pipeline"
        );

        let handler_adapter = self
            .adapters
            .handler_adapter(key, || request.handler_adapter());
        let decorator_adapter = (!decorators.is_empty()).then(|| {
            self.adapters
                .decorator_adapter(key, || request.decorator_adapter())
        });

        let erased = request.into_erased();
        let call = pipeline::handler_call(
            handler_adapter,
            handler,
            Arc::clone(&erased),
            cancel.clone(),
        );
        let chain = match decorator_adapter {
            Some(adapter) => {
                pipeline::build_pipeline(call, decorators, adapter, erased, cancel.clone())
            }
            None => call,
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Request cancelled during processing");
                Err(Error::cancelled(request_type.name()))
            }
            outcome = AssertUnwindSafe(chain.run()).catch_unwind() => match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let fault = PanicFault::from_payload(payload.as_ref());
                    error!(panic_msg = %fault.message, "Request pipeline panicked");
                    Err(Error::processing(request_type.name(), fault))
                }
            },
        }
    }

    /// Publish a notification to every registered handler.
    pub async fn publish<N: Notification>(&self, notification: N) -> PublishSummary {
        self.publish_with_cancel(notification, CancellationToken::new())
            .await
    }

    /// Publish with a cancellation signal handed to every handler.
    ///
    /// Handlers are not aborted on cancellation; each observes the signal
    /// cooperatively. Dropping the returned future does abort handlers still
    /// running.
    pub async fn publish_with_cancel<N: Notification>(
        &self,
        notification: N,
        cancel: CancellationToken,
    ) -> PublishSummary {
        let notification: Arc<dyn AnyNotification> = Arc::new(notification);
        self.publish_erased(notification, cancel).await
    }

    /// Publish a notification whose concrete type is known only at runtime.
    #[tracing::instrument(
        name = "mediator.publish",
        skip_all,
        fields(notification.type = %notification.notification_type().short_name())
    )]
    pub async fn publish_erased(
        &self,
        notification: Arc<dyn AnyNotification>,
        cancel: CancellationToken,
    ) -> PublishSummary {
        let notification_type = notification.notification_type();
        debug!("Publishing notification");

        let handlers = match resolve_guarded(|| {
            self.resolver
                .resolve_notification_handlers(&notification_type)
        }) {
            Ok(handlers) => handlers,
            Err(e) => {
                warn!(error = %e, "Notification handler resolution failed, publishing to no handlers");
                Vec::new()
            }
        };

        if handlers.is_empty() {
            debug!("No notification handlers registered");
            return PublishSummary::default();
        }

        let key = HandlerKey::new(notification_type, TypeKey::of::<()>());
        let adapter = self
            .adapters
            .notification_adapter(key, || notification.notification_adapter());
        let erased = notification.into_erased();

        let start = Instant::now();
        let count = handlers.len();
        let outcomes = match self.config.notifications.strategy {
            FanOutStrategy::Spawned => self.fan_out_spawned(handlers, adapter, erased, cancel).await,
            FanOutStrategy::Concurrent => {
                self.fan_out_concurrent(handlers, adapter, erased, cancel)
                    .await
            }
        };

        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        let summary = PublishSummary {
            handlers: count,
            succeeded,
            failed: count - succeeded,
        };

        info!(
            handlers = summary.handlers,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration.ms = start.elapsed().as_millis() as u64,
            "Notification dispatch complete"
        );
        summary
    }

    async fn fan_out_spawned(
        &self,
        handlers: Vec<ServiceInstance>,
        adapter: NotificationAdapter,
        notification: ErasedNotification,
        cancel: CancellationToken,
    ) -> Vec<bool> {
        let limiter = self
            .config
            .notifications
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n)));

        // Dropping the set aborts every handler still running.
        let mut tasks = JoinSet::new();
        for handler in handlers {
            let limiter = limiter.clone();
            let run = invoke_isolated(
                Arc::clone(&adapter),
                handler,
                Arc::clone(&notification),
                cancel.clone(),
            );
            tasks.spawn(async move {
                // Permit held for the handler's duration; the semaphore is never closed.
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                run.await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(match joined {
                Ok(ok) => ok,
                Err(e) => {
                    error!(error = %e, "Notification handler task did not complete");
                    false
                }
            });
        }
        outcomes
    }

    async fn fan_out_concurrent(
        &self,
        handlers: Vec<ServiceInstance>,
        adapter: NotificationAdapter,
        notification: ErasedNotification,
        cancel: CancellationToken,
    ) -> Vec<bool> {
        let limit = self
            .config
            .notifications
            .max_concurrency
            .unwrap_or(handlers.len())
            .max(1);

        futures::stream::iter(handlers.into_iter().map(|handler| {
            invoke_isolated(
                Arc::clone(&adapter),
                handler,
                Arc::clone(&notification),
                cancel.clone(),
            )
        }))
        .buffer_unordered(limit)
        .collect::<Vec<bool>>()
        .await
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("adapters", &self.adapters)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run a resolver lookup, reporting a panic as a resolution fault.
fn resolve_guarded<T>(
    lookup: impl FnOnce() -> std::result::Result<T, ResolveError>,
) -> std::result::Result<T, ResolveError> {
    std::panic::catch_unwind(AssertUnwindSafe(lookup)).unwrap_or_else(|payload| {
        Err(ResolveError::Panicked(
            PanicFault::from_payload(payload.as_ref()).message,
        ))
    })
}

/// Run one notification handler, logging its outcome. Never fails or unwinds.
fn invoke_isolated(
    adapter: NotificationAdapter,
    handler: ServiceInstance,
    notification: ErasedNotification,
    cancel: CancellationToken,
) -> BoxFuture<'static, bool> {
    let handler_type = handler.type_name();
    Box::pin(async move {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(adapter(handler, notification, cancel))
            .catch_unwind()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => {
                debug!(
                    handler.type = handler_type,
                    duration.ms = elapsed_ms,
                    "Notification handler succeeded"
                );
                true
            }
            Ok(Err(e)) => {
                warn!(
                    handler.type = handler_type,
                    error.code = e.code(),
                    error = %e,
                    duration.ms = elapsed_ms,
                    "Notification handler failed"
                );
                false
            }
            Err(payload) => {
                let fault = PanicFault::from_payload(payload.as_ref());
                error!(
                    handler.type = handler_type,
                    panic_msg = %fault.message,
                    duration.ms = elapsed_ms,
                    "Notification handler panicked"
                );
                false
            }
        }
    })
}

/// Builder for [`Mediator`].
#[derive(Default)]
pub struct MediatorBuilder {
    resolver: Option<Arc<dyn ServiceResolver>>,
    adapters: Option<Arc<AdapterCache>>,
    config: MediatorConfig,
}

impl MediatorBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use an isolated adapter cache instead of the process-wide one.
    pub fn adapter_cache(mut self, adapters: Arc<AdapterCache>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn config(mut self, config: MediatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> std::result::Result<Mediator, ConfigError> {
        let resolver = self
            .resolver
            .ok_or_else(|| ConfigError::Invalid("mediator requires a service resolver".to_string()))?;
        self.config.validate()?;

        Ok(Mediator {
            resolver,
            adapters: self.adapters.unwrap_or_else(AdapterCache::global),
            config: self.config,
        })
    }
}
