//! Handler interfaces.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::request::{Notification, Request};

/// Business logic for one request type.
///
/// The request is wrapped in `Arc` so decorators and the handler share one
/// immutable value. Handlers that keep mutable state should use interior
/// mutability.
///
/// # Example
///
/// ```ignore
/// struct GetOrderHandler {
///     orders: RwLock<HashMap<Uuid, Order>>,
/// }
///
/// #[async_trait]
/// impl RequestHandler<GetOrder> for GetOrderHandler {
///     async fn handle(&self, request: Arc<GetOrder>, _cancel: &CancellationToken) -> Result<Order> {
///         self.orders
///             .read()
///             .await
///             .get(&request.id)
///             .cloned()
///             .ok_or_else(|| Error::not_found("ORDER_NOT_FOUND", "no such order"))
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler<Q: Request>: Send + Sync {
    /// Handle the request.
    ///
    /// Long-running handlers should observe `cancel` cooperatively.
    async fn handle(&self, request: Arc<Q>, cancel: &CancellationToken) -> Result<Q::Response>;
}

/// One of possibly many independent reactions to a notification.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    /// React to the notification.
    ///
    /// Failures are logged by the mediator and never affect sibling handlers.
    async fn handle(&self, notification: Arc<N>, cancel: &CancellationToken) -> Result<()>;
}
