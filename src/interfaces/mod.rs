//! Abstract interfaces for mediated components.
//!
//! These traits define the contracts for:
//! - Request handlers (exactly one per request type)
//! - Decorators (ordered cross-cutting wrappers around a handler)
//! - Notification handlers (zero or more per notification type)
//! - Service resolution (the external registry that supplies instances)

pub mod decorator;
pub mod handler;
pub mod resolver;

pub use decorator::{Decorator, Next};
pub use handler::{NotificationHandler, RequestHandler};
pub use resolver::{ResolveError, ServiceInstance, ServiceResolver};
