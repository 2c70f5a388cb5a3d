//! Courier - in-process request mediation.
//!
//! Routes strongly-typed requests to exactly one handler through an ordered
//! chain of decorators, and fans notifications out to any number of
//! independent handlers.
//!
//! ```ignore
//! use courier::{Mediator, Request, RequestHandler, ServiceRegistry};
//!
//! struct GetGreeting { name: String }
//! impl Request for GetGreeting { type Response = String; }
//!
//! let registry = ServiceRegistry::builder()
//!     .handler::<GetGreeting, _>(GreetingHandler)
//!     .decorator::<GetGreeting, _>(LoggingDecorator::new())
//!     .build();
//! let mediator = Mediator::new(Arc::new(registry));
//!
//! let greeting = mediator.send(GetGreeting { name: "Ada".into() }).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod decorators;
pub mod error;
pub mod interfaces;
pub mod mediator;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod utils;

pub use adapter::{AdapterCache, AdapterCacheStats};
pub use config::{ConfigError, FanOutStrategy, MediatorConfig, NotificationConfig};
pub use decorators::{LoggingDecorator, Validate, ValidationDecorator, Validator};
pub use error::{codes, Error, ErrorKind, Result, ValidationError};
pub use interfaces::{
    Decorator, Next, NotificationHandler, RequestHandler, ResolveError, ServiceInstance,
    ServiceResolver,
};
pub use mediator::{Mediator, MediatorBuilder, PublishSummary};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};
pub use request::{AnyNotification, AnyRequest, HandlerKey, Notification, Request, TypeKey};
