//! Reference decorators.
//!
//! Ready-made cross-cutting behaviour for any request type. Register them
//! like any other decorator; order of registration is order of wrapping.

pub mod logging;
pub mod validation;

pub use logging::LoggingDecorator;
pub use validation::{Validate, ValidationDecorator, Validator};
