//! Input validation before the handler runs.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result, ValidationError};
use crate::interfaces::{Decorator, Next};
use crate::request::{Request, TypeKey};

/// A request that can check its own fields.
pub trait Validate {
    /// Every rule violation; empty when the value is valid.
    fn validate(&self) -> Vec<ValidationError>;
}

/// Collects field violations for a [`Validate`] implementation.
///
/// # Example
///
/// ```ignore
/// impl Validate for CreateOrder {
///     fn validate(&self) -> Vec<ValidationError> {
///         Validator::new()
///             .require_not_empty("customer", &self.customer)
///             .require_positive("quantity", self.quantity)
///             .finish()
///     }
/// }
/// ```
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` when `ok` is false.
    pub fn check(mut self, ok: bool, field: &str, message: &str) -> Self {
        if !ok {
            self.errors.push(ValidationError::new(field, message));
        }
        self
    }

    pub fn require_not_empty(self, field: &str, value: &str) -> Self {
        self.check(!value.trim().is_empty(), field, "must not be empty")
    }

    pub fn require_positive<T: PartialOrd + Default>(self, field: &str, value: T) -> Self {
        self.check(value > T::default(), field, "must be positive")
    }

    pub fn require_non_negative<T: PartialOrd + Default>(self, field: &str, value: T) -> Self {
        self.check(value >= T::default(), field, "must be non-negative")
    }

    pub fn require_max_len(self, field: &str, value: &str, max: usize) -> Self {
        let ok = value.chars().count() <= max;
        self.check(ok, field, &format!("must be at most {max} characters"))
    }

    pub fn finish(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// Rejects invalid requests with `VALIDATION_FAILED` before inner layers run.
pub struct ValidationDecorator<Q> {
    _request: PhantomData<fn() -> Q>,
}

impl<Q> ValidationDecorator<Q> {
    pub fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<Q> Default for ValidationDecorator<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> fmt::Debug for ValidationDecorator<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationDecorator").finish()
    }
}

#[async_trait]
impl<Q: Request + Validate> Decorator<Q> for ValidationDecorator<Q> {
    async fn handle(
        &self,
        request: Arc<Q>,
        _cancel: &CancellationToken,
        next: Next<Q::Response>,
    ) -> Result<Q::Response> {
        let errors = request.validate();
        if !errors.is_empty() {
            debug!(
                request.type = TypeKey::of::<Q>().short_name(),
                violations = errors.len(),
                "Request rejected by validation"
            );
            return Err(Error::validation(errors));
        }
        next.run().await
    }
}
