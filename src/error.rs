//! Result and error model shared by handlers, decorators and the mediator.
//!
//! Every entry point returns [`Result<T>`]. Failures carry an [`ErrorKind`],
//! a stable uppercase code, a human message and optional structured detail
//! (validation errors or a wrapped underlying fault).

use std::fmt;
use std::sync::Arc;

/// Result type for mediated operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes produced by the mediation core and reference decorators.
pub mod codes {
    /// No handler registered for the request type.
    pub const HANDLER_NOT_FOUND: &str = "HANDLER_NOT_FOUND";
    /// Cancellation observed while processing a request.
    pub const REQUEST_CANCELLED: &str = "REQUEST_CANCELLED";
    /// Unexpected fault while invoking the handler or pipeline.
    pub const MEDIATOR_PROCESSING_ERROR: &str = "MEDIATOR_PROCESSING_ERROR";
    /// Request failed input validation.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
}

/// Broad failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input was rejected by validation rules.
    Validation,
    /// The addressed resource or handler does not exist.
    NotFound,
    /// The request conflicts with current state.
    Conflict,
    /// A business invariant rejected the request.
    BusinessRule,
    /// Caller is not authenticated.
    Unauthorized,
    /// Caller is authenticated but not allowed.
    Forbidden,
    /// Infrastructure could not complete the request.
    ServiceUnavailable,
    /// Unclassified internal failure.
    Internal,
}

impl ErrorKind {
    /// Stable string form, suitable for logs and wire formats.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BusinessRule => "business_rule",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Underlying fault attached to an [`Error`] for diagnostics.
pub type Fault = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure half of a mediated result.
///
/// Cloning is cheap: the wrapped fault is reference counted so a single
/// error can be logged, cached by a decorator and returned to the caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{kind}] {code}: {message}")]
pub struct Error {
    kind: ErrorKind,
    code: String,
    message: String,
    validation_errors: Vec<ValidationError>,
    #[source]
    source: Option<Fault>,
}

impl Error {
    /// Create an error of any kind.
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            validation_errors: Vec::new(),
            source: None,
        }
    }

    pub fn validation(errors: Vec<ValidationError>) -> Self {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self::new(ErrorKind::Validation, codes::VALIDATION_FAILED, message)
            .with_validation_errors(errors)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, message)
    }

    pub fn business_rule(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BusinessRule, code, message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, code, message)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, code, message)
    }

    /// Handler lookup failed for the named request type.
    pub fn handler_not_found(request_type: &str) -> Self {
        Self::not_found(
            codes::HANDLER_NOT_FOUND,
            format!("No handler registered for request type '{request_type}'"),
        )
    }

    /// Processing was cancelled through the caller's signal.
    pub fn cancelled(request_type: &str) -> Self {
        Self::service_unavailable(
            codes::REQUEST_CANCELLED,
            format!("Processing of '{request_type}' was cancelled"),
        )
    }

    /// An unexpected fault escaped the handler or pipeline.
    pub fn processing<E>(request_type: &str, fault: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::service_unavailable(
            codes::MEDIATOR_PROCESSING_ERROR,
            format!("Unexpected failure while processing '{request_type}': {fault}"),
        )
        .with_source(fault)
    }

    /// Attach field-level validation detail.
    pub fn with_validation_errors(mut self, errors: Vec<ValidationError>) -> Self {
        self.validation_errors = errors;
        self
    }

    /// Attach the underlying fault.
    pub fn with_source<E>(mut self, fault: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(fault));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    /// The wrapped underlying fault, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.source.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::ServiceUnavailable && self.code == codes::REQUEST_CANCELLED
    }

    pub fn is_processing_error(&self) -> bool {
        self.kind == ErrorKind::ServiceUnavailable && self.code == codes::MEDIATOR_PROCESSING_ERROR
    }
}

/// Fault raised when a handler or decorator panics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("panicked: {message}")]
pub struct PanicFault {
    pub message: String,
}

impl PanicFault {
    /// Extract a readable message from a panic payload.
    pub fn from_payload(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}
