//! Request timing and outcome logging.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::interfaces::{Decorator, Next};
use crate::request::{Request, TypeKey};

/// Logs request start, duration and outcome. Always calls `next`.
pub struct LoggingDecorator<Q> {
    _request: PhantomData<fn() -> Q>,
}

impl<Q> LoggingDecorator<Q> {
    pub fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<Q> Default for LoggingDecorator<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> fmt::Debug for LoggingDecorator<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingDecorator").finish()
    }
}

#[async_trait]
impl<Q: Request> Decorator<Q> for LoggingDecorator<Q> {
    async fn handle(
        &self,
        _request: Arc<Q>,
        _cancel: &CancellationToken,
        next: Next<Q::Response>,
    ) -> Result<Q::Response> {
        let request_type = TypeKey::of::<Q>().short_name();
        let start = Instant::now();

        debug!(request.type = request_type, "Request received");

        let result = next.run().await;

        let elapsed = start.elapsed();
        match &result {
            Ok(_) => {
                info!(
                    request.type = request_type,
                    duration.ms = elapsed.as_millis() as u64,
                    "Request succeeded"
                );
            }
            Err(e) => {
                warn!(
                    request.type = request_type,
                    error.code = e.code(),
                    error = %e,
                    duration.ms = elapsed.as_millis() as u64,
                    "Request failed"
                );
            }
        }

        result
    }
}
