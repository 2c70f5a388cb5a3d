//! Process bootstrap helpers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LOG_ENV_VAR, LOG_FORMAT_ENV_VAR};

/// Initialize tracing with the COURIER_LOG environment variable.
///
/// Defaults to "info" level if COURIER_LOG is not set. Emits JSON lines when
/// COURIER_LOG_FORMAT is `json`. Returns false if a global subscriber was
/// already installed, so it is safe to call more than once.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json_output() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.is_ok()
}

fn json_output() -> bool {
    std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
