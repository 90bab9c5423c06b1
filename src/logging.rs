//! Structured logging setup
//!
//! The engine only emits `tracing` events. Applications that do not install
//! their own subscriber can call [`init`] for JSON lines filtered by
//! `RUST_LOG` (default `chatflow=info`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "chatflow=info";

/// Install the global JSON subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already set; use [`try_init`] to get the
/// error instead.
pub fn init() {
    if let Err(e) = try_init() {
        panic!("failed to install tracing subscriber: {e}");
    }
}

/// Install the global JSON subscriber, failing if one is already set
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        // another test may already have installed one; either way the next attempt fails
        let _ = try_init();
        assert!(try_init().is_err());
    }
}
