//! Tracing setup for embedding applications (spec.md's ambient logging
//! concern; this crate has no binary of its own to call it from).
//!
//! Mirrors `infrastructure/qnet-api/src/main.rs`'s subscriber wiring:
//! an `EnvFilter` reading `RUST_LOG` (defaulting to `info`) layered with
//! the standard `fmt` layer.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global tracing subscriber. Call once, near the start of the
/// embedding process's `main`. Idempotent-ish: a second call is a no-op
/// error from `tracing`'s global dispatcher, deliberately ignored here
/// since a library has no business panicking over its caller's logging
/// setup.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
