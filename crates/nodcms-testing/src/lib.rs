//! Testing utilities for nodcms-validate
//!
//! - [`fakes`]: in-memory implementations of every capability the rules
//!   consult (data access, session store, existence lookups, captcha).
//! - [`MockServer`]: a local HTTP server that stands in for Google's
//!   reCaptcha site-verify endpoint.

pub mod expectation;
pub mod fakes;
pub mod matcher;
pub mod server;

pub use expectation::{Expectation, MockReply, Times};
pub use fakes::{
    row, FailingDataAccess, FailingLookup, MemoryDataAccess, MemorySessionStore, Row,
    StaticLookup, StaticVerifier,
};
pub use matcher::RequestMatcher;
pub use server::{MockServer, RecordedRequest, SITE_VERIFY_PATH};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn,nodcms_validate=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,nodcms_validate=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
