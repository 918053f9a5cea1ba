//! Snapwise backend: image explanations metered by free answers, tokens and
//! subscriptions.
//!
//! Layout follows ports and adapters: [`domain`] holds entities, the
//! entitlement engine and services; [`inbound`] translates HTTP into port
//! calls; [`outbound`] implements the driven ports.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
/// Request tracing middleware.
pub use middleware::Trace;
