//! Fakes and fixtures for exercising Snapwise without external services.
//!
//! Compiled for unit tests and, behind the `test-support` feature, for the
//! suites under `tests/`.

mod clock;
pub mod http;

pub use clock::MutableClock;
