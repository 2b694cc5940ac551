//! Testing utilities and mock implementations
//!
//! Mocks for exercising the reporter and payload builder without a broker
//! or an HTTP server.

pub mod mocks;

pub use mocks::*;
