//! Observability: structured logging setup and publish counters

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{PublishStats, PublishStatsSnapshot};

// Span macros for structured logging
pub use logging::{capture_span, mqtt_span};
