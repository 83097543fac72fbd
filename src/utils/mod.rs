//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` initialisation from [`crate::config::LoggingConfig`]
//! - **Metrics**: thread-safe counters shared by sessions

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
