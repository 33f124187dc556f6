//! Lightweight in-process metrics.
//!
//! Counters and gauges are plain atomics updated by the driver task and read
//! from any handle; `render` produces Prometheus text for embedding apps that
//! already expose a scrape endpoint.

pub mod metrics;

pub use metrics::{ClientMetrics, MetricsSnapshot};
