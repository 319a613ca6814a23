//! Logging and tracing infrastructure for learnpath.
//!
//! - [`init_tracing`] installs the global subscriber (pretty or JSON, env filter, optional
//!   OpenTelemetry stdout export)
//! - [`attributes`] names the span fields every service records
//! - [`request_span`] opens the per-request span carrying the correlation id

pub mod attributes;
pub mod tracer;

pub use attributes::request_span;
pub use tracer::{LogFormat, TracerConfig, TracerError, TracingGuard, init_tracing};
