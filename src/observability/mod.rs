//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via `tracing` with an environment-driven filter

pub mod tracing;
