//! Library half of the `convenios` binary: configuration loading, logging
//! setup and the axum HTTP server, exposed so tests can drive the router
//! in-process.

pub mod config;
pub mod serve;
pub mod telemetry;
