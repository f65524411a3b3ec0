//! Beacon - concurrent HTTP/1.0 static file server
//!
//! Core library: line reader, request pipeline, response writer and the
//! bounded-concurrency dispatcher.

pub mod config;
pub mod error;
pub mod http;
pub mod server;
