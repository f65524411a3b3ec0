//! HTTP/1.0 protocol implementation.
//!
//! This module serves static files over HTTP/1.0, one request per connection,
//! with the legacy HTTP/0.9 simple request answered as raw bytes.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The per-connection handler implementing the request-response state machine
//! - **`reader`**: Reassembles newline-terminated lines out of partial socket reads
//! - **`request`**: Parses the request line into method, URI and version
//! - **`resource`**: Resolves a URI to a file under the document root
//! - **`response`**: Status determination and entity headers
//! - **`writer`**: Serializes the response and streams the file to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Request line only
//!        └──────┬──────┘
//!               │ Request parsed          ── malformed ──┐
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │   Processing     │ ← Resolve resource, pick 200/404
//!        └──────┬───────────┘                            │
//!               │ Response ready                         │
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │    Writing       │ ← Head (unless 0.9), then entity; write half closed
//!        └──────┬───────────┘                            │
//!               │ Full request     ── 0.9 request ───────┤
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │    Draining      │ ← Headers read and ignored │
//!        └──────┬───────────┘                            │
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │     Closed       │ ◄──────────────────────────┘
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use beacon::http::connection::{Connection, ServeContext};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let ctx = Arc::new(ServeContext::new("/srv/www"));
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let ctx = Arc::clone(&ctx);
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, ctx);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod reader;
pub mod request;
pub mod resource;
pub mod response;
pub mod writer;
