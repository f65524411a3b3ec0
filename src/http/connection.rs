use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::config::Config;
use crate::error::ConnectionError;
use crate::http::reader::{DEFAULT_CHUNK_SIZE, DEFAULT_READ_ATTEMPTS, LineReader};
use crate::http::request::{ParseError, Request};
use crate::http::resource::{FileSystem, LocalFileSystem, resolve_resource};
use crate::http::response::{ProtocolVersion, Response, StatusCode};
use crate::http::writer::{DEFAULT_SEND_CHUNK_SIZE, Delivery, ResponseWriter};

/// Read-only settings every handler needs. Shared behind an `Arc`.
#[derive(Clone)]
pub struct ServeContext {
    pub document_root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub read_chunk_size: usize,
    pub read_attempts: u32,
    pub send_chunk_size: usize,
}

impl ServeContext {
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
            fs: Arc::new(LocalFileSystem),
            read_chunk_size: DEFAULT_CHUNK_SIZE,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            send_chunk_size: DEFAULT_SEND_CHUNK_SIZE,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            document_root: cfg.static_files.document_root.clone(),
            fs: Arc::new(LocalFileSystem),
            read_chunk_size: cfg.reader.chunk_size,
            read_attempts: cfg.reader.read_attempts,
            send_chunk_size: cfg.static_files.send_chunk_size,
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing {
        writer: ResponseWriter,
        status: StatusCode,
        /// Full requests still have a header block on the wire.
        headers_pending: bool,
    },
    /// Reply sent and write half closed; reading the rest of the request.
    Draining,
    Closed,
}

/// How a connection finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The peer closed without sending a request line.
    NoRequest,
    /// The request line was unusable; closed without a reply.
    Rejected(ParseError),
    Served { status: StatusCode, delivery: Delivery },
}

/// One accepted connection, driven from request line to close.
pub struct Connection<S> {
    reader: LineReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    write_closed: bool,
    ctx: Arc<ServeContext>,
    state: ConnectionState,
    outcome: Outcome,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S, ctx: Arc<ServeContext>) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        let reader = LineReader::with_limits(read_half, ctx.read_chunk_size, ctx.read_attempts);

        Self {
            reader,
            writer,
            write_closed: false,
            ctx,
            state: ConnectionState::Reading,
            outcome: Outcome::NoRequest,
        }
    }

    pub async fn run(&mut self) -> Result<Outcome, ConnectionError> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        Some(req) => ConnectionState::Processing(req),
                        None => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(req) => {
                    let version = ProtocolVersion::negotiate(req);
                    let headers_pending = !req.is_simple();
                    let fs = self.ctx.fs.as_ref();
                    let resource = resolve_resource(&req.uri, &self.ctx.document_root, fs).await;
                    let response = Response::for_resource(version, &resource, fs).await;
                    let status = response.status;

                    tracing::info!(
                        method = req.method.as_str(),
                        uri = %req.uri_lossy(),
                        version = %req.version,
                        status = status.as_u16(),
                        "Serving request"
                    );

                    self.state = ConnectionState::Writing {
                        writer: ResponseWriter::new(response, self.ctx.send_chunk_size),
                        status,
                        headers_pending,
                    };
                }

                ConnectionState::Writing {
                    writer,
                    status,
                    headers_pending,
                } => {
                    let status = *status;
                    let headers_pending = *headers_pending;
                    let delivery = writer
                        .write_to_stream(&mut self.writer, self.ctx.fs.as_ref())
                        .await?;

                    self.outcome = Outcome::Served { status, delivery };
                    self.close_write().await;
                    self.state = if headers_pending {
                        ConnectionState::Draining
                    } else {
                        ConnectionState::Closed
                    };
                }

                ConnectionState::Draining => {
                    // The reply is out; a read failure here changes nothing for the peer.
                    if let Err(e) = self.drain_headers().await {
                        tracing::debug!(error = %e, "draining request headers failed");
                    }
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        self.close_write().await;
        Ok(self.outcome)
    }

    /// Reads and parses the request line.
    pub async fn read_request(&mut self) -> Result<Option<Request>, ConnectionError> {
        let Some(line) = self.reader.next_line().await? else {
            // Client closed connection
            return Ok(None);
        };

        match Request::parse_line(&line) {
            Ok(request) => Ok(Some(request)),
            Err(e) => {
                tracing::warn!(error = ?e, line = %String::from_utf8_lossy(&line), "Malformed request line");
                self.outcome = Outcome::Rejected(e);
                Ok(None)
            }
        }
    }

    /// Discards header lines up to the blank line (or end of stream).
    async fn drain_headers(&mut self) -> Result<(), ConnectionError> {
        while let Some(line) = self.reader.next_line().await? {
            if line.is_empty() || &line[..] == b"\r" {
                break;
            }
            tracing::trace!(header = %String::from_utf8_lossy(&line), "ignoring request header");
        }
        Ok(())
    }

    async fn close_write(&mut self) {
        if self.write_closed {
            return;
        }
        self.write_closed = true;

        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!(error = %e, "shutdown after reply failed");
        }
    }
}
