use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::error::ConnectionError;
use crate::http::connection::{Connection, Outcome, ServeContext};
use crate::server::gate::{AdmissionGate, AdmissionSlot};

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of incoming connections.
pub trait Acceptor: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Accept loop. Hands each connection to its own task once a slot is free.
pub struct Dispatcher<A = TcpListener> {
    listener: A,
    gate: AdmissionGate,
    ctx: Arc<ServeContext>,
}

impl Dispatcher<TcpListener> {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl<A: Acceptor> Dispatcher<A> {
    pub fn new(listener: A, max_connections: usize, ctx: ServeContext) -> Self {
        Self {
            listener,
            gate: AdmissionGate::new(max_connections),
            ctx: Arc::new(ctx),
        }
    }

    /// A handle on the gate, for observing how many slots are in use.
    pub fn gate(&self) -> AdmissionGate {
        self.gate.clone()
    }

    /// Runs until the gate is closed, which never happens in normal operation.
    ///
    /// Accept failures are logged and retried after [`ACCEPT_BACKOFF`], so a
    /// persistent failure such as running out of descriptors does not spin.
    /// Connections beyond the gate's capacity stay in the kernel backlog
    /// because no further accept is issued while waiting for a slot.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            debug!(%peer, "Accepted connection");

            let slot = self.gate.acquire().await.context("admission gate closed")?;
            debug!(%peer, in_use = self.gate.in_use(), "Admitted connection");

            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, ctx, slot).await {
                    error!(%peer, error = %e, "Connection error");
                }
            });
        }
    }
}

/// Serves one connection to completion while holding `slot`.
///
/// The stream is closed and the slot released when this returns, on success
/// and on error alike.
pub async fn handle_connection<S>(
    stream: S,
    ctx: Arc<ServeContext>,
    slot: AdmissionSlot,
) -> Result<Outcome, ConnectionError>
where
    S: AsyncRead + AsyncWrite,
{
    let _slot = slot;
    let mut conn = Connection::new(stream, ctx);
    let outcome = conn.run().await?;

    if let Outcome::Served { status, delivery } = outcome {
        info!(status = status.as_u16(), ?delivery, "Connection finished");
    }
    Ok(outcome)
}
