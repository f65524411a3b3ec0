use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket};
use tracing::info;

use crate::config::ServerConfig;

/// Binds and listens on the configured address, returning a socket that is
/// ready to accept.
pub fn bind(cfg: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .context("could not create listening socket")?;

    socket.set_reuseaddr(true)?;
    socket
        .bind(addr)
        .with_context(|| format!("could not bind {addr}"))?;
    let listener = socket
        .listen(cfg.backlog)
        .with_context(|| format!("could not listen on {addr}"))?;

    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}
