mod common;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use beacon::config::ServerConfig;
use beacon::error::{ConnectionError, ReadError};
use beacon::http::connection::{Outcome, ServeContext};
use beacon::server::dispatcher::{ACCEPT_BACKOFF, handle_connection};
use beacon::server::{AdmissionGate, Dispatcher, listener};
use common::{GrowingFs, ScriptedAcceptor, ScriptedStream, Step, VanishingFs, document_root};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const EXPECTED_HTML: &[u8] =
    b"HTTP/1.0 200 OK\nContent-Type: text/html\nContent-Length: 15\n\n<h1>hello</h1>\n";

fn local_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

async fn wait_for_idle(gate: &AdmissionGate) {
    timeout(Duration::from_secs(5), async {
        while gate.available() != gate.capacity() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("slots were not released");
}

#[tokio::test]
async fn test_gate_blocks_beyond_capacity() {
    let gate = AdmissionGate::new(2);

    let first = gate.acquire().await.unwrap();
    let _second = gate.acquire().await.unwrap();
    assert_eq!(gate.available(), 0);
    assert_eq!(gate.in_use(), 2);

    let waiting = timeout(Duration::from_millis(50), gate.acquire()).await;
    assert!(waiting.is_err(), "third slot granted while two were held");
    assert!(gate.try_acquire().is_none());

    drop(first);
    let third = timeout(Duration::from_secs(1), gate.acquire()).await;
    assert!(third.is_ok());
}

#[tokio::test]
async fn test_gate_released_waiter_wakes() {
    let gate = AdmissionGate::new(1);
    let held = gate.acquire().await.unwrap();

    let waiter = tokio::spawn({
        let gate = gate.clone();
        async move {
            let _slot = gate.acquire().await.unwrap();
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(held);
    timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(gate.available(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_never_exceeds_capacity_under_load() {
    const CAPACITY: usize = 3;
    let gate = AdmissionGate::new(CAPACITY);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let slot = gate.acquire().await.unwrap();
        assert!(gate.available() <= CAPACITY);

        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            let _slot = slot;
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            active.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(gate.available(), CAPACITY);
}

#[tokio::test]
async fn test_slot_released_after_stream_failure() {
    let root = document_root();
    let gate = AdmissionGate::new(1);
    let ctx = Arc::new(ServeContext::new(root.path()).with_fs(Arc::new(GrowingFs { extra: 7 })));

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    client.write_all(b"GET /style.css HTTP/1.0\n\n").await.unwrap();

    let slot = gate.acquire().await.unwrap();
    assert_eq!(gate.available(), 0);

    let result = handle_connection(server, ctx, slot).await;
    assert!(matches!(result, Err(ConnectionError::ResourceChanged { .. })));
    assert_eq!(gate.available(), 1);
}

#[tokio::test]
async fn test_slot_released_after_open_failure() {
    let root = document_root();
    let gate = AdmissionGate::new(1);
    let ctx = Arc::new(ServeContext::new(root.path()).with_fs(Arc::new(VanishingFs)));

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    client.write_all(b"GET /anything.html HTTP/1.0\n\n").await.unwrap();

    let slot = gate.acquire().await.unwrap();
    let result = handle_connection(server, ctx, slot).await;

    assert!(matches!(result, Err(ConnectionError::ResourceUnavailable { .. })));
    assert_eq!(gate.available(), 1);
}

#[tokio::test]
async fn test_slot_released_after_malformed_request() {
    let root = document_root();
    let gate = AdmissionGate::new(1);
    let ctx = Arc::new(ServeContext::new(root.path()));

    let (mut client, server) = tokio::io::duplex(1024);
    client.write_all(b"DELETE /x HTTP/1.0\n").await.unwrap();

    let slot = gate.acquire().await.unwrap();
    let outcome = handle_connection(server, ctx, slot).await.unwrap();

    assert!(matches!(outcome, Outcome::Rejected(_)));
    assert_eq!(gate.available(), 1);
}

#[tokio::test]
async fn test_slot_released_after_read_failure() {
    let root = document_root();
    let gate = AdmissionGate::new(1);
    let ctx = Arc::new(ServeContext::new(root.path()));

    let stream = ScriptedStream::new([
        Step::Data(b"GET /app".to_vec()),
        Step::Fail(io::ErrorKind::ConnectionReset),
        Step::Fail(io::ErrorKind::ConnectionReset),
        Step::Fail(io::ErrorKind::ConnectionReset),
    ]);

    let slot = gate.acquire().await.unwrap();
    let result = handle_connection(stream, ctx, slot).await;

    assert!(matches!(
        result,
        Err(ConnectionError::Read(ReadError::RetriesExhausted { attempts: 3, .. }))
    ));
    assert_eq!(gate.available(), 1);
}

#[tokio::test]
async fn test_dispatcher_backs_off_after_accept_errors() {
    let root = document_root();
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let acceptor = ScriptedAcceptor::new([
        Err(io::Error::other("too many open files")),
        Err(io::Error::other("too many open files")),
        Ok(server),
    ]);
    let attempts = Arc::clone(&acceptor.attempts);

    let dispatcher = Dispatcher::new(acceptor, 1, ServeContext::new(root.path()));
    let gate = dispatcher.gate();
    let task = tokio::spawn(dispatcher.run());

    client.write_all(b"GET /a/b.html HTTP/1.0\n\n").await.unwrap();
    let mut received = Vec::new();
    timeout(Duration::from_secs(5), client.read_to_end(&mut received))
        .await
        .expect("connection after accept errors never served")
        .unwrap();
    assert_eq!(received, EXPECTED_HTML.to_vec());

    let attempts = attempts.lock().unwrap().clone();
    assert!(attempts.len() >= 3);
    for pair in attempts[..3].windows(2) {
        assert!(pair[1] - pair[0] >= ACCEPT_BACKOFF);
    }

    wait_for_idle(&gate).await;
    task.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatcher_serves_over_tcp() {
    let root = document_root();
    let listener = listener::bind(&local_server_config()).unwrap();
    let dispatcher = Dispatcher::new(listener, 2, ServeContext::new(root.path()));
    let addr = dispatcher.local_addr().unwrap();
    let gate = dispatcher.gate();
    let server = tokio::spawn(dispatcher.run());

    for _ in 0..5 {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /a/b.html HTTP/1.0\r\n\r\n").await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, EXPECTED_HTML.to_vec());
    }

    wait_for_idle(&gate).await;
    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatcher_defers_connections_beyond_capacity() {
    let root = document_root();
    let listener = listener::bind(&local_server_config()).unwrap();
    let dispatcher = Dispatcher::new(listener, 1, ServeContext::new(root.path()));
    let addr = dispatcher.local_addr().unwrap();
    let gate = dispatcher.gate();
    let server = tokio::spawn(dispatcher.run());

    // Holds the only slot: its handler waits for a request line.
    let mut first = TcpStream::connect(addr).await.unwrap();
    timeout(Duration::from_secs(5), async {
        while gate.available() != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first connection was never admitted");

    let mut second = TcpStream::connect(addr).await.unwrap();
    second.write_all(b"GET /a/b.html HTTP/1.0\n\n").await.unwrap();

    let mut buf = [0u8; 64];
    let early = timeout(Duration::from_millis(200), second.read(&mut buf)).await;
    assert!(early.is_err(), "second connection served while the slot was held");

    first.write_all(b"GET /app.js\n").await.unwrap();
    first.shutdown().await.unwrap();
    let mut first_received = Vec::new();
    first.read_to_end(&mut first_received).await.unwrap();
    assert_eq!(first_received, b"console.log(1);".to_vec());

    let mut second_received = Vec::new();
    timeout(Duration::from_secs(5), second.read_to_end(&mut second_received))
        .await
        .expect("second connection never served")
        .unwrap();
    assert_eq!(second_received, EXPECTED_HTML.to_vec());

    wait_for_idle(&gate).await;
    server.abort();
}
