//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use beacon::http::resource::{FileSystem, LocalFileSystem};
use beacon::server::Acceptor;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::time::Instant;

/// One scripted result of a read call.
#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// An `AsyncRead` that replays a script: each step answers exactly one read.
/// Once the script is empty every read reports end-of-input.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    steps: VecDeque<Step>,
    pub reads: usize,
}

impl ScriptedReader {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            reads: 0,
        }
    }

    /// Delivers `chunks` one per read, then end-of-input.
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self::new(chunks.into_iter().map(|c| Step::Data(c.as_ref().to_vec())))
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reads += 1;
        match self.steps.pop_front() {
            None => Poll::Ready(Ok(())),
            Some(Step::Fail(kind)) => Poll::Ready(Err(io::Error::from(kind))),
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                if n < data.len() {
                    data.drain(..n);
                    self.steps.push_front(Step::Data(data));
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

/// A connection whose read side replays a script and whose write side
/// collects everything sent.
#[derive(Debug, Default)]
pub struct ScriptedStream {
    pub reader: ScriptedReader,
    pub written: Vec<u8>,
}

impl ScriptedStream {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            reader: ScriptedReader::new(steps),
            written: Vec::new(),
        }
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hands out scripted accept results, recording when each accept was
/// attempted. Pends forever once the script runs out.
pub struct ScriptedAcceptor {
    results: VecDeque<io::Result<DuplexStream>>,
    pub attempts: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedAcceptor {
    pub fn new(results: impl IntoIterator<Item = io::Result<DuplexStream>>) -> Self {
        Self {
            results: results.into_iter().collect(),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Acceptor for ScriptedAcceptor {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> io::Result<(DuplexStream, SocketAddr)> {
        self.attempts.lock().unwrap().push(Instant::now());
        match self.results.pop_front() {
            Some(result) => result.map(|stream| (stream, SocketAddr::from(([127, 0, 0, 1], 9)))),
            None => std::future::pending().await,
        }
    }
}

/// Reports every file as `extra` bytes larger than it really is, so streaming
/// fails after the 200 head has gone out.
#[derive(Debug, Clone, Copy)]
pub struct GrowingFs {
    pub extra: u64,
}

#[async_trait]
impl FileSystem for GrowingFs {
    async fn exists_and_readable(&self, path: &Path) -> bool {
        LocalFileSystem.exists_and_readable(path).await
    }

    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(LocalFileSystem.file_size(path).await? + self.extra)
    }

    async fn open_for_read(&self, path: &Path) -> io::Result<File> {
        LocalFileSystem.open_for_read(path).await
    }
}

/// Claims every path exists with a fixed size, but refuses to open anything.
#[derive(Debug, Clone, Copy)]
pub struct VanishingFs;

#[async_trait]
impl FileSystem for VanishingFs {
    async fn exists_and_readable(&self, _path: &Path) -> bool {
        true
    }

    async fn file_size(&self, _path: &Path) -> io::Result<u64> {
        Ok(5)
    }

    async fn open_for_read(&self, _path: &Path) -> io::Result<File> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }
}

/// A document root with a few files in it.
pub fn document_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("a")).unwrap();
    std::fs::write(dir.path().join("a/b.html"), b"<h1>hello</h1>\n").unwrap();
    std::fs::write(dir.path().join("style.css"), b"body { color: red; }").unwrap();
    std::fs::write(dir.path().join("app.js"), b"console.log(1);").unwrap();
    std::fs::write(dir.path().join("blob.bin"), vec![0u8, 1, 2, 255, b'\n', 0]).unwrap();
    dir
}

pub fn path_in(root: &tempfile::TempDir, relative: &str) -> PathBuf {
    root.path().join(relative)
}
