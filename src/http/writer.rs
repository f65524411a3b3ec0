use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ConnectionError;
use crate::http::resource::FileSystem;
use crate::http::response::{Entity, ProtocolVersion, Response};

/// Default entity chunk size in bytes.
pub const DEFAULT_SEND_CHUNK_SIZE: usize = 1024;

/// Serializes the status line and headers. Simple (0.9) responses have none.
pub fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();

    if resp.version == ProtocolVersion::Http09 {
        return buf;
    }

    // Status line
    let status_line = format!(
        "{} {} {}\n",
        resp.version.as_str(),
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in resp.headers() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\n");

    buf
}

/// Where a response ended up once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The whole entity went out; carries its byte count.
    EntityStreamed(u64),
    NoEntity,
}

pub struct ResponseWriter {
    head: Vec<u8>,
    written: usize,
    entity: Option<Entity>,
    chunk_size: usize,
}

impl ResponseWriter {
    pub fn new(response: Response, chunk_size: usize) -> Self {
        Self {
            head: serialize_head(&response),
            written: 0,
            entity: response.entity,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Writes the head, then the entity if there is one.
    pub async fn write_to_stream<W>(
        &mut self,
        stream: &mut W,
        fs: &dyn FileSystem,
    ) -> Result<Delivery, ConnectionError>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.head.len() {
            let n = stream
                .write(&self.head[self.written..])
                .await
                .map_err(ConnectionError::Send)?;

            if n == 0 {
                return Err(ConnectionError::WriteZero);
            }

            self.written += n;
        }

        let delivery = match self.entity.take() {
            Some(entity) => {
                let sent = stream_entity(stream, &entity, fs, self.chunk_size).await?;
                Delivery::EntityStreamed(sent)
            }
            None => Delivery::NoEntity,
        };

        stream.flush().await.map_err(ConnectionError::Send)?;
        Ok(delivery)
    }
}

/// Streams exactly `entity.content_length` bytes of the file.
///
/// The file is reopened here, after the status line is already on the wire, so
/// any disappearance or size change since the existence check is fatal.
async fn stream_entity<W>(
    stream: &mut W,
    entity: &Entity,
    fs: &dyn FileSystem,
    chunk_size: usize,
) -> Result<u64, ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let path = entity.path.as_path();
    let mut file = fs
        .open_for_read(path)
        .await
        .map_err(|source| unavailable(path, source))?;

    let actual = file
        .metadata()
        .await
        .map_err(|source| unavailable(path, source))?
        .len();
    if actual != entity.content_length {
        return Err(changed(path, entity.content_length, actual));
    }

    let mut chunk = vec![0u8; chunk_size];
    let mut sent: u64 = 0;

    while sent < entity.content_length {
        let remaining = usize::try_from(entity.content_length - sent).unwrap_or(usize::MAX);
        let want = chunk_size.min(remaining);
        let n = file
            .read(&mut chunk[..want])
            .await
            .map_err(|source| unavailable(path, source))?;

        if n == 0 {
            return Err(changed(path, entity.content_length, sent));
        }

        let mut offset = 0;
        while offset < n {
            let w = stream
                .write(&chunk[offset..n])
                .await
                .map_err(ConnectionError::Send)?;
            if w == 0 {
                return Err(ConnectionError::WriteZero);
            }
            offset += w;
        }

        sent += n as u64;
    }

    Ok(sent)
}

fn unavailable(path: &Path, source: std::io::Error) -> ConnectionError {
    ConnectionError::ResourceUnavailable {
        path: path.to_path_buf(),
        source,
    }
}

fn changed(path: &Path, expected: u64, actual: u64) -> ConnectionError {
    ConnectionError::ResourceChanged {
        path: path.to_path_buf(),
        expected,
        actual,
    }
}
