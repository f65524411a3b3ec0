//! Mapping request URIs onto files under the document root.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tokio::fs::File;

use crate::http::mime::mime_type_for;
use crate::http::request::grammar;

/// Leading path portion of a URI, without params (`;...`) or query (`?...`).
static URI_PATH: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!("(?-u)^/?({})", grammar::path());
    Regex::new(&pattern).expect("path grammar is a valid regex")
});

/// Filesystem operations the request pipeline depends on.
///
/// Kept behind a trait so the handler can be driven against a filesystem that
/// misbehaves on purpose.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// True when `path` is an existing regular file the process can read.
    async fn exists_and_readable(&self, path: &Path) -> bool;

    async fn file_size(&self, path: &Path) -> io::Result<u64>;

    async fn open_for_read(&self, path: &Path) -> io::Result<File>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists_and_readable(&self, path: &Path) -> bool {
        let outcome = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => File::open(path).await.map(drop),
            Ok(_) => Err(io::Error::other("not a regular file")),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                match e.kind() {
                    io::ErrorKind::NotFound => {
                        tracing::debug!(path = %path.display(), "resource does not exist")
                    }
                    io::ErrorKind::PermissionDenied => {
                        tracing::debug!(path = %path.display(), "resource is not readable")
                    }
                    _ => tracing::debug!(path = %path.display(), error = %e, "resource rejected"),
                }
                false
            }
        }
    }

    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn open_for_read(&self, path: &Path) -> io::Result<File> {
        File::open(path).await
    }
}

/// Outcome of resolving a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedResource {
    Found {
        path: PathBuf,
        mime_type: &'static str,
    },
    NotFound {
        path: PathBuf,
    },
    /// No usable path could be pulled out of the URI.
    InvalidUri,
}

impl ResolvedResource {
    pub fn is_found(&self) -> bool {
        matches!(self, ResolvedResource::Found { .. })
    }
}

/// Extracts the relative file path from a URI, byte for byte.
///
/// Returns `None` when the URI has no path segment at all (e.g. `/` or `?q`)
/// or when a segment would climb out of the document root.
pub fn uri_path(uri: &[u8]) -> Option<&[u8]> {
    let captures = URI_PATH.captures(uri)?;
    let path = captures.get(1)?.as_bytes();

    if path.split(|&b| b == b'/').any(|segment| segment == b"..") {
        return None;
    }
    Some(path)
}

/// Turns raw URI path bytes into a relative path without re-encoding them.
#[cfg(unix)]
fn relative_path(bytes: &[u8]) -> Option<&Path> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Some(Path::new(OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn relative_path(bytes: &[u8]) -> Option<&Path> {
    std::str::from_utf8(bytes).ok().map(Path::new)
}

/// Resolves `uri` against `document_root` and asks `fs` whether the result can
/// be served.
pub async fn resolve_resource(
    uri: impl AsRef<[u8]>,
    document_root: &Path,
    fs: &dyn FileSystem,
) -> ResolvedResource {
    let uri = uri.as_ref();
    let Some(relative) = uri_path(uri).and_then(relative_path) else {
        tracing::debug!(uri = %String::from_utf8_lossy(uri), "no servable path in uri");
        return ResolvedResource::InvalidUri;
    };

    let path = document_root.join(relative);
    if fs.exists_and_readable(&path).await {
        let mime_type = mime_type_for(&path);
        ResolvedResource::Found { path, mime_type }
    } else {
        ResolvedResource::NotFound { path }
    }
}
