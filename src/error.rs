//! Error types for the connection-handling core.
//!
//! Every error here is connection-scoped: a handler that returns one closes its
//! own socket and gives back its admission slot. Nothing in this module is
//! allowed to take the dispatcher down.

use std::io;
use std::path::PathBuf;

/// Failure while pulling bytes out of a connection.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The stream kept failing and the retry budget ran out.
    #[error("read failed {attempts} times in a row")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The stream ended before an exact-count read was satisfied.
    #[error("stream ended after {available} of {requested} bytes")]
    UnexpectedEof { requested: usize, available: usize },
}

/// Fatal error for a single connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("failed to send response")]
    Send(#[source] io::Error),

    #[error("peer stopped accepting bytes")]
    WriteZero,

    /// The resource passed its existence check but could not be opened or read
    /// once the 200 status line was committed.
    #[error("resource {} became unavailable", path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The resource size no longer matches the advertised Content-Length.
    #[error("resource {} changed size: advertised {expected} bytes, found {actual}", path.display())]
    ResourceChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}
