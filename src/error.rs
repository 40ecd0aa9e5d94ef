//! Error taxonomy (§7), implemented as a single `thiserror` enum (§1a).

use std::io;

/// Errors that can arise while servicing one connection. Only [`Error::Fatal`]
/// ever crosses the worker-thread boundary (§7 propagation rule); every
/// other variant is absorbed by the connection state machine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `EAGAIN`/`EWOULDBLOCK` — recovered locally by yielding to the
    /// reactor. Not normally constructed; kept so call sites can match on
    /// the full taxonomy even though this variant is filtered out before
    /// reaching one.
    #[error("transient I/O condition")]
    TransientIo,

    /// Zero-byte read, or a write that returned `EPIPE` — the peer is gone.
    #[error("peer closed the connection")]
    PeerClosed,

    /// The parser rejected the byte stream; `msg` is surfaced to the client
    /// verbatim as `CLIENT_ERROR <msg>`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A command failed at execution time; `msg` is surfaced to the client
    /// as `SERVER_ERROR <msg>`. The connection survives.
    #[error("execution error: {0}")]
    Execution(String),

    /// `listen`/`bind`/registration failure. The owning worker thread exits
    /// with this error; `Server::join` re-raises it.
    #[error("fatal server error: {0}")]
    Fatal(#[source] io::Error),
}

impl Error {
    /// Classifies a raw I/O error as it would be observed after a
    /// `read`/`write`/`accept` syscall, per §4.8's failure semantics.
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => Error::TransientIo,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Error::PeerClosed,
            _ => Error::Fatal(err),
        }
    }

    /// Whether this error is benign and the reactor should simply wait for
    /// the next readiness notification (§4.8).
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo)
    }

    /// The exact reply line a client should see for a recoverable protocol
    /// or execution failure (§4.6 step 3, §7). Only meaningful for
    /// [`Error::Protocol`] and [`Error::Execution`] — the variants this
    /// state machine actually surfaces to a peer.
    pub(crate) fn client_reply(&self) -> Vec<u8> {
        match self {
            Error::Protocol(msg) => format!("CLIENT_ERROR {msg}\r\n").into_bytes(),
            Error::Execution(msg) => format!("SERVER_ERROR {msg}\r\n").into_bytes(),
            other => format!("SERVER_ERROR {other}\r\n").into_bytes(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
