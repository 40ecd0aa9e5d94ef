//! Named-pipe frontend (§4.7): reads commands from one FIFO and writes
//! replies to another, for a single client without a TCP listener.
//!
//! The write side is opened read-write (not write-only) specifically to
//! avoid a spurious EOF on the read side if a peer briefly reconnects.
//! Reuses [`super::connection::Connection`]'s state machine rather than a
//! second hand-rolled read/parse/write loop. Unix-only: named pipes are a
//! POSIX construct.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use mio::unix::SourceFd;
use mio::{Interest, Poll, Token};
use tracing::{debug, info, warn};

use super::connection::{Connection, Outcome};
use crate::error::Error;
use crate::store::Store;

/// The Linux value of `O_NONBLOCK`. Hardcoded rather than pulling in a
/// dependency (`libc`/`nix`) for one flag; FIFOs are a Linux/POSIX-only
/// feature to begin with.
const O_NONBLOCK: i32 = 0o4000;

/// A duplex transport over two independent file descriptors, so
/// [`Connection`] can drive a FIFO pair exactly as it drives a
/// `TcpStream`.
struct FifoDuplex {
    read_fd: File,
    write_fd: File,
}

impl io::Read for FifoDuplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.read_fd, buf)
    }
}

impl io::Write for FifoDuplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.write_fd, buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.write_fd)
    }
}

/// Token used to register the FIFO pair's read side with the worker's
/// `Poll`. Distinct from the listener token and any connection slab key.
pub(crate) const FIFO_TOKEN: Token = Token(usize::MAX - 1);

pub(crate) struct FifoHandler {
    connection: Connection<FifoDuplex>,
    read_path: std::path::PathBuf,
    write_path: std::path::PathBuf,
}

impl FifoHandler {
    /// Opens the read FIFO read-only non-blocking and the write FIFO
    /// read-write non-blocking (the read-write mode is what prevents a
    /// spurious EOF if the remote peer briefly disconnects, per §6).
    pub(crate) fn open(read_path: &Path, write_path: &Path) -> io::Result<Self> {
        let read_fd = OpenOptions::new()
            .read(true)
            .custom_flags(O_NONBLOCK)
            .open(read_path)?;
        let write_fd = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_NONBLOCK)
            .open(write_path)?;
        let duplex = FifoDuplex { read_fd, write_fd };
        Ok(FifoHandler {
            connection: Connection::new(duplex),
            read_path: read_path.to_path_buf(),
            write_path: write_path.to_path_buf(),
        })
    }

    pub(crate) fn register(&mut self, poll: &mut Poll) -> io::Result<()> {
        let fd = self.connection.stream_mut().read_fd.as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), FIFO_TOKEN, Interest::READABLE)
    }

    /// Services one readiness event. On EOF of the read side (the peer
    /// closed), closes and reopens both fds and resets parser/buffers
    /// so a subsequent peer can reconnect (§4.7).
    pub(crate) fn advance(&mut self, poll: &mut Poll, store: &dyn Store) -> Result<(), Error> {
        match self.connection.advance(store, true, true) {
            Outcome::Continue { .. } => Ok(()),
            Outcome::Close => {
                warn!("fifo peer closed, reopening pair");
                let fd = self.connection.stream_mut().read_fd.as_raw_fd();
                let _ = poll.registry().deregister(&mut SourceFd(&fd));
                let reopened = Self::open(&self.read_path, &self.write_path).map_err(Error::Fatal)?;
                *self = reopened;
                self.register(poll).map_err(Error::Fatal)?;
                debug!("fifo pair reopened");
                Ok(())
            }
        }
    }
}

pub(crate) fn log_fifo_enabled(read_path: &Path, write_path: &Path) {
    info!(read = %read_path.display(), write = %write_path.display(), "fifo frontend enabled");
}
