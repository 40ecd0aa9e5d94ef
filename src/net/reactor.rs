//! The readiness-based worker loop (§4.5): one `mio::Poll` per worker
//! thread, a fixed event-batch capacity, and a bounded wait timeout so the
//! loop can observe the shutdown flag.
//!
//! `mio` plus `slab` for the connection table, `socket2` for the
//! `SO_REUSEPORT` listener, `tracing` for structured logging.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tracing::{debug, error, info, warn};

use super::connection::{Connection, Outcome};
use crate::error::Error;
use crate::store::Store;

#[cfg(unix)]
use super::fifo::{FifoHandler, FIFO_TOKEN};

const LISTENER_TOKEN: Token = Token(usize::MAX);
const EVENT_BATCH: usize = 10;
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// The FIFO pair a worker should additionally service on its own `Poll`,
/// passed only to the worker chosen to host it (§4.5 "optionally one FIFO
/// handler" per worker thread). Unconditional (not `cfg(unix)`) purely so
/// `worker_loop`'s signature doesn't need to vary by platform; the FIFO
/// mechanics it wraps are unix-only and gated where they're used below.
pub(crate) struct FifoConfig {
    pub(crate) read_path: std::path::PathBuf,
    pub(crate) write_path: std::path::PathBuf,
}

/// Runs one worker's accept-and-service loop until `shutdown` is raised.
/// Only a fatal listener-level failure returns `Err` (§4.8); everything
/// else is absorbed per-connection. If `fifo` is set, the same `Poll`
/// also services that FIFO pair, so the worker never needs a second
/// reactor thread to speak both transports.
pub(crate) fn worker_loop(
    worker_id: usize,
    addr: SocketAddr,
    store: Arc<dyn Store + Send + Sync>,
    shutdown: Arc<AtomicBool>,
    fifo: Option<FifoConfig>,
) -> Result<(), Error> {
    let mut poll = Poll::new().map_err(Error::Fatal)?;
    let mut events = Events::with_capacity(EVENT_BATCH);

    let std_listener = create_listener_with_reuseport(addr).map_err(Error::Fatal)?;
    let mut listener = TcpListener::from_std(std_listener);
    poll.registry()
        .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
        .map_err(Error::Fatal)?;

    let mut connections: Slab<Connection<TcpStream>> = Slab::new();

    #[cfg(not(unix))]
    let _ = fifo;

    #[cfg(unix)]
    let mut fifo_handler = match fifo {
        Some(cfg) => {
            let mut handler =
                FifoHandler::open(&cfg.read_path, &cfg.write_path).map_err(Error::Fatal)?;
            handler.register(&mut poll).map_err(Error::Fatal)?;
            info!(worker = worker_id, "fifo frontend attached to this worker");
            Some(handler)
        }
        None => None,
    };

    info!(worker = worker_id, %addr, "worker started");

    while !shutdown.load(Ordering::Relaxed) {
        match poll.poll(&mut events, Some(WAIT_TIMEOUT)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Fatal(e)),
        }

        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => {
                    if event.is_error() {
                        return Err(Error::Fatal(io::Error::new(
                            io::ErrorKind::Other,
                            "listener reported an error",
                        )));
                    }
                    accept_loop(&listener, &mut poll, &mut connections, worker_id);
                }
                #[cfg(unix)]
                FIFO_TOKEN => {
                    if let Some(handler) = fifo_handler.as_mut() {
                        handler.advance(&mut poll, store.as_ref())?;
                    }
                }
                Token(conn_id) => {
                    service_connection(conn_id, &mut poll, &mut connections, store.as_ref(), &event);
                }
            }
        }
    }

    info!(worker = worker_id, "worker stopping");
    Ok(())
}

/// Drains `accept()` until it would block, per §4.5's accept loop.
fn accept_loop(
    listener: &TcpListener,
    poll: &mut Poll,
    connections: &mut Slab<Connection<TcpStream>>,
    worker_id: usize,
) {
    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                let entry = connections.vacant_entry();
                let conn_id = entry.key();
                let mut connection = Connection::new(stream);
                if let Err(e) = poll.registry().register(
                    connection.stream_mut(),
                    Token(conn_id),
                    Interest::READABLE | Interest::WRITABLE,
                ) {
                    warn!(worker = worker_id, error = %e, "failed to register connection");
                    continue;
                }
                entry.insert(connection);
                debug!(worker = worker_id, conn_id, peer = %peer_addr, "accepted connection");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(worker = worker_id, error = %e, "accept failed");
                break;
            }
        }
    }
}

fn service_connection(
    conn_id: usize,
    poll: &mut Poll,
    connections: &mut Slab<Connection<TcpStream>>,
    store: &(dyn Store + Send + Sync),
    event: &mio::event::Event,
) {
    let Some(conn) = connections.get_mut(conn_id) else {
        return;
    };

    if event.is_error() || (event.is_read_closed() && event.is_write_closed()) {
        close_connection(poll, connections, conn_id);
        return;
    }

    match conn.advance(store, event.is_readable(), event.is_writable()) {
        Outcome::Close => close_connection(poll, connections, conn_id),
        Outcome::Continue { wants_write } => {
            let interest = if wants_write {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            let conn = connections.get_mut(conn_id).expect("checked above");
            if let Err(e) = poll
                .registry()
                .reregister(conn.stream_mut(), Token(conn_id), interest)
            {
                error!(conn_id, error = %e, "failed to reregister connection");
                close_connection(poll, connections, conn_id);
            }
        }
    }
}

fn close_connection(
    poll: &mut Poll,
    connections: &mut Slab<Connection<TcpStream>>,
    conn_id: usize,
) {
    if let Some(mut conn) = connections.try_remove(conn_id) {
        let _ = poll.registry().deregister(conn.stream_mut());
        debug!(conn_id, "connection closed");
    }
}

/// `SO_REUSEPORT` listener so each worker owns its own kernel-balanced
/// accept queue (§3 "Ownership").
fn create_listener_with_reuseport(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(SockProtocol::TCP),
    )?;

    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}
