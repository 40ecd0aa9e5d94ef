//! The request-multiplexing network engine: a readiness-based reactor
//! (§4.5) driving per-connection state machines (§4.6), plus an optional
//! named-pipe frontend (§4.7).

pub(crate) mod connection;
pub(crate) mod reactor;

#[cfg(unix)]
pub(crate) mod fifo;

pub(crate) use reactor::{worker_loop, FifoConfig};
