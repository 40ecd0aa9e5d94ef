//! Top-level server lifecycle: `Start`/`Stop`/`Join` (§6), wiring the
//! configured store and worker count into the reactor loop.
//!
//! `SIGPIPE` is masked process-wide before any worker thread is spawned
//! (§5 "Signal policy", §9 "Global masking of pipe-signal"), and worker
//! handles are kept around for a later `Join`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::info;

use crate::config::{Config, StorageKind};
use crate::error::{Error, Result};
use crate::net::{worker_loop, FifoConfig};
use crate::store::{GlobalLockStore, RwLockStore, Store, StripedStore};

#[cfg(unix)]
use crate::net::fifo::log_fifo_enabled;

/// A running cache server: one reactor worker thread per
/// [`Config::workers`], sharing one [`Store`] behind the configured
/// concurrency wrapper.
pub struct Server {
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<Result<()>>>,
}

fn build_store(config: &Config) -> Arc<dyn Store + Send + Sync> {
    let capacity = config.capacity_nonzero().get();
    match config.storage {
        StorageKind::MapGlobal => Arc::new(GlobalLockStore::new(capacity)),
        StorageKind::MapRwlock => Arc::new(RwLockStore::new(capacity)),
        StorageKind::MapStriped => Arc::new(StripedStore::with_default_stripes(capacity)),
    }
}

/// Masks `SIGPIPE` process-wide so a write to a closed peer surfaces as
/// `EPIPE` instead of terminating the process. Must run before any worker
/// thread is spawned so the mask is inherited (§9).
fn mask_sigpipe() {
    #[cfg(unix)]
    {
        // SIG_IGN = 1 on every POSIX platform this crate targets. Avoided
        // pulling in `libc` for a single raw `signal(2)` call.
        const SIG_IGN: usize = 1;
        const SIGPIPE: i32 = 13;
        extern "C" {
            fn signal(signum: i32, handler: usize) -> usize;
        }
        // Safety: `signal` with `SIG_IGN` only installs a no-op disposition;
        // it touches no Rust state and cannot be called concurrently in a
        // way that causes a data race (process-wide signal disposition is
        // managed by the kernel).
        unsafe {
            signal(SIGPIPE, SIG_IGN);
        }
    }
}

impl Server {
    /// Starts the server: masks `SIGPIPE`, builds the configured store,
    /// and spawns `config.workers` reactor threads. If both FIFO paths
    /// are set, worker 0 additionally services that FIFO pair on its own
    /// `Poll` rather than a dedicated thread (§4.5 "optionally one FIFO
    /// handler" per worker, §6).
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;
        mask_sigpipe();

        let store = build_store(&config);
        let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
        let shutdown = Arc::new(AtomicBool::new(false));

        #[cfg(unix)]
        let mut fifo_config = match (&config.readfifo, &config.writefifo) {
            (Some(read_path), Some(write_path)) => {
                log_fifo_enabled(read_path, write_path);
                Some(FifoConfig {
                    read_path: read_path.clone(),
                    write_path: write_path.clone(),
                })
            }
            _ => None,
        };
        #[cfg(not(unix))]
        let mut fifo_config: Option<FifoConfig> = None;

        let mut workers = Vec::with_capacity(config.workers as usize);
        info!(workers = config.workers, port = config.port, "starting server");

        for worker_id in 0..config.workers.max(1) {
            let store = Arc::clone(&store);
            let shutdown = Arc::clone(&shutdown);
            let fifo = if worker_id == 0 { fifo_config.take() } else { None };
            let handle = std::thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id as usize, addr, store, shutdown, fifo))
                .map_err(Error::Fatal)?;
            workers.push(handle);
        }

        Ok(Server { shutdown, workers })
    }

    /// Signals every worker to stop at its next poll iteration. Does not
    /// block; call [`Server::join`] to wait for completion.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Waits for every worker thread, re-raising the first fatal error
    /// any of them reported (§7 propagation rule).
    pub fn join(self) -> Result<()> {
        let mut first_error = None;
        for handle in self.workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(Error::Fatal(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "worker thread panicked",
                    )));
                }
            };
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
