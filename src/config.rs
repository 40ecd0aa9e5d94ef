//! Server configuration (§1a / §6).
//!
//! A typed, `serde`-driven settings struct feeding the store and reactor
//! builders, deserialised from TOML rather than hand-rolling a flag parser
//! (command-line flag parsing itself stays out of scope per §1).

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Which [`crate::store`] concurrency wrapper to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    MapGlobal,
    MapRwlock,
    MapStriped,
}

impl Default for StorageKind {
    fn default() -> Self {
        StorageKind::MapGlobal
    }
}

/// Which reactor driver services connections. `mio` already abstracts
/// epoll/kqueue/IOCP behind one readiness API, so `Blocking`/`Nonblocking`
/// are preserved as configuration-file-compatible aliases of `Epoll`
/// rather than distinct drivers (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    Blocking,
    Epoll,
    Nonblocking,
}

impl Default for NetworkKind {
    fn default() -> Self {
        NetworkKind::Epoll
    }
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> u16 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u16)
        .unwrap_or(1)
}

fn default_capacity() -> usize {
    1024
}

/// Recognised settings (§6): `storage`, `network`, `port`, `workers`,
/// `capacity`, and an optional FIFO pair, deserialised from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub network: NetworkKind,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: u16,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    pub readfifo: Option<PathBuf>,
    pub writefifo: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageKind::default(),
            network: NetworkKind::default(),
            port: default_port(),
            workers: default_workers(),
            capacity: default_capacity(),
            readfifo: None,
            writefifo: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to
    /// [`Config::default`] field-by-field for anything the file omits.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(Error::Fatal)?;
        toml::from_str(&text).map_err(|e| {
            Error::Fatal(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Validates the FIFO pair invariant from §6: "either both or neither".
    pub fn validate(&self) -> Result<(), Error> {
        if self.readfifo.is_some() != self.writefifo.is_some() {
            return Err(Error::Fatal(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "readfifo and writefifo must be configured together",
            )));
        }
        if self.capacity == 0 {
            return Err(Error::Fatal(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "capacity must be positive",
            )));
        }
        Ok(())
    }

    pub(crate) fn capacity_nonzero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::new(1).unwrap())
    }
}
