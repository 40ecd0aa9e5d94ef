//! Entry point: loads an optional TOML config path from the single
//! positional argument, starts the server, and blocks until its workers
//! exit.
//!
//! Command-line flag parsing, daemonisation, pidfile handling,
//! signal-driven shutdown and version reporting are explicitly out of
//! scope (§1) — this is deliberately the thinnest possible glue around
//! [`ramcached::Server`].

use ramcached::{Config, Server};

fn main() {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_path(path).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load config, using defaults");
            Config::default()
        }),
        None => Config::default(),
    };

    let server = match Server::start(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "server failed to start");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.join() {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
