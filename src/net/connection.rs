//! Per-connection state machine (§4.6): read → parse/execute → write on
//! each readiness event, tearing itself down on EOF, protocol error, or a
//! non-benign I/O error.
//!
//! Uses a growable, doubling read buffer rather than a fixed-size buffer
//! pool, since connections here can carry arbitrarily large command
//! bodies.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::protocol::{Command, Parser};
use crate::store::Store;

const INITIAL_READ_BUF: usize = 4096;

/// What the reactor should do with a connection after an `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Keep the connection registered; `wants_write` says whether it also
    /// needs `WRITABLE` interest right now.
    Continue { wants_write: bool },
    /// Tear the connection down: deregister and close the socket.
    Close,
}

/// A command whose header has been parsed but whose body has not yet
/// fully arrived.
struct PendingCommand {
    command: Command,
    body_size: usize,
}

pub(crate) struct Connection<T> {
    stream: T,
    read_buf: Vec<u8>,
    filled: usize,
    parser: Parser,
    pending: Option<PendingCommand>,
    output: VecDeque<u8>,
    bailout: bool,
}

impl<T: Read + Write> Connection<T> {
    pub(crate) fn new(stream: T) -> Self {
        Connection {
            stream,
            read_buf: vec![0u8; INITIAL_READ_BUF],
            filled: 0,
            parser: Parser::new(),
            pending: None,
            output: VecDeque::new(),
            bailout: false,
        }
    }

    pub(crate) fn stream_mut(&mut self) -> &mut T {
        &mut self.stream
    }

    /// Drives this connection through as much of read→parse/execute→write
    /// as the current readiness allows (§4.6).
    pub(crate) fn advance(&mut self, store: &dyn Store, readable: bool, writable: bool) -> Outcome {
        if readable && !self.bailout {
            if let Err(err) = self.read_phase() {
                if !err.is_transient() {
                    self.bailout = true;
                }
            }
        }

        // Runs even if the read above just set `bailout`: bytes read
        // before a 0-length read (EOF) still deserve a reply.
        self.parse_execute_phase(store);

        if writable || !self.output.is_empty() {
            if let Err(err) = self.write_phase() {
                if !err.is_transient() {
                    return Outcome::Close;
                }
            }
        }

        if self.bailout && self.output.is_empty() {
            return Outcome::Close;
        }

        Outcome::Continue {
            wants_write: !self.output.is_empty(),
        }
    }

    /// Reads until the socket would block, reports EOF, or errors,
    /// growing the buffer by doubling when it fills up (§4.6 step 2).
    fn read_phase(&mut self) -> Result<(), crate::error::Error> {
        loop {
            if self.filled == self.read_buf.len() {
                self.read_buf.resize(self.read_buf.len() * 2, 0);
            }
            match self.stream.read(&mut self.read_buf[self.filled..]) {
                Ok(0) => {
                    self.bailout = true;
                    return Err(crate::error::Error::PeerClosed);
                }
                Ok(n) => {
                    self.filled += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(());
                }
                Err(e) => {
                    return Err(crate::error::Error::from_io(e));
                }
            }
        }
    }

    /// While a command can be recognised and, once recognised, its body
    /// has fully arrived, runs it and appends the reply (§4.6 step 3).
    fn parse_execute_phase(&mut self, store: &dyn Store) {
        loop {
            if self.pending.is_none() {
                let (consumed, complete) = self.parser.parse(&self.read_buf[..self.filled]);
                self.consume_input(consumed);
                if !complete {
                    break;
                }
                match self.parser.build() {
                    Ok((command, body_size)) => {
                        self.pending = Some(PendingCommand { command, body_size });
                    }
                    Err(msg) => {
                        let err = crate::error::Error::Protocol(msg);
                        self.push_reply(&err.client_reply());
                        self.parser.reset();
                        self.bailout = true;
                        break;
                    }
                }
            }

            let Some(pending) = &self.pending else { break };
            let need = pending.body_size + if pending.command.has_body() { 2 } else { 0 };
            if self.filled < need {
                break;
            }

            let pending = self.pending.take().expect("checked above");
            let body = &self.read_buf[..pending.body_size];
            let result = pending.command.execute(store, body);
            self.consume_input(need);
            self.parser.reset();
            match result {
                Ok(Some(reply)) => self.push_reply(&reply),
                Ok(None) => {}
                Err(err) => self.push_reply(&err.client_reply()),
            }
        }
    }

    fn consume_input(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.read_buf.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    fn push_reply(&mut self, bytes: &[u8]) {
        self.output.extend(bytes.iter().copied());
    }

    /// Writes pending output until drained or the socket would block
    /// (§4.6 step 4).
    fn write_phase(&mut self) -> Result<(), crate::error::Error> {
        while !self.output.is_empty() {
            let (first, _) = self.output.as_slices();
            match self.stream.write(first) {
                Ok(0) => return Err(crate::error::Error::PeerClosed),
                Ok(n) => {
                    self.output.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(());
                }
                Err(e) => return Err(crate::error::Error::from_io(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GlobalLockStore;
    use std::io::Cursor;

    /// An in-memory duplex stream good enough to drive `Connection` in
    /// tests without opening a real socket.
    struct MemStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for MemStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.input.read(buf)?;
            if n == 0 {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "no more input"))
            } else {
                Ok(n)
            }
        }
    }

    impl Write for MemStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run(input: &[u8], store: &dyn Store) -> Vec<u8> {
        let stream = MemStream {
            input: Cursor::new(input.to_vec()),
            output: Vec::new(),
        };
        let mut conn = Connection::new(stream);
        conn.advance(store, true, true);
        conn.stream.output
    }

    #[test]
    fn basic_set_get_roundtrip() {
        let store = GlobalLockStore::new(8);
        let out = run(b"set var 0 0 6\r\nfoobar\r\nget var\r\n", &store);
        assert_eq!(out, b"STORED\r\nVALUE var 0 6\r\nfoobar\r\nEND\r\n");
    }

    #[test]
    fn delete_of_missing_key() {
        let store = GlobalLockStore::new(8);
        let out = run(b"delete nope\r\n", &store);
        assert_eq!(out, b"NOT_FOUND\r\n");
    }

    #[test]
    fn malformed_command_reports_client_error_and_bails_out() {
        let store = GlobalLockStore::new(8);
        let stream = MemStream {
            input: Cursor::new(b"set var 0 0 six\r\n".to_vec()),
            output: Vec::new(),
        };
        let mut conn = Connection::new(stream);
        let outcome = conn.advance(&store, true, true);
        assert!(conn.stream.output.starts_with(b"CLIENT_ERROR"));
        assert_eq!(outcome, Outcome::Close);
    }

    #[test]
    fn partial_body_waits_for_more_input() {
        let store = GlobalLockStore::new(8);
        let stream = MemStream {
            input: Cursor::new(b"set var 0 0 6\r\nfoo".to_vec()),
            output: Vec::new(),
        };
        let mut conn = Connection::new(stream);
        let outcome = conn.advance(&store, true, true);
        assert!(conn.stream.output.is_empty());
        assert_eq!(outcome, Outcome::Continue { wants_write: false });
        assert_eq!(store.get(b"var"), None);
    }
}
