//! The closed command set (§4.4): each variant knows how to execute
//! against a store and format the canonical reply tokens.
//!
//! Each verb maps a boolean store result straight onto a reply token;
//! `append`/`prepend` are read-modify-write in terms of `get`/`set` rather
//! than a separate storage primitive (§9).

use crate::error::Error;
use crate::store::Store;

const CRLF: &[u8] = b"\r\n";

/// The largest value this server will hold for one key, matching real
/// memcached's default `-I` item size limit. A `set`/`add`/`replace` body
/// over this, or an `append`/`prepend` whose result would cross it, fails
/// execution rather than storing a partial or oversized entry.
const MAX_VALUE_BYTES: usize = 1024 * 1024;

/// A fully-parsed request, ready to run against a store once its body (if
/// any) has been read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: Vec<u8>, noreply: bool },
    Add { key: Vec<u8>, noreply: bool },
    Replace { key: Vec<u8>, noreply: bool },
    Append { key: Vec<u8>, noreply: bool },
    Prepend { key: Vec<u8>, noreply: bool },
    Get { keys: Vec<Vec<u8>> },
    Delete { key: Vec<u8>, noreply: bool },
}

impl Command {
    /// Whether this command expects a body line after its header (every
    /// `set`-family verb) or not (`get`, `delete`).
    pub fn has_body(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Add { .. }
                | Command::Replace { .. }
                | Command::Append { .. }
                | Command::Prepend { .. }
        )
    }

    fn noreply(&self) -> bool {
        match self {
            Command::Set { noreply, .. }
            | Command::Add { noreply, .. }
            | Command::Replace { noreply, .. }
            | Command::Append { noreply, .. }
            | Command::Prepend { noreply, .. }
            | Command::Delete { noreply, .. } => *noreply,
            Command::Get { .. } => false,
        }
    }

    /// Runs the command against `store`. `body` is the payload already
    /// stripped of its trailing CRLF (§4.3's `body_size` bytes, exactly).
    ///
    /// Returns the reply bytes to send, or `Ok(None)` if `noreply`
    /// suppressed them — the store mutation still happened (§4.4). Fails
    /// with [`Error::Execution`] if storing `body` would exceed
    /// `MAX_VALUE_BYTES`; an execution failure is reported to the client
    /// regardless of `noreply` and never suppresses the store's existing
    /// state (§7).
    pub fn execute(&self, store: &dyn Store, body: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let reply = match self {
            Command::Set { key, .. } => {
                too_large(body.len())?;
                store.put(key.clone(), body.to_vec());
                b"STORED".to_vec()
            }
            Command::Add { key, .. } => {
                too_large(body.len())?;
                if store.put_if_absent(key.clone(), body.to_vec()) {
                    b"STORED".to_vec()
                } else {
                    b"NOT_STORED".to_vec()
                }
            }
            Command::Replace { key, .. } => {
                too_large(body.len())?;
                if store.set(key.clone(), body.to_vec()) {
                    b"STORED".to_vec()
                } else {
                    b"NOT_STORED".to_vec()
                }
            }
            Command::Append { key, .. } => match store.get(key) {
                Some(mut existing) => {
                    too_large(existing.len() + body.len())?;
                    existing.extend_from_slice(body);
                    store.set(key.clone(), existing);
                    b"STORED".to_vec()
                }
                None => b"NOT_STORED".to_vec(),
            },
            Command::Prepend { key, .. } => match store.get(key) {
                Some(existing) => {
                    too_large(existing.len() + body.len())?;
                    let mut combined = body.to_vec();
                    combined.extend_from_slice(&existing);
                    store.set(key.clone(), combined);
                    b"STORED".to_vec()
                }
                None => b"NOT_STORED".to_vec(),
            },
            Command::Delete { key, .. } => {
                if store.delete(key) {
                    b"DELETED".to_vec()
                } else {
                    b"NOT_FOUND".to_vec()
                }
            }
            Command::Get { keys } => {
                let mut out = Vec::new();
                for key in keys {
                    if let Some(value) = store.get(key) {
                        out.extend_from_slice(b"VALUE ");
                        out.extend_from_slice(key);
                        out.extend_from_slice(format!(" 0 {}", value.len()).as_bytes());
                        out.extend_from_slice(CRLF);
                        out.extend_from_slice(&value);
                        out.extend_from_slice(CRLF);
                    }
                }
                out.extend_from_slice(b"END");
                out
            }
        };

        if self.noreply() {
            return Ok(None);
        }
        let mut framed = reply;
        framed.extend_from_slice(CRLF);
        Ok(Some(framed))
    }
}

/// Rejects a value of `len` bytes with the same execution failure real
/// memcached reports for an over-sized item.
fn too_large(len: usize) -> Result<(), Error> {
    if len > MAX_VALUE_BYTES {
        Err(Error::Execution(format!(
            "object too large for cache: {len} bytes (max {MAX_VALUE_BYTES})"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GlobalLockStore;

    #[test]
    fn set_reports_stored() {
        let store = GlobalLockStore::new(8);
        let cmd = Command::Set {
            key: b"k".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"v").unwrap(), Some(b"STORED\r\n".to_vec()));
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn add_refuses_existing_key() {
        let store = GlobalLockStore::new(8);
        store.put(b"k".to_vec(), b"orig".to_vec());
        let cmd = Command::Add {
            key: b"k".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"new").unwrap(), Some(b"NOT_STORED\r\n".to_vec()));
        assert_eq!(store.get(b"k"), Some(b"orig".to_vec()));
    }

    #[test]
    fn replace_refuses_missing_key() {
        let store = GlobalLockStore::new(8);
        let cmd = Command::Replace {
            key: b"k".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"v").unwrap(), Some(b"NOT_STORED\r\n".to_vec()));
    }

    #[test]
    fn append_extends_existing_value() {
        let store = GlobalLockStore::new(8);
        store.put(b"k".to_vec(), b"foo".to_vec());
        let cmd = Command::Append {
            key: b"k".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"bar").unwrap(), Some(b"STORED\r\n".to_vec()));
        assert_eq!(store.get(b"k"), Some(b"foobar".to_vec()));
    }

    #[test]
    fn prepend_prefixes_existing_value() {
        let store = GlobalLockStore::new(8);
        store.put(b"k".to_vec(), b"bar".to_vec());
        let cmd = Command::Prepend {
            key: b"k".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"foo").unwrap(), Some(b"STORED\r\n".to_vec()));
        assert_eq!(store.get(b"k"), Some(b"foobar".to_vec()));
    }

    #[test]
    fn append_on_missing_key_is_not_stored() {
        let store = GlobalLockStore::new(8);
        let cmd = Command::Append {
            key: b"k".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"bar").unwrap(), Some(b"NOT_STORED\r\n".to_vec()));
    }

    #[test]
    fn delete_reports_not_found() {
        let store = GlobalLockStore::new(8);
        let cmd = Command::Delete {
            key: b"nope".to_vec(),
            noreply: false,
        };
        assert_eq!(cmd.execute(&store, b"").unwrap(), Some(b"NOT_FOUND\r\n".to_vec()));
    }

    #[test]
    fn get_reports_end_with_no_matches() {
        let store = GlobalLockStore::new(8);
        let cmd = Command::Get { keys: vec![b"nope".to_vec()] };
        assert_eq!(cmd.execute(&store, b"").unwrap(), Some(b"END\r\n".to_vec()));
    }

    #[test]
    fn get_reports_value_then_end() {
        let store = GlobalLockStore::new(8);
        store.put(b"var".to_vec(), b"foobar".to_vec());
        let cmd = Command::Get { keys: vec![b"var".to_vec()] };
        assert_eq!(
            cmd.execute(&store, b"").unwrap(),
            Some(b"VALUE var 0 6\r\nfoobar\r\nEND\r\n".to_vec())
        );
    }

    #[test]
    fn noreply_suppresses_output_but_not_mutation() {
        let store = GlobalLockStore::new(8);
        let cmd = Command::Set {
            key: b"k".to_vec(),
            noreply: true,
        };
        assert_eq!(cmd.execute(&store, b"v").unwrap(), None);
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn set_over_max_value_size_fails_execution_and_does_not_store() {
        let store = GlobalLockStore::new(8);
        let oversized = vec![0u8; MAX_VALUE_BYTES + 1];
        let cmd = Command::Set {
            key: b"k".to_vec(),
            noreply: false,
        };
        let err = cmd.execute(&store, &oversized).unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(err.client_reply(), b"SERVER_ERROR object too large for cache: 1048577 bytes (max 1048576)\r\n");
        assert_eq!(store.get(b"k"), None);
    }

    #[test]
    fn append_over_max_value_size_fails_execution_and_leaves_original_value() {
        let store = GlobalLockStore::new(8);
        store.put(b"k".to_vec(), vec![0u8; MAX_VALUE_BYTES - 1]);
        let cmd = Command::Append {
            key: b"k".to_vec(),
            noreply: false,
        };
        let err = cmd.execute(&store, &[0u8; 2]).unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(store.get(b"k"), Some(vec![0u8; MAX_VALUE_BYTES - 1]));
    }
}
