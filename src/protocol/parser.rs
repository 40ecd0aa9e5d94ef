//! Resumable parser for the memcached text protocol subset (§4.3).
//!
//! The entire parser state is the fixed fields below — no hidden
//! coroutine state, so `Parse` tolerates an arbitrary byte split and a
//! byte-at-a-time feed produces the same result as a single call with the
//! whole line (§8 invariant 6, exercised in `resumability` below).

use super::command::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scanning the verb token, before the first space.
    Header,
    /// Verb recognised; scanning arguments up to CRLF.
    Args,
    /// A full command line parsed; `Build` is valid.
    Ready,
    /// `Build` has been called; `Reset` is required before the next `Parse`.
    Done,
}

/// A resumable header-line parser. One instance handles one command's
/// header at a time; call [`Parser::reset`] between commands.
#[derive(Debug)]
pub struct Parser {
    state: State,
    line: Vec<u8>,
    built: Option<(Command, usize)>,
    error: Option<String>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            state: State::Header,
            line: Vec::new(),
            built: None,
            error: None,
        }
    }

    /// Feeds `bytes` into the parser. Returns `(consumed, complete)`:
    /// `consumed` is how many leading bytes of `bytes` were absorbed (a
    /// parser in `Ready`/`Done` consumes none), and `complete` is whether
    /// a full header line (well-formed or not) has now been recognised.
    pub fn parse(&mut self, bytes: &[u8]) -> (usize, bool) {
        if matches!(self.state, State::Ready | State::Done) {
            return (0, true);
        }

        let mut consumed = 0;
        for &b in bytes {
            consumed += 1;
            if self.state == State::Header && b == b' ' {
                self.state = State::Args;
            }
            if b == b'\n' {
                if self.line.last() == Some(&b'\r') {
                    self.line.pop();
                }
                match parse_line(&self.line) {
                    Ok((command, body_size)) => {
                        self.built = Some((command, body_size));
                    }
                    Err(msg) => {
                        self.error = Some(msg);
                    }
                }
                self.state = State::Ready;
                return (consumed, true);
            }
            self.line.push(b);
        }
        (consumed, false)
    }

    /// Valid once `Parse` reports `complete`. Returns the parsed command
    /// and the body length the caller must still read (0 if the command
    /// has no body), or the rejection message on malformed input.
    pub fn build(&mut self) -> Result<(Command, usize), String> {
        debug_assert!(matches!(self.state, State::Ready));
        self.state = State::Done;
        match self.built.take() {
            Some(built) => Ok(built),
            None => Err(self
                .error
                .take()
                .unwrap_or_else(|| "malformed command".to_string())),
        }
    }

    /// Returns to the initial state, ready to parse the next command.
    pub fn reset(&mut self) {
        self.state = State::Header;
        self.line.clear();
        self.built = None;
        self.error = None;
    }
}

fn parse_line(line: &[u8]) -> Result<(Command, usize), String> {
    let tokens = split_strict(line)?;
    let verb = tokens.first().ok_or("empty command")?;

    match *verb {
        b"set" => parse_storage(&tokens, |key, noreply| Command::Set { key, noreply }),
        b"add" => parse_storage(&tokens, |key, noreply| Command::Add { key, noreply }),
        b"replace" => parse_storage(&tokens, |key, noreply| Command::Replace { key, noreply }),
        b"append" => parse_storage(&tokens, |key, noreply| Command::Append { key, noreply }),
        b"prepend" => parse_storage(&tokens, |key, noreply| Command::Prepend { key, noreply }),
        b"get" => {
            if tokens.len() < 2 {
                return Err("get requires at least one key".to_string());
            }
            let keys = tokens[1..].iter().map(|t| t.to_vec()).collect();
            Ok((Command::Get { keys }, 0))
        }
        b"delete" => {
            let (noreply, key_tokens) = strip_noreply(&tokens[1..]);
            if key_tokens.len() != 1 {
                return Err("delete requires exactly one key".to_string());
            }
            Ok((
                Command::Delete {
                    key: key_tokens[0].to_vec(),
                    noreply,
                },
                0,
            ))
        }
        _ => Err(format!(
            "unknown command {:?}",
            String::from_utf8_lossy(verb)
        )),
    }
}

/// Parses the shared `<verb> <key> <flags> <exptime> <bytes>[ noreply]`
/// shape used by `set`/`add`/`replace`/`append`/`prepend` (§4.3).
fn parse_storage(
    tokens: &[&[u8]],
    make: impl FnOnce(Vec<u8>, bool) -> Command,
) -> Result<(Command, usize), String> {
    let (noreply, rest) = strip_noreply(&tokens[1..]);
    let [key, flags, exptime, bytes] = rest.as_slice() else {
        return Err("storage command requires key, flags, exptime and bytes".to_string());
    };
    let _flags = parse_decimal(flags).ok_or("flags must be a non-negative decimal integer")?;
    let _exptime =
        parse_decimal(exptime).ok_or("exptime must be a non-negative decimal integer")?;
    let body_size =
        parse_decimal(bytes).ok_or("bytes must be a non-negative decimal integer")? as usize;
    Ok((make(key.to_vec(), noreply), body_size))
}

fn strip_noreply<'a>(tokens: &[&'a [u8]]) -> (bool, Vec<&'a [u8]>) {
    match tokens.last() {
        Some(&b"noreply") => (true, tokens[..tokens.len() - 1].to_vec()),
        _ => (false, tokens.to_vec()),
    }
}

/// Splits on single ASCII spaces, rejecting empty tokens (consecutive
/// spaces), matching §4.3's strict-whitespace requirement.
fn split_strict(line: &[u8]) -> Result<Vec<&[u8]>, String> {
    if line.is_empty() {
        return Err("empty command line".to_string());
    }
    let tokens: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err("malformed whitespace".to_string());
    }
    Ok(tokens)
}

fn parse_decimal(token: &[u8]) -> Option<u64> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_single_key() {
        let mut p = Parser::new();
        let (consumed, complete) = p.parse(b"get var\r\n");
        assert_eq!(consumed, 9);
        assert!(complete);
        let (cmd, body_size) = p.build().unwrap();
        assert_eq!(cmd, Command::Get { keys: vec![b"var".to_vec()] });
        assert_eq!(body_size, 0);
    }

    #[test]
    fn parses_get_multiple_keys() {
        let mut p = Parser::new();
        p.parse(b"get b c\r\n");
        let (cmd, _) = p.build().unwrap();
        assert_eq!(
            cmd,
            Command::Get { keys: vec![b"b".to_vec(), b"c".to_vec()] }
        );
    }

    #[test]
    fn parses_set_header_and_body_size() {
        let mut p = Parser::new();
        p.parse(b"set var 0 0 6\r\n");
        let (cmd, body_size) = p.build().unwrap();
        assert_eq!(
            cmd,
            Command::Set { key: b"var".to_vec(), noreply: false }
        );
        assert_eq!(body_size, 6);
    }

    #[test]
    fn parses_noreply_suffix() {
        let mut p = Parser::new();
        p.parse(b"set var 0 0 6 noreply\r\n");
        let (cmd, _) = p.build().unwrap();
        assert_eq!(cmd, Command::Set { key: b"var".to_vec(), noreply: true });
    }

    #[test]
    fn parses_delete_with_noreply() {
        let mut p = Parser::new();
        p.parse(b"delete k noreply\r\n");
        let (cmd, _) = p.build().unwrap();
        assert_eq!(cmd, Command::Delete { key: b"k".to_vec(), noreply: true });
    }

    #[test]
    fn rejects_non_numeric_bytes_field() {
        let mut p = Parser::new();
        p.parse(b"set var 0 0 six\r\n");
        assert!(p.build().is_err());
    }

    #[test]
    fn rejects_unknown_verb() {
        let mut p = Parser::new();
        p.parse(b"frobnicate var\r\n");
        assert!(p.build().is_err());
    }

    #[test]
    fn resumability_byte_at_a_time_matches_one_shot() {
        let line = b"set var 0 0 6 noreply\r\n";

        let mut one_shot = Parser::new();
        one_shot.parse(line);
        let one_shot_result = one_shot.build().unwrap();

        let mut trickle = Parser::new();
        let mut complete = false;
        for &b in line {
            let (_, done) = trickle.parse(&[b]);
            complete = done;
            if complete {
                break;
            }
        }
        assert!(complete);
        let trickle_result = trickle.build().unwrap();

        assert_eq!(one_shot_result, trickle_result);
    }

    #[test]
    fn reset_allows_reuse() {
        let mut p = Parser::new();
        p.parse(b"get a\r\n");
        let _ = p.build();
        p.reset();
        p.parse(b"get b\r\n");
        let (cmd, _) = p.build().unwrap();
        assert_eq!(cmd, Command::Get { keys: vec![b"b".to_vec()] });
    }

    #[test]
    fn parse_reports_no_further_progress_once_ready() {
        let mut p = Parser::new();
        p.parse(b"get a\r\n");
        let (consumed, complete) = p.parse(b"garbage");
        assert_eq!(consumed, 0);
        assert!(complete);
    }
}
