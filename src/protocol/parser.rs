//! RESP Request Parser
//!
//! Clients send commands either as a multibulk array of bulk strings
//! (`*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n`) or as an inline line of
//! whitespace separated words (`SET k v\r\n`). The parser turns either form
//! into the argument vector of one command.
//!
//! The parser is incremental. It returns:
//! - `Ok(Some((argv, consumed)))` when a full command was read,
//! - `Ok(None)` when more bytes are needed,
//! - `Err(ParseError)` on a protocol violation; the connection is then closed.
//!
//! An empty `argv` is legal (`*0\r\n` or a blank inline line) and should be
//! skipped by the caller.

use crate::args;
use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;
use tracing::trace;

/// Errors that can occur while parsing a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid multibulk length")]
    InvalidMultibulkLength,

    #[error("invalid bulk length")]
    InvalidBulkLength,

    #[error("expected '$', got '{}'", char::from(*.0))]
    ExpectedBulk(u8),

    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    #[error("too big inline request")]
    InlineTooLarge,

    #[error("too big mbulk count string")]
    HeaderTooLarge,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk argument (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of arguments in one multibulk request
pub const MAX_MULTIBULK_LEN: usize = 1024 * 1024;

/// Maximum length of an inline request or a header line
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// An incremental request parser.
///
/// ```
/// use stringkv::protocol::RequestParser;
///
/// let mut parser = RequestParser::new();
/// let (argv, consumed) = parser.parse(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").unwrap().unwrap();
/// assert_eq!(argv, vec!["GET", "name"]);
/// assert_eq!(consumed, 23);
/// ```
#[derive(Debug, Default)]
pub struct RequestParser {
    /// Commands parsed so far, for tracing
    parsed: u64,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to parse one command from the start of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        let result = match buf.first() {
            None => return Ok(None),
            Some(&prefix::ARRAY) => self.parse_multibulk(buf)?,
            Some(_) => self.parse_inline(buf)?,
        };

        if let Some((argv, consumed)) = &result {
            self.parsed += 1;
            trace!(
                args = argv.len(),
                consumed = consumed,
                total = self.parsed,
                "Parsed command"
            );
        }
        Ok(result)
    }

    /// Parses `*<count>\r\n` followed by `count` bulk strings.
    fn parse_multibulk(&mut self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        debug_assert!(buf[0] == prefix::ARRAY);

        let Some((count, mut consumed)) = read_header(buf)? else {
            return Ok(None);
        };
        let count = count.ok_or(ParseError::InvalidMultibulkLength)?;

        if count <= 0 {
            return Ok(Some((Vec::new(), consumed)));
        }
        let count = count as usize;
        if count > MAX_MULTIBULK_LEN {
            return Err(ParseError::InvalidMultibulkLength);
        }

        let mut argv = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let rest = &buf[consumed..];
            match rest.first() {
                None => return Ok(None),
                Some(&prefix::BULK_STRING) => {}
                Some(&other) => return Err(ParseError::ExpectedBulk(other)),
            }

            let Some((len, header)) = read_header(rest)? else {
                return Ok(None);
            };
            let len = match len {
                Some(n) if n >= 0 && n as usize <= MAX_BULK_SIZE => n as usize,
                _ => return Err(ParseError::InvalidBulkLength),
            };

            let total = header + len + CRLF.len();
            if rest.len() < total {
                return Ok(None);
            }
            if &rest[header + len..total] != CRLF {
                return Err(ParseError::MissingCrlf);
            }

            argv.push(Bytes::copy_from_slice(&rest[header..header + len]));
            consumed += total;
        }

        Ok(Some((argv, consumed)))
    }

    /// Parses a single line of whitespace separated arguments.
    fn parse_inline(&mut self, buf: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        let Some(pos) = find_crlf(buf) else {
            if buf.len() > MAX_INLINE_SIZE {
                return Err(ParseError::InlineTooLarge);
            }
            return Ok(None);
        };

        let argv = buf[..pos]
            .split(|b| b.is_ascii_whitespace())
            .filter(|word| !word.is_empty())
            .map(Bytes::copy_from_slice)
            .collect();

        Ok(Some((argv, pos + CRLF.len())))
    }
}

/// Reads a `<prefix><integer>\r\n` header line.
///
/// Returns the parsed integer (`None` if malformed) and the header length.
fn read_header(buf: &[u8]) -> ParseResult<Option<(Option<i64>, usize)>> {
    match find_crlf(&buf[1..]) {
        Some(pos) => Ok(Some((args::parse_i64(&buf[1..1 + pos]), 1 + pos + CRLF.len()))),
        None if buf.len() > MAX_INLINE_SIZE => Err(ParseError::HeaderTooLarge),
        None => Ok(None),
    }
}

/// Finds the position of the first CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> ParseResult<Option<(Vec<Bytes>, usize)>> {
        RequestParser::new().parse(input)
    }

    #[test]
    fn test_parse_multibulk() {
        let input = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
        let (argv, consumed) = parse(input).unwrap().unwrap();
        assert_eq!(argv, vec![Bytes::from("GET"), Bytes::from("name")]);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_set_command() {
        let input = b"*3\r\n$3\r\nSET\r\n$8\r\nuser:101\r\n$4\r\nAriz\r\n";
        let (argv, _) = parse(input).unwrap().unwrap();
        assert_eq!(argv, vec!["SET", "user:101", "Ariz"]);
    }

    #[test]
    fn test_parse_incomplete() {
        assert!(parse(b"*2\r\n$3\r\nGET\r\n$4\r\nna").unwrap().is_none());
        assert!(parse(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
        assert!(parse(b"*2").unwrap().is_none());
        assert!(parse(b"").unwrap().is_none());
    }

    #[test]
    fn test_parse_pipelined_leaves_rest() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (argv, consumed) = parse(input).unwrap().unwrap();
        assert_eq!(argv, vec!["PING"]);
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_parse_empty_multibulk() {
        let (argv, consumed) = parse(b"*0\r\n").unwrap().unwrap();
        assert!(argv.is_empty());
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let input = b"*1\r\n$5\r\nhel\x00o\r\n";
        let (argv, _) = parse(input).unwrap().unwrap();
        assert_eq!(argv[0], Bytes::from(&b"hel\x00o"[..]));
    }

    #[test]
    fn test_bulk_containing_crlf() {
        let input = b"*1\r\n$4\r\na\r\nb\r\n";
        let (argv, _) = parse(input).unwrap().unwrap();
        assert_eq!(argv[0], Bytes::from(&b"a\r\nb"[..]));
    }

    #[test]
    fn test_parse_inline_command() {
        let (argv, consumed) = parse(b"SET  foo   bar\r\n").unwrap().unwrap();
        assert_eq!(argv, vec!["SET", "foo", "bar"]);
        assert_eq!(consumed, 16);

        let (argv, _) = parse(b"\r\n").unwrap().unwrap();
        assert!(argv.is_empty());
    }

    #[test]
    fn test_protocol_errors() {
        assert_eq!(
            parse(b"*x\r\n").unwrap_err(),
            ParseError::InvalidMultibulkLength
        );
        assert_eq!(
            parse(b"*1\r\n:5\r\n").unwrap_err(),
            ParseError::ExpectedBulk(b':')
        );
        assert_eq!(
            parse(b"*1\r\n$-3\r\n").unwrap_err(),
            ParseError::InvalidBulkLength
        );
        assert_eq!(
            parse(b"*1\r\n$3\r\nabcd\r\n").unwrap_err(),
            ParseError::MissingCrlf
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ParseError::ExpectedBulk(b'+').to_string(),
            "expected '$', got '+'"
        );
        assert_eq!(
            ParseError::InvalidMultibulkLength.to_string(),
            "invalid multibulk length"
        );
    }

    #[test]
    fn test_inline_too_large() {
        let input = vec![b'a'; MAX_INLINE_SIZE + 1];
        assert_eq!(parse(&input).unwrap_err(), ParseError::InlineTooLarge);
    }
}
