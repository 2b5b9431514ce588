//! Reply assembly.
//!
//! Commands describe their reply through the [`ReplyBuilder`] port, one
//! fragment at a time. [`RespReply`] is the RESP2 implementation used by the
//! server; it accumulates replies of pipelined commands in one buffer so a
//! connection can flush them with a single write.

use crate::protocol::types::{prefix, ResultCode, CRLF};
use bytes::{Bytes, BytesMut};

/// Port through which commands emit their reply.
pub trait ReplyBuilder {
    /// Writes the header of a bulk string. `-1` writes a nil bulk string.
    fn append_string_len(&mut self, len: i64);

    /// Writes the payload of a bulk string whose header was already written.
    fn append_content(&mut self, data: &[u8]);

    fn append_integer(&mut self, n: i64);

    fn append_array_len(&mut self, len: i64);

    /// Writes a simple status line such as `+PONG`.
    fn append_status(&mut self, status: &str);

    /// Replaces everything written for the current command with a single
    /// status or error line.
    fn set_res(&mut self, code: ResultCode, detail: Option<&str>);

    /// Writes a complete bulk string.
    fn append_string(&mut self, data: &[u8]) {
        self.append_string_len(data.len() as i64);
        self.append_content(data);
    }
}

/// A RESP2 reply buffer.
#[derive(Debug, Default)]
pub struct RespReply {
    buf: BytesMut,
    /// Offset where the current command's reply starts
    mark: usize,
}

impl RespReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of the next command's reply.
    pub fn begin(&mut self) {
        self.mark = self.buf.len();
    }

    /// Bytes written since the last [`RespReply::begin`].
    pub fn current(&self) -> &[u8] {
        &self.buf[self.mark..]
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Takes every reply accumulated so far, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.mark = 0;
        self.buf.split().freeze()
    }

    /// Writes a raw error line, for failures that happen outside a command.
    pub fn append_error(&mut self, msg: &str) {
        self.line(prefix::ERROR, msg.as_bytes());
    }

    fn line(&mut self, prefix: u8, body: &[u8]) {
        self.buf.reserve(body.len() + 3);
        self.buf.extend_from_slice(&[prefix]);
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(CRLF);
    }
}

impl ReplyBuilder for RespReply {
    fn append_string_len(&mut self, len: i64) {
        self.line(prefix::BULK_STRING, len.to_string().as_bytes());
    }

    fn append_content(&mut self, data: &[u8]) {
        self.buf.reserve(data.len() + 2);
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(CRLF);
    }

    fn append_integer(&mut self, n: i64) {
        self.line(prefix::INTEGER, n.to_string().as_bytes());
    }

    fn append_array_len(&mut self, len: i64) {
        self.line(prefix::ARRAY, len.to_string().as_bytes());
    }

    fn append_status(&mut self, status: &str) {
        self.line(prefix::SIMPLE_STRING, status.as_bytes());
    }

    fn set_res(&mut self, code: ResultCode, detail: Option<&str>) {
        self.buf.truncate(self.mark);
        self.buf.extend_from_slice(code.render(detail).as_bytes());
        self.buf.extend_from_slice(CRLF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_string() {
        let mut reply = RespReply::new();
        reply.append_string(b"hello");
        assert_eq!(reply.current(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn test_nil_and_empty_bulk() {
        let mut reply = RespReply::new();
        reply.append_string_len(-1);
        reply.append_string(b"");
        assert_eq!(reply.current(), b"$-1\r\n$0\r\n\r\n");
    }

    #[test]
    fn test_integer_and_array() {
        let mut reply = RespReply::new();
        reply.append_array_len(2);
        reply.append_integer(-42);
        reply.append_string(b"x");
        assert_eq!(reply.current(), b"*2\r\n:-42\r\n$1\r\nx\r\n");
    }

    #[test]
    fn test_set_res_replaces_current_reply() {
        let mut reply = RespReply::new();
        reply.begin();
        reply.append_integer(1);
        reply.set_res(ResultCode::Ok, None);
        assert_eq!(reply.current(), b"+OK\r\n");

        reply.set_res(ResultCode::ErrOther, Some("append cmd error"));
        assert_eq!(reply.current(), b"-ERR append cmd error\r\n");
    }

    #[test]
    fn test_set_res_keeps_earlier_pipelined_replies() {
        let mut reply = RespReply::new();
        reply.begin();
        reply.append_status("PONG");
        reply.begin();
        reply.append_integer(7);
        reply.set_res(ResultCode::SyntaxErr, None);

        assert_eq!(reply.take(), Bytes::from("+PONG\r\n-ERR syntax error\r\n"));
        assert!(reply.is_empty());
        assert_eq!(reply.current(), b"");
    }

    #[test]
    fn test_append_error() {
        let mut reply = RespReply::new();
        reply.append_error("ERR Protocol error: invalid bulk length");
        assert_eq!(reply.len(), 42);
        assert_eq!(
            reply.current(),
            b"-ERR Protocol error: invalid bulk length\r\n"
        );
    }
}
