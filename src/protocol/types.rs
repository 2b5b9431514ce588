//! RESP wire constants and command result codes.
//!
//! Each RESP frame starts with a type prefix byte and ends with CRLF:
//!
//! ```text
//! +OK\r\n                        simple string
//! -ERR syntax error\r\n          error
//! :1000\r\n                      integer
//! $5\r\nhello\r\n                bulk string ($-1\r\n is nil)
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n array
//! ```

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Error text for a type mismatch when no detail is supplied.
pub const WRONG_TYPE_MSG: &str = "Operation against a key holding the wrong kind of value";

/// Outcome of a command that is reported as a single status or error line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    SyntaxErr,
    WrongNum,
    InvalidInt,
    InvalidFloat,
    ErrOther,
}

impl ResultCode {
    /// Renders the reply line, prefix included and CRLF excluded.
    ///
    /// `detail` names the command for `WrongNum` and carries the message for
    /// `ErrOther`; the other codes have fixed texts.
    pub fn render(self, detail: Option<&str>) -> String {
        match self {
            ResultCode::Ok => "+OK".to_string(),
            ResultCode::SyntaxErr => "-ERR syntax error".to_string(),
            ResultCode::WrongNum => format!(
                "-ERR wrong number of arguments for '{}' command",
                detail.unwrap_or_default()
            ),
            ResultCode::InvalidInt => "-ERR value is not an integer or out of range".to_string(),
            ResultCode::InvalidFloat => "-ERR value is not a valid float".to_string(),
            ResultCode::ErrOther => format!("-ERR {}", detail.unwrap_or(WRONG_TYPE_MSG)),
        }
    }

    pub fn is_error(self) -> bool {
        self != ResultCode::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fixed_texts() {
        assert_eq!(ResultCode::Ok.render(None), "+OK");
        assert_eq!(ResultCode::SyntaxErr.render(Some("ignored")), "-ERR syntax error");
        assert_eq!(
            ResultCode::InvalidInt.render(None),
            "-ERR value is not an integer or out of range"
        );
        assert_eq!(
            ResultCode::InvalidFloat.render(None),
            "-ERR value is not a valid float"
        );
    }

    #[test]
    fn test_render_with_detail() {
        assert_eq!(
            ResultCode::WrongNum.render(Some("mset")),
            "-ERR wrong number of arguments for 'mset' command"
        );
        assert_eq!(
            ResultCode::ErrOther.render(Some("append cmd error")),
            "-ERR append cmd error"
        );
        assert_eq!(
            ResultCode::ErrOther.render(None),
            format!("-ERR {}", WRONG_TYPE_MSG)
        );
    }

    #[test]
    fn test_is_error() {
        assert!(!ResultCode::Ok.is_error());
        assert!(ResultCode::ErrOther.is_error());
    }
}
