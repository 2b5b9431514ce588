//! RESP Protocol Implementation
//!
//! - `types`: wire prefixes and the [`ResultCode`] table
//! - `parser`: incremental parser turning request bytes into argument vectors
//! - `reply`: the [`ReplyBuilder`] port and its RESP2 buffer implementation
//!
//! ## Example
//!
//! ```
//! use stringkv::protocol::{ReplyBuilder, RequestParser, RespReply};
//!
//! let (argv, _) = RequestParser::new()
//!     .parse(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(argv.len(), 2);
//!
//! let mut reply = RespReply::new();
//! reply.append_string(b"Ariz");
//! assert_eq!(&reply.take()[..], b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod reply;
pub mod types;

pub use parser::{ParseError, ParseResult, RequestParser};
pub use reply::{ReplyBuilder, RespReply};
pub use types::ResultCode;
